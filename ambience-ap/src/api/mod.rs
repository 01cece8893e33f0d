//! HTTP control surface
//!
//! Lets a UI host drive the engine: toggles, clicks, navigation reports and
//! an SSE stream of engine events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
