//! # Ambience Common Library
//!
//! Shared code for the ambience audio player and its clients:
//! - Error types
//! - Event types (AmbienceEvent enum)
//! - Page classification (PageState)
//! - Configuration file discovery

pub mod config;
pub mod error;
pub mod events;
pub mod page;

pub use error::{Error, Result};
pub use events::AmbienceEvent;
pub use page::PageState;
