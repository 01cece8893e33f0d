//! # Ambience Audio Player Library (ambience-ap)
//!
//! Page-aware background audio: one looping soundtrack per page, crossfaded
//! on navigation, with a kick-driven background colour and a click effect.
//!
//! **Architecture:** software audio graph (buffers, gain, analyser) rendered
//! to cpal, driven by a crossfade state machine. A UI host talks to the
//! [`Engine`] directly or through the HTTP/SSE surface in [`api`].

pub mod api;
pub mod assets;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod navigation;
pub mod playback;
pub mod state;
pub mod visualizer;

pub use engine::{Engine, EngineStatus};
pub use error::{Error, Result};
pub use state::SharedState;
