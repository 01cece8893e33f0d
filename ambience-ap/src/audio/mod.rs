//! Software audio graph
//!
//! Buffers, sources, gain and analyser nodes, the processing context and the
//! cpal output that renders it.

pub mod analyser;
pub mod buffer;
pub mod context;
pub mod decoder;
pub mod nodes;
pub mod output;

pub use analyser::{AnalyserNode, AnalyserOptions};
pub use buffer::AudioBuffer;
pub use context::{AudioAvailability, AudioContext, AudioHost, ContextLifecycle, ContextState};
pub use decoder::decode_wav;
pub use nodes::{BufferSource, GainNode, SourceState, StopError};
