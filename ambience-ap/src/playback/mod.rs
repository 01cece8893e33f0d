//! Loop playback
//!
//! Sessions, gain ramps, the crossfade state machine and the click effect.

pub mod click;
pub mod fader;
pub mod orchestrator;
pub mod session;

pub use click::{ClickEffectPlayer, ClickOutcome};
pub use fader::{FadeController, FadeSettings};
pub use orchestrator::{CrossfadeOrchestrator, PlaybackPhase, RequestOutcome, StartOptions};
pub use session::{PlaybackSession, SessionSettings};
