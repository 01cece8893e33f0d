//! Event types for the ambience event stream
//!
//! Events are broadcast by the audio player and serialized for SSE
//! transmission. All events use this central enum for exhaustive matching.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PageState;

/// Ambience event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AmbienceEvent {
    /// A session's sources started playing
    LoopStarted {
        /// Loop asset name (e.g. "main", "intro")
        loop_name: String,
        /// Session that started
        session_id: Uuid,
        /// Whether gain ramped in (false = set directly to nominal volume)
        faded_in: bool,
        /// When the loop started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Outgoing session began fading out
    TransitionStarted {
        /// Loop being retired
        from: String,
        /// Loop that will be audible once the transition completes
        to: String,
        /// When the fade-out began
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Fade-out completed and the incoming session is now audible
    TransitionCompleted {
        /// Loop now playing
        loop_name: String,
        /// When the transition settled
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A start or transition was abandoned; prior playback is unchanged
    TransitionAborted {
        /// Loop that failed to load
        loop_name: String,
        /// Human-readable failure reason
        reason: String,
        /// When the request was abandoned
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The one-shot intro track reached its natural end
    IntroFinished {
        /// When the intro ended
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Tracked page changed
    PageChanged {
        /// Page before change
        old_page: PageState,
        /// Page after change
        new_page: PageState,
        /// When the page changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Mute flag toggled
    MuteChanged {
        /// New mute state
        muted: bool,
        /// When the flag changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Click effect suppression toggled
    EffectSuppressChanged {
        /// New suppression state
        suppressed: bool,
        /// When the flag changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A click effect was played
    ClickPlayed {
        /// Gain applied to the one-shot
        volume: f32,
        /// When the click fired
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Visual feedback colour changed
    BackgroundChanged {
        /// CSS colour value (e.g. "hsl(180deg, 100%, 9.41%)")
        color: String,
    },

    /// A UI affordance should be toggled (mute / effect-suppress buttons)
    ControlToggled {
        /// Control identifier ("mute" or "effects")
        control: String,
        /// Whether the control shows its engaged state
        engaged: bool,
    },

    /// The host should navigate to a path
    NavigateRequested {
        /// Destination path
        path: String,
        /// Page the destination classifies as
        page: PageState,
    },
}

impl AmbienceEvent {
    /// Event type name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            AmbienceEvent::LoopStarted { .. } => "LoopStarted",
            AmbienceEvent::TransitionStarted { .. } => "TransitionStarted",
            AmbienceEvent::TransitionCompleted { .. } => "TransitionCompleted",
            AmbienceEvent::TransitionAborted { .. } => "TransitionAborted",
            AmbienceEvent::IntroFinished { .. } => "IntroFinished",
            AmbienceEvent::PageChanged { .. } => "PageChanged",
            AmbienceEvent::MuteChanged { .. } => "MuteChanged",
            AmbienceEvent::EffectSuppressChanged { .. } => "EffectSuppressChanged",
            AmbienceEvent::ClickPlayed { .. } => "ClickPlayed",
            AmbienceEvent::BackgroundChanged { .. } => "BackgroundChanged",
            AmbienceEvent::ControlToggled { .. } => "ControlToggled",
            AmbienceEvent::NavigateRequested { .. } => "NavigateRequested",
        }
    }
}
