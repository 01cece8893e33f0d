//! Rendering sinks
//!
//! The engine never touches a UI directly. It writes the background colour
//! and control toggles to a [`RenderSink`].

use crate::state::SharedState;
use crate::visualizer::policy::Hsl;
use ambience_common::events::AmbienceEvent;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// UI affordances the engine reflects state into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Mute,
    Effects,
}

impl Control {
    pub fn as_str(&self) -> &'static str {
        match self {
            Control::Mute => "mute",
            Control::Effects => "effects",
        }
    }
}

pub trait RenderSink: Send + Sync {
    /// Called every visualizer frame; implementations may deduplicate
    fn set_background(&self, color: Hsl);

    fn set_control(&self, control: Control, engaged: bool);
}

/// Publishes sink writes on the event channel
pub struct EventSink {
    state: Arc<SharedState>,
    last_color: Mutex<Option<String>>,
}

impl EventSink {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self {
            state,
            last_color: Mutex::new(None),
        }
    }
}

impl RenderSink for EventSink {
    fn set_background(&self, color: Hsl) {
        let css = color.to_css();
        let mut last = self.last_color.lock();
        if last.as_deref() == Some(css.as_str()) {
            return;
        }
        *last = Some(css.clone());
        drop(last);
        self.state
            .broadcast_event(AmbienceEvent::BackgroundChanged { color: css });
    }

    fn set_control(&self, control: Control, engaged: bool) {
        self.state.broadcast_event(AmbienceEvent::ControlToggled {
            control: control.as_str().to_string(),
            engaged,
        });
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn set_background(&self, _color: Hsl) {}

    fn set_control(&self, _control: Control, _engaged: bool) {}
}
