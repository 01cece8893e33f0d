//! Shared engine state
//!
//! Process-wide flags read and written by the UI entry points, the fade
//! controller, the visualizer and the click player, plus the event channel
//! every component publishes on.

use ambience_common::events::AmbienceEvent;
use ambience_common::PageState;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Shared state accessible by all components
///
/// Flags are atomics; nothing here is held across an await.
pub struct SharedState {
    /// Master mute (forces gain to 0, halts the visualizer)
    muted: AtomicBool,

    /// Click effects suppressed (independent of mute)
    click_suppressed: AtomicBool,

    /// Visualizer loop running
    visualizer_active: AtomicBool,

    /// When the last click effect actually played
    last_click: Mutex<Option<Instant>>,

    /// Page the engine believes the host is showing
    page: RwLock<PageState>,

    /// Event broadcaster for SSE events
    pub event_tx: broadcast::Sender<AmbienceEvent>,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            muted: AtomicBool::new(false),
            click_suppressed: AtomicBool::new(false),
            visualizer_active: AtomicBool::new(false),
            last_click: Mutex::new(None),
            page: RwLock::new(PageState::Main),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: AmbienceEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<AmbienceEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    /// Flip mute and return the new value
    pub fn toggle_muted(&self) -> bool {
        !self.muted.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn is_click_suppressed(&self) -> bool {
        self.click_suppressed.load(Ordering::Acquire)
    }

    /// Flip click suppression and return the new value
    pub fn toggle_click_suppressed(&self) -> bool {
        !self.click_suppressed.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn is_visualizer_active(&self) -> bool {
        self.visualizer_active.load(Ordering::Acquire)
    }

    pub(crate) fn set_visualizer_active(&self, active: bool) {
        self.visualizer_active.store(active, Ordering::Release);
    }

    pub fn last_click(&self) -> Option<Instant> {
        *self.last_click.lock()
    }

    /// Record a click at `now` unless one happened within `cooldown`.
    ///
    /// Returns false when the click falls inside the cooldown window.
    pub(crate) fn try_claim_click(&self, now: Instant, cooldown: std::time::Duration) -> bool {
        let mut last = self.last_click.lock();
        match *last {
            Some(previous) if now.saturating_duration_since(previous) < cooldown => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub fn page(&self) -> PageState {
        *self.page.read()
    }

    /// Store `page`, returning the previous one
    pub(crate) fn replace_page(&self, page: PageState) -> PageState {
        std::mem::replace(&mut *self.page.write(), page)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
