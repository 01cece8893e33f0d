//! Gain ramps
//!
//! A [`FadeController`] drives linear gain ramps in a fixed number of discrete
//! steps on a tokio interval. At most one ramp is active per gain node: a new
//! ramp on the same node cancels the previous one before it is registered.
//!
//! Cancellation is synchronous. Each step re-checks, under the ramp table
//! lock, that its ramp is still the registered one, so a superseded ramp can
//! never write the gain again once `fade_to`/`cancel` has returned.

use crate::audio::nodes::{GainNode, NodeId};
use crate::state::SharedState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

/// Runs once, after the final step has set the exact target
pub type FadeCallback = Box<dyn FnOnce() + Send + 'static>;

/// Snapshot of an in-flight ramp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRamp {
    /// Gain node being ramped
    pub target: NodeId,
    pub start_value: f32,
    pub end_value: f32,
    pub step_count: u32,
    pub elapsed_steps: u32,
}

struct ActiveRamp {
    ramp_id: u64,
    ramp: FadeRamp,
    abort: AbortHandle,
}

type RampTable = Arc<Mutex<HashMap<NodeId, ActiveRamp>>>;

/// Fade parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeSettings {
    /// Discrete steps per ramp
    pub steps: u32,
    /// Full ramp length used by `fade_in`/`fade_out`
    pub duration: Duration,
    /// Gain of an audible loop
    pub nominal_volume: f32,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            steps: 10,
            duration: Duration::from_millis(500),
            nominal_volume: 0.5,
        }
    }
}

pub struct FadeController {
    settings: FadeSettings,
    state: Arc<SharedState>,
    ramps: RampTable,
    next_ramp_id: AtomicU64,
}

impl FadeController {
    pub fn new(settings: FadeSettings, state: Arc<SharedState>) -> Self {
        Self {
            settings: FadeSettings {
                steps: settings.steps.max(1),
                ..settings
            },
            state,
            ramps: Arc::new(Mutex::new(HashMap::new())),
            next_ramp_id: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> FadeSettings {
        self.settings
    }

    /// Ramp `gain` linearly to `target` over `duration`.
    ///
    /// Replaces any ramp already running on `gain`. `on_complete` runs after
    /// the final step; it never runs for a ramp that was cancelled.
    pub fn fade_to(&self, gain: &GainNode, target: f32, duration: Duration, on_complete: Option<FadeCallback>) {
        let node = gain.id();
        let steps = self.settings.steps;
        let mut ramps = self.ramps.lock();

        if let Some(previous) = ramps.remove(&node) {
            previous.abort.abort();
            trace!("Fade on gain {} superseded at step {}", node, previous.ramp.elapsed_steps);
        }

        if duration.is_zero() {
            gain.set_value(target);
            drop(ramps);
            if let Some(callback) = on_complete {
                callback();
            }
            return;
        }

        let ramp_id = self.next_ramp_id.fetch_add(1, Ordering::Relaxed);
        let ramp = FadeRamp {
            target: node,
            start_value: gain.value(),
            end_value: target,
            step_count: steps,
            elapsed_steps: 0,
        };
        let tick = (duration / steps).max(Duration::from_nanos(1));

        let table = Arc::clone(&self.ramps);
        let gain_node = gain.clone();
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for step in 1..=steps {
                interval.tick().await;

                let mut ramps = table.lock();
                let active = match ramps.get_mut(&node) {
                    Some(active) if active.ramp_id == ramp_id => active,
                    _ => return,
                };

                if step == steps {
                    // Exact target on the final step, no accumulated drift
                    gain_node.set_value(ramp.end_value);
                    ramps.remove(&node);
                    drop(ramps);
                    trace!("Fade on gain {} reached {}", node, ramp.end_value);
                    if let Some(callback) = on_complete {
                        callback();
                    }
                    return;
                }

                let progress = step as f32 / steps as f32;
                gain_node.set_value(ramp.start_value + (ramp.end_value - ramp.start_value) * progress);
                active.ramp.elapsed_steps = step;
            }
        });

        ramps.insert(
            node,
            ActiveRamp {
                ramp_id,
                ramp,
                abort: task.abort_handle(),
            },
        );
    }

    /// Ramp to 0 over the configured duration, then run `on_complete`
    pub fn fade_out(&self, gain: &GainNode, on_complete: FadeCallback) {
        self.fade_to(gain, 0.0, self.settings.duration, Some(on_complete));
    }

    /// Ramp to the nominal volume, or set 0 at once while muted
    pub fn fade_in(&self, gain: &GainNode) {
        if self.state.is_muted() {
            self.set_immediate(gain, 0.0);
            return;
        }
        self.fade_to(gain, self.settings.nominal_volume, self.settings.duration, None);
    }

    /// Nominal volume, or 0 while muted, without animating
    pub fn set_audible(&self, gain: &GainNode) {
        let value = if self.state.is_muted() {
            0.0
        } else {
            self.settings.nominal_volume
        };
        self.set_immediate(gain, value);
    }

    /// Cancel any ramp on `gain` and set `value`
    pub fn set_immediate(&self, gain: &GainNode, value: f32) {
        let mut ramps = self.ramps.lock();
        if let Some(previous) = ramps.remove(&gain.id()) {
            previous.abort.abort();
        }
        gain.set_value(value);
    }

    /// Drop the ramp on `gain` (its callback never runs). Returns whether one was active.
    pub fn cancel(&self, gain: &GainNode) -> bool {
        match self.ramps.lock().remove(&gain.id()) {
            Some(previous) => {
                previous.abort.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, ramp) in self.ramps.lock().drain() {
            ramp.abort.abort();
        }
    }

    pub fn is_ramping(&self, gain: &GainNode) -> bool {
        self.ramps.lock().contains_key(&gain.id())
    }

    pub fn active_ramp(&self, gain: &GainNode) -> Option<FadeRamp> {
        self.ramps.lock().get(&gain.id()).map(|active| active.ramp)
    }

    pub fn active_count(&self) -> usize {
        self.ramps.lock().len()
    }
}
