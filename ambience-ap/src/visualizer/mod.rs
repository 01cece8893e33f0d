//! Visual feedback loop
//!
//! Samples the current session's analyser once per display frame, turns the
//! kick band into an intensity and writes the resulting colour to the sink.
//!
//! The loop runs only between [`Visualizer::arm`] and [`Visualizer::stop`].
//! Each arm bumps a generation counter and the frame step re-checks it under
//! the task lock, so after `stop` (or a newer `arm`) returns no stale frame
//! can reach the sink. Arming always starts from a fresh peak tracker.

pub mod intensity;
pub mod policy;
pub mod sink;

use crate::audio::analyser::AnalyserNode;
use crate::config::VisualizerSettings;
use crate::state::SharedState;
use intensity::{IntensityFrame, IntensityParams, IntensityTracker};
use parking_lot::Mutex;
use policy::ColorPolicy;
use sink::RenderSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

pub use policy::{Hsl, TealPulse};
pub use sink::{Control, EventSink, NullSink};

/// Frame loop parameters
#[derive(Debug, Clone, Copy)]
pub struct VisualizerParams {
    pub frame_interval: Duration,
    /// Lowest bins treated as the kick band
    pub kick_band_bins: usize,
    pub intensity: IntensityParams,
}

impl Default for VisualizerParams {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            kick_band_bins: 40,
            intensity: IntensityParams::default(),
        }
    }
}

impl From<&VisualizerSettings> for VisualizerParams {
    fn from(settings: &VisualizerSettings) -> Self {
        Self {
            frame_interval: settings.frame_interval(),
            kick_band_bins: settings.kick_band_bins,
            intensity: settings.intensity,
        }
    }
}

struct Inner {
    params: VisualizerParams,
    state: Arc<SharedState>,
    sink: Arc<dyn RenderSink>,
    policy: Arc<dyn ColorPolicy>,
    generation: AtomicU64,
    task: Mutex<Option<AbortHandle>>,
    frames: AtomicU64,
    last_frame: Mutex<Option<IntensityFrame>>,
}

#[derive(Clone)]
pub struct Visualizer {
    inner: Arc<Inner>,
}

impl Visualizer {
    pub fn new(
        params: VisualizerParams,
        state: Arc<SharedState>,
        sink: Arc<dyn RenderSink>,
        policy: Arc<dyn ColorPolicy>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                params,
                state,
                sink,
                policy,
                generation: AtomicU64::new(0),
                task: Mutex::new(None),
                frames: AtomicU64::new(0),
                last_frame: Mutex::new(None),
            }),
        }
    }

    /// Start sampling `analyser`, replacing any running loop
    pub fn arm(&self, analyser: AnalyserNode) {
        let mut task = self.inner.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.state.set_visualizer_active(true);
        *self.inner.last_frame.lock() = None;

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let params = inner.params;
            let mut tracker = IntensityTracker::new(params.intensity);
            let mut bins = vec![0u8; analyser.frequency_bin_count()];
            let band = params.kick_band_bins.min(bins.len());

            let mut interval = tokio::time::interval(params.frame_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let _task = inner.task.lock();
                if inner.generation.load(Ordering::Acquire) != generation
                    || !inner.state.is_visualizer_active()
                {
                    return;
                }

                analyser.get_byte_frequency_data(&mut bins);
                let frame = tracker.process(&bins[..band], inner.state.page());
                let color = inner.policy.color(frame.kick, inner.state.is_muted());
                inner.sink.set_background(color);

                *inner.last_frame.lock() = Some(frame);
                inner.frames.fetch_add(1, Ordering::Relaxed);
            }
        });

        *task = Some(handle.abort_handle());
        debug!("Visualizer armed (generation {})", generation);
    }

    /// Stop the loop. No frame is emitted after this returns.
    pub fn stop(&self) {
        let mut task = self.inner.task.lock();
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.state.set_visualizer_active(false);
        if let Some(handle) = task.take() {
            handle.abort();
            debug!("Visualizer stopped");
        }
    }

    /// Write the resting colour (used when muting)
    pub fn reset_output(&self) {
        self.inner.sink.set_background(self.inner.policy.resting());
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.is_visualizer_active()
    }

    /// Frames emitted since construction
    pub fn frame_count(&self) -> u64 {
        self.inner.frames.load(Ordering::Relaxed)
    }

    /// Most recent frame of the current arm, if any
    pub fn last_frame(&self) -> Option<IntensityFrame> {
        *self.inner.last_frame.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analyser::AnalyserOptions;

    fn visualizer() -> (Visualizer, Arc<SharedState>) {
        let state = Arc::new(SharedState::new());
        let visualizer = Visualizer::new(
            VisualizerParams::default(),
            Arc::clone(&state),
            Arc::new(NullSink),
            Arc::new(TealPulse::default()),
        );
        (visualizer, state)
    }

    fn analyser() -> AnalyserNode {
        AnalyserNode::new(AnalyserOptions::default(), 44100).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_runs_frames_until_stopped() {
        let (visualizer, state) = visualizer();
        visualizer.arm(analyser());
        assert!(state.is_visualizer_active());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let frames = visualizer.frame_count();
        assert!(frames >= 5, "only {} frames", frames);

        visualizer.stop();
        assert!(!visualizer.is_active());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(visualizer.frame_count(), frames);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_loop() {
        let (visualizer, _) = visualizer();
        visualizer.arm(analyser());
        tokio::time::sleep(Duration::from_millis(50)).await;
        visualizer.arm(analyser());
        let before = visualizer.frame_count();

        tokio::time::sleep(Duration::from_millis(160)).await;
        let produced = visualizer.frame_count() - before;
        // one loop at ~16ms, not two
        assert!((9..=12).contains(&produced), "{} frames", produced);
    }
}
