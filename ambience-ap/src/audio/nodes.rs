//! Audio graph nodes: buffer sources and gain nodes
//!
//! Nodes are cheap `Arc` handles. Playback position is never stored per
//! sample; it is derived from the context clock and the instant a source was
//! started, so any reader (output device, analyser) sees the same position.

use crate::audio::buffer::AudioBuffer;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Graph-wide node identifier
pub type NodeId = u64;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_node_id() -> NodeId {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Signed seconds from `origin` to `t`
#[inline]
pub(crate) fn seconds_between(origin: Instant, t: Instant) -> f64 {
    if t >= origin {
        (t - origin).as_secs_f64()
    } else {
        -(origin - t).as_secs_f64()
    }
}

/// Observable source lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Unstarted,
    Playing,
    Stopped,
}

/// Failures of [`BufferSource::stop`]; callers tearing down a session treat both as benign
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StopError {
    #[error("source was never started")]
    NotStarted,
    #[error("source already stopped")]
    AlreadyStopped,
}

#[derive(Debug, Clone, Copy)]
enum Playback {
    Unstarted,
    Playing { started_at: Instant, offset: f64 },
    Stopped,
}

struct SourceInner {
    id: NodeId,
    buffer: Arc<AudioBuffer>,
    looping: bool,
    playback: Mutex<Playback>,
    connected: AtomicBool,
    ended_tx: watch::Sender<bool>,
}

/// Plays one [`AudioBuffer`], once or looping
#[derive(Clone)]
pub struct BufferSource {
    inner: Arc<SourceInner>,
}

impl std::fmt::Debug for BufferSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSource")
            .field("id", &self.inner.id)
            .field("looping", &self.inner.looping)
            .field("state", &self.state())
            .finish()
    }
}

impl BufferSource {
    pub(crate) fn new(buffer: Arc<AudioBuffer>, looping: bool) -> Self {
        let (ended_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(SourceInner {
                id: next_node_id(),
                buffer,
                looping,
                playback: Mutex::new(Playback::Unstarted),
                connected: AtomicBool::new(false),
                ended_tx,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.inner.buffer
    }

    pub fn is_looping(&self) -> bool {
        self.inner.looping
    }

    /// Current lifecycle state; a one-shot past its end reports `Stopped`
    pub fn state(&self) -> SourceState {
        match *self.inner.playback.lock() {
            Playback::Unstarted => SourceState::Unstarted,
            Playback::Stopped => SourceState::Stopped,
            Playback::Playing { started_at, offset } => {
                if !self.inner.looping
                    && seconds_between(started_at, Instant::now()) + offset
                        >= self.inner.buffer.duration_secs()
                {
                    SourceState::Stopped
                } else {
                    SourceState::Playing
                }
            }
        }
    }

    /// Start playback `offset` into the buffer.
    ///
    /// A source can be started once; a second start is an `InvalidState` error.
    pub fn start(&self, offset: Duration) -> Result<()> {
        let duration = self.inner.buffer.duration_secs();
        let mut offset = offset.as_secs_f64();
        if self.inner.looping {
            offset %= duration;
        }

        {
            let mut playback = self.inner.playback.lock();
            if !matches!(*playback, Playback::Unstarted) {
                return Err(Error::InvalidState(format!(
                    "Source {} cannot be started twice",
                    self.inner.id
                )));
            }
            *playback = Playback::Playing {
                started_at: Instant::now(),
                offset,
            };
        }

        if !self.inner.looping {
            let remaining = Duration::from_secs_f64((duration - offset).max(0.0));
            let source = self.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    tokio::time::sleep(remaining).await;
                    source.finish_naturally();
                });
            }
        }
        Ok(())
    }

    fn finish_naturally(&self) {
        let mut playback = self.inner.playback.lock();
        if matches!(*playback, Playback::Playing { .. }) {
            *playback = Playback::Stopped;
            drop(playback);
            self.inner.ended_tx.send_replace(true);
        }
    }

    /// Stop playback immediately
    pub fn stop(&self) -> std::result::Result<(), StopError> {
        let mut playback = self.inner.playback.lock();
        match *playback {
            Playback::Unstarted => Err(StopError::NotStarted),
            Playback::Stopped => Err(StopError::AlreadyStopped),
            Playback::Playing { .. } => {
                *playback = Playback::Stopped;
                drop(playback);
                self.inner.ended_tx.send_replace(true);
                Ok(())
            }
        }
    }

    /// Resolves once the source has stopped, naturally or via [`BufferSource::stop`]
    pub async fn ended(&self) {
        let mut rx = self.inner.ended_tx.subscribe();
        // Sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|ended| *ended).await;
    }

    /// Connect this source into `gain`
    pub fn connect(&self, gain: &GainNode) {
        self.inner.connected.store(true, Ordering::Release);
        gain.add_input(self.clone());
    }

    /// Detach from every gain node it feeds
    pub fn disconnect(&self) {
        self.inner.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Mix `gain`-scaled frames starting at `t0` into interleaved `out`.
    ///
    /// `channels == 1` mixes a mono downmix.
    pub(crate) fn render_add(&self, t0: Instant, rate: u32, channels: usize, gain: f32, out: &mut [f32]) {
        let (started_at, offset) = match *self.inner.playback.lock() {
            Playback::Playing { started_at, offset } => (started_at, offset),
            _ => return,
        };

        let buffer = &self.inner.buffer;
        let duration = buffer.duration_secs();
        let buffer_rate = buffer.sample_rate() as f64;
        let base = seconds_between(started_at, t0);
        let frame_secs = 1.0 / rate as f64;
        let last_frame = buffer.frames() - 1;

        for (i, frame) in out.chunks_exact_mut(channels).enumerate() {
            let rel = base + i as f64 * frame_secs;
            if rel < 0.0 {
                continue;
            }
            let mut position = rel + offset;
            if self.inner.looping {
                position %= duration;
            } else if position >= duration {
                break;
            }

            let index = ((position * buffer_rate) as usize).min(last_frame);
            if channels == 1 {
                frame[0] += gain * buffer.mono_sample(index);
            } else {
                for (c, sample) in frame.iter_mut().enumerate() {
                    *sample += gain * buffer.sample(c, index);
                }
            }
        }
    }
}

struct GainInner {
    id: NodeId,
    value: AtomicU32,
    inputs: Mutex<Vec<BufferSource>>,
    connected: AtomicBool,
}

/// Shared gain parameter summing its connected sources
#[derive(Clone)]
pub struct GainNode {
    inner: Arc<GainInner>,
}

impl std::fmt::Debug for GainNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GainNode")
            .field("id", &self.inner.id)
            .field("value", &self.value())
            .finish()
    }
}

impl GainNode {
    pub(crate) fn new(initial: f32) -> Self {
        Self {
            inner: Arc::new(GainInner {
                id: next_node_id(),
                value: AtomicU32::new(initial.to_bits()),
                inputs: Mutex::new(Vec::new()),
                connected: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn value(&self) -> f32 {
        f32::from_bits(self.inner.value.load(Ordering::Acquire))
    }

    pub fn set_value(&self, value: f32) {
        self.inner.value.store(value.to_bits(), Ordering::Release);
    }

    fn add_input(&self, source: BufferSource) {
        let mut inputs = self.inner.inputs.lock();
        inputs.retain(|s| s.is_connected());
        inputs.push(source);
    }

    /// Detach from the destination and every analyser
    pub fn disconnect(&self) {
        self.inner.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    pub(crate) fn render_add(&self, t0: Instant, rate: u32, channels: usize, out: &mut [f32]) {
        let gain = self.value();
        let mut inputs = self.inner.inputs.lock();
        inputs.retain(|s| s.is_connected());
        if gain == 0.0 {
            return;
        }
        for source in inputs.iter() {
            source.render_add(t0, rate, channels, gain, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer(frames: usize, rate: u32) -> Arc<AudioBuffer> {
        let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
        Arc::new(AudioBuffer::new(vec![samples], rate).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_invalid_state() {
        let source = BufferSource::new(ramp_buffer(100, 100), true);
        source.start(Duration::ZERO).unwrap();
        assert!(matches!(source.start(Duration::ZERO), Err(Error::InvalidState(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_failures_are_distinguished() {
        let source = BufferSource::new(ramp_buffer(100, 100), true);
        assert_eq!(source.stop(), Err(StopError::NotStarted));

        source.start(Duration::ZERO).unwrap();
        assert_eq!(source.state(), SourceState::Playing);
        assert_eq!(source.stop(), Ok(()));
        assert_eq!(source.state(), SourceState::Stopped);
        assert_eq!(source.stop(), Err(StopError::AlreadyStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_ends_naturally() {
        // 1 second buffer
        let source = BufferSource::new(ramp_buffer(100, 100), false);
        source.start(Duration::ZERO).unwrap();

        let started = Instant::now();
        source.ended().await;
        assert!(Instant::now() - started >= Duration::from_secs(1));
        assert_eq!(source.state(), SourceState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_looping_source_wraps_position() {
        let gain = GainNode::new(1.0);
        let source = BufferSource::new(ramp_buffer(100, 100), true);
        source.connect(&gain);
        source.start(Duration::ZERO).unwrap();

        tokio::time::advance(Duration::from_millis(1250)).await;

        let mut out = [0.0f32; 1];
        gain.render_add(Instant::now(), 100, 1, &mut out);
        // 1.25s into a 1s loop = frame 25
        assert!((out[0] - 0.25).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_source_is_silent() {
        let gain = GainNode::new(1.0);
        let source = BufferSource::new(ramp_buffer(100, 100), true);
        source.connect(&gain);
        source.start(Duration::from_millis(500)).unwrap();
        source.disconnect();

        let mut out = [0.0f32; 4];
        gain.render_add(Instant::now(), 100, 1, &mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_gain_value_roundtrip() {
        let gain = GainNode::new(0.5);
        assert_eq!(gain.value(), 0.5);
        gain.set_value(0.0);
        assert_eq!(gain.value(), 0.0);
    }
}
