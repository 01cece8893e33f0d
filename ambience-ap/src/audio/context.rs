//! Audio processing context and its process-wide lifecycle
//!
//! An [`AudioContext`] creates nodes, owns the destination bus and, for the
//! device backend, the output stream. [`ContextLifecycle`] holds the single
//! context of the process: created lazily, resumed before use and closed on
//! teardown.

use crate::audio::analyser::{AnalyserNode, AnalyserOptions};
use crate::audio::buffer::AudioBuffer;
use crate::audio::nodes::{BufferSource, GainNode, SourceState};
use crate::audio::output::{self, DeviceOutput, RenderFn};
use crate::config::{AudioBackend, AudioConfig};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where rendered audio goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioHost {
    /// System output device via cpal
    Device { device_name: Option<String> },
    /// Clock-driven graph without an output device
    Headless { sample_rate: u32 },
    /// No audio capability
    Unavailable,
}

impl AudioHost {
    pub fn from_config(config: &AudioConfig) -> Self {
        match config.backend {
            AudioBackend::Device => AudioHost::Device {
                device_name: config.device_name.clone(),
            },
            AudioBackend::Headless => AudioHost::Headless {
                sample_rate: config.sample_rate,
            },
            AudioBackend::Disabled => AudioHost::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

struct ContextInner {
    host: AudioHost,
    sample_rate: u32,
    channels: u16,
    created_at: Instant,
    state: Mutex<ContextState>,
    destination: Mutex<Vec<GainNode>>,
    sources: Mutex<Vec<BufferSource>>,
    output: Mutex<Option<DeviceOutput>>,
    resume_lock: tokio::sync::Mutex<()>,
}

impl ContextInner {
    fn render(&self, t0: Instant, out: &mut [f32]) {
        out.fill(0.0);
        let mut destination = self.destination.lock();
        destination.retain(|g| g.is_connected());
        for gain in destination.iter() {
            gain.render_add(t0, self.sample_rate, self.channels as usize, out);
        }
    }
}

/// Shared handle to one processing context
#[derive(Clone)]
pub struct AudioContext {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioContext")
            .field("host", &self.inner.host)
            .field("sample_rate", &self.inner.sample_rate)
            .field("state", &self.state())
            .finish()
    }
}

impl AudioContext {
    /// Create a suspended context on `host`.
    ///
    /// Fails with `EnvironmentUnsupported` when the host has no audio.
    pub fn open(host: &AudioHost) -> Result<Self> {
        let (sample_rate, channels) = match host {
            AudioHost::Unavailable => {
                return Err(Error::EnvironmentUnsupported("Audio backend disabled".to_string()))
            }
            AudioHost::Headless { sample_rate } => {
                if *sample_rate == 0 {
                    return Err(Error::Config("Headless sample rate must be non-zero".to_string()));
                }
                (*sample_rate, 2)
            }
            AudioHost::Device { device_name } => {
                let format = output::probe_device(device_name.as_deref())?;
                (format.sample_rate, format.channels)
            }
        };

        info!(
            "Audio context created ({:?}, {} Hz, {} channels)",
            host, sample_rate, channels
        );

        Ok(Self {
            inner: Arc::new(ContextInner {
                host: host.clone(),
                sample_rate,
                channels,
                created_at: Instant::now(),
                state: Mutex::new(ContextState::Suspended),
                destination: Mutex::new(Vec::new()),
                sources: Mutex::new(Vec::new()),
                output: Mutex::new(None),
                resume_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    pub fn state(&self) -> ContextState {
        *self.inner.state.lock()
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn host(&self) -> &AudioHost {
        &self.inner.host
    }

    /// Seconds since the context was created
    pub fn current_time(&self) -> f64 {
        (Instant::now() - self.inner.created_at).as_secs_f64()
    }

    /// Start rendering. No-op when already running.
    pub async fn resume(&self) -> Result<()> {
        let _guard = self.inner.resume_lock.lock().await;

        match self.state() {
            ContextState::Running => return Ok(()),
            ContextState::Closed => {
                return Err(Error::InvalidState("Cannot resume a closed context".to_string()))
            }
            ContextState::Suspended => {}
        }

        if let AudioHost::Device { device_name } = &self.inner.host {
            let weak: Weak<ContextInner> = Arc::downgrade(&self.inner);
            let render: RenderFn = Arc::new(move |t0, out| match weak.upgrade() {
                Some(inner) => inner.render(t0, out),
                None => out.fill(0.0),
            });
            let device = DeviceOutput::start(device_name.clone(), render).await?;
            *self.inner.output.lock() = Some(device);
        }

        let mut state = self.inner.state.lock();
        // close() may have raced the device startup
        if *state == ContextState::Closed {
            self.inner.output.lock().take();
            return Err(Error::InvalidState("Context closed while resuming".to_string()));
        }
        *state = ContextState::Running;
        debug!("Audio context running");
        Ok(())
    }

    /// Stop every source, release the output device and refuse further use
    pub fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == ContextState::Closed {
                return;
            }
            *state = ContextState::Closed;
        }

        let sources: Vec<BufferSource> = self.inner.sources.lock().drain(..).collect();
        for source in sources {
            let _ = source.stop();
            source.disconnect();
        }
        self.inner.destination.lock().clear();
        self.inner.output.lock().take();
        info!("Audio context closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state() == ContextState::Closed {
            return Err(Error::InvalidState("Audio context is closed".to_string()));
        }
        Ok(())
    }

    pub fn create_gain(&self, initial: f32) -> Result<GainNode> {
        self.ensure_open()?;
        Ok(GainNode::new(initial))
    }

    pub fn create_buffer_source(&self, buffer: Arc<AudioBuffer>, looping: bool) -> Result<BufferSource> {
        self.ensure_open()?;
        let source = BufferSource::new(buffer, looping);
        let mut sources = self.inner.sources.lock();
        sources.retain(|s| s.is_connected() || s.state() == SourceState::Playing);
        sources.push(source.clone());
        Ok(source)
    }

    pub fn create_analyser(&self, options: AnalyserOptions) -> Result<AnalyserNode> {
        self.ensure_open()?;
        AnalyserNode::new(options, self.inner.sample_rate)
    }

    /// Route `gain` to the output bus
    pub fn connect_to_destination(&self, gain: &GainNode) {
        let mut destination = self.inner.destination.lock();
        destination.retain(|g| g.is_connected());
        if !destination.iter().any(|g| g.id() == gain.id()) {
            destination.push(gain.clone());
        }
    }

    /// Sources created by this context that are still playing or still wired up
    pub fn active_source_count(&self) -> usize {
        let mut sources = self.inner.sources.lock();
        sources.retain(|s| s.is_connected() || s.state() == SourceState::Playing);
        sources.len()
    }

    /// Gain nodes currently routed to the output bus
    pub fn destination_input_count(&self) -> usize {
        let mut destination = self.inner.destination.lock();
        destination.retain(|g| g.is_connected());
        destination.len()
    }

    /// Mix the output bus for the interval starting at `t0` into interleaved `out`
    pub fn render(&self, t0: Instant, out: &mut [f32]) {
        self.inner.render(t0, out);
    }
}

/// Availability of audio as last observed by [`ContextLifecycle::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioAvailability {
    Unknown,
    Available,
    Unsupported,
}

/// Owner of the process-wide context
pub struct ContextLifecycle {
    host: AudioHost,
    context: Mutex<Option<AudioContext>>,
    availability: Mutex<AudioAvailability>,
    init_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl ContextLifecycle {
    pub fn new(host: AudioHost) -> Self {
        Self {
            host,
            context: Mutex::new(None),
            availability: Mutex::new(AudioAvailability::Unknown),
            init_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Return the running context, creating and resuming it on first use.
    ///
    /// Repeated calls return the same instance.
    pub async fn acquire(&self) -> Result<AudioContext> {
        let _guard = self.init_lock.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::InvalidState("Audio lifecycle is closed".to_string()));
        }

        let existing = self.context.lock().clone();
        let context = match existing {
            Some(context) if context.state() != ContextState::Closed => context,
            _ => match AudioContext::open(&self.host) {
                Ok(context) => {
                    *self.context.lock() = Some(context.clone());
                    context
                }
                Err(e) => {
                    if e.is_environment_unsupported() {
                        *self.availability.lock() = AudioAvailability::Unsupported;
                    }
                    return Err(e);
                }
            },
        };

        if context.state() == ContextState::Suspended {
            if let Err(e) = context.resume().await {
                warn!("Failed to resume audio context: {}", e);
                return Err(e);
            }
        }

        *self.availability.lock() = AudioAvailability::Available;
        Ok(context)
    }

    /// The context if one has been acquired and not torn down
    pub fn current(&self) -> Option<AudioContext> {
        self.context
            .lock()
            .clone()
            .filter(|c| c.state() != ContextState::Closed)
    }

    pub fn availability(&self) -> AudioAvailability {
        *self.availability.lock()
    }

    /// Close and forget the context. A later `acquire` creates a fresh one.
    pub fn teardown(&self) {
        if let Some(context) = self.context.lock().take() {
            context.close();
        }
    }

    /// Tear down for good; every later `acquire` fails.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.teardown();
        info!("Audio lifecycle closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
