//! Audio output using cpal
//!
//! The cpal `Stream` is not `Send`, so it lives on a dedicated thread for its
//! whole life. The callback pulls the destination mix through a render
//! closure; the thread exits when the [`DeviceOutput`] handle is dropped.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Mixes destination audio for the interval starting at the given instant
pub type RenderFn = Arc<dyn Fn(Instant, &mut [f32]) + Send + Sync>;

/// Negotiated output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFormat {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Handle to a running output stream thread
pub struct DeviceOutput {
    format: DeviceFormat,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for DeviceOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceOutput").field("format", &self.format).finish()
    }
}

/// List available audio output devices.
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();

    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

/// Find the requested device, falling back to the system default.
///
/// No device at all means the host has no audio capability.
fn open_device(device_name: Option<&str>) -> Result<(Device, String)> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;
        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            info!("Found requested audio device: {}", name);
            return Ok((device, name.to_string()));
        }
        warn!("Requested device '{}' not found, falling back to default device", name);
    }

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::EnvironmentUnsupported("No audio output device available".to_string()))?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    Ok((device, name))
}

/// Prefer 44.1kHz stereo f32, else whatever the device defaults to
fn best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
    let mut supported = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

    let preferred = supported.find(|config| {
        config.channels() == 2
            && config.min_sample_rate().0 <= 44100
            && config.max_sample_rate().0 >= 44100
            && config.sample_format() == SampleFormat::F32
    });
    if let Some(config) = preferred {
        let format = config.sample_format();
        return Ok((config.with_sample_rate(cpal::SampleRate(44100)).config(), format));
    }

    let config = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
    Ok((config.config(), config.sample_format()))
}

/// Check for a usable device and report the format it would run at
pub fn probe_device(device_name: Option<&str>) -> Result<DeviceFormat> {
    let (device, name) = open_device(device_name)?;
    let (config, sample_format) = best_config(&device)?;
    debug!(
        "Probed '{}': sample_rate={}, channels={}, format={:?}",
        name, config.sample_rate.0, config.channels, sample_format
    );
    Ok(DeviceFormat {
        device_name: name,
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    })
}

/// Frame clock shared by the stream callback variants
struct FrameClock {
    origin: Instant,
    rate: f64,
    frames: u64,
}

impl FrameClock {
    fn advance(&mut self, frames: usize) -> Instant {
        let t0 = self.origin + Duration::from_secs_f64(self.frames as f64 / self.rate);
        self.frames += frames as u64;
        t0
    }
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    render: RenderFn,
) -> Result<Stream> {
    let channels = config.channels as usize;
    let mut clock = FrameClock {
        origin: Instant::now(),
        rate: config.sample_rate.0 as f64,
        frames: 0,
    };
    let mut scratch: Vec<f32> = Vec::new();
    let on_error = |err: cpal::StreamError| error!("Audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let t0 = clock.advance(data.len() / channels);
                data.fill(0.0);
                render(t0, data);
                for s in data.iter_mut() {
                    *s = s.clamp(-1.0, 1.0);
                }
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                let t0 = clock.advance(data.len() / channels);
                scratch.clear();
                scratch.resize(data.len(), 0.0);
                render(t0, &mut scratch);
                for (out, s) in data.iter_mut().zip(&scratch) {
                    *out = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                }
            },
            on_error,
            None,
        ),
        SampleFormat::U16 => device.build_output_stream(
            config,
            move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                let t0 = clock.advance(data.len() / channels);
                scratch.clear();
                scratch.resize(data.len(), 0.0);
                render(t0, &mut scratch);
                for (out, s) in data.iter_mut().zip(&scratch) {
                    *out = ((s.clamp(-1.0, 1.0) + 1.0) * 32767.5) as u16;
                }
            },
            on_error,
            None,
        ),
        other => {
            return Err(Error::AudioOutput(format!("Unsupported sample format: {:?}", other)));
        }
    };

    stream.map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

impl DeviceOutput {
    /// Open the device and start pulling audio from `render`.
    ///
    /// Resolves once the stream is playing or has failed to start.
    pub async fn start(device_name: Option<String>, render: RenderFn) -> Result<Self> {
        let (ready_tx, ready_rx) = oneshot::channel::<Result<DeviceFormat>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("ambience-output".to_string())
            .spawn(move || {
                let started = open_device(device_name.as_deref()).and_then(|(device, name)| {
                    let (config, sample_format) = best_config(&device)?;
                    let stream = build_stream(&device, &config, sample_format, render)?;
                    stream
                        .play()
                        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
                    let format = DeviceFormat {
                        device_name: name,
                        sample_rate: config.sample_rate.0,
                        channels: config.channels,
                    };
                    Ok((stream, format))
                });

                match started {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        // Block until the handle is dropped
                        let _ = stop_rx.recv();
                        drop(stream);
                        debug!("Audio output thread exiting");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {}", e)))?;

        let format = ready_rx
            .await
            .map_err(|_| Error::AudioOutput("Output thread exited during startup".to_string()))??;

        info!(
            "Audio stream started on '{}' ({} Hz, {} channels)",
            format.device_name, format.sample_rate, format.channels
        );

        Ok(Self {
            format,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn format(&self) -> &DeviceFormat {
        &self.format
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Audio output thread panicked");
            }
        }
    }
}
