//! Frequency-magnitude analysis node
//!
//! Follows the usual analyser pipeline: the most recent `fft_size` frames of
//! the connected inputs (mono mix) are Blackman-windowed, transformed, smoothed
//! over time and mapped from decibels onto 0-255.

use crate::audio::nodes::{next_node_id, GainNode, NodeId};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Analyser construction parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserOptions {
    /// FFT window in frames (power of two)
    pub fft_size: usize,
    /// Time smoothing constant (0.0-1.0)
    pub smoothing: f32,
    /// dB mapped to byte 0
    pub min_decibels: f32,
    /// dB mapped to byte 255
    pub max_decibels: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: 512,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

struct AnalyserInner {
    id: NodeId,
    options: AnalyserOptions,
    sample_rate: u32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    inputs: Mutex<Vec<GainNode>>,
    smoothed: Mutex<Vec<f32>>,
}

/// Read-only tap on one or more gain nodes
#[derive(Clone)]
pub struct AnalyserNode {
    inner: Arc<AnalyserInner>,
}

impl std::fmt::Debug for AnalyserNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyserNode")
            .field("id", &self.inner.id)
            .field("options", &self.inner.options)
            .finish()
    }
}

fn blackman(n: usize) -> Vec<f32> {
    let size = n as f32;
    (0..n)
        .map(|i| {
            let x = i as f32 / size;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

impl AnalyserNode {
    pub(crate) fn new(options: AnalyserOptions, sample_rate: u32) -> Result<Self> {
        if !options.fft_size.is_power_of_two() || options.fft_size < 32 {
            return Err(Error::InvalidState(format!(
                "Analyser fft_size {} is not a power of two >= 32",
                options.fft_size
            )));
        }
        if options.min_decibels >= options.max_decibels {
            return Err(Error::InvalidState(
                "Analyser min_decibels must be below max_decibels".to_string(),
            ));
        }

        let fft = FftPlanner::<f32>::new().plan_fft_forward(options.fft_size);
        let bins = options.fft_size / 2;

        Ok(Self {
            inner: Arc::new(AnalyserInner {
                id: next_node_id(),
                options,
                sample_rate,
                fft,
                window: blackman(options.fft_size),
                inputs: Mutex::new(Vec::new()),
                smoothed: Mutex::new(vec![0.0; bins]),
            }),
        })
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn options(&self) -> AnalyserOptions {
        self.inner.options
    }

    /// Half the FFT size
    pub fn frequency_bin_count(&self) -> usize {
        self.inner.options.fft_size / 2
    }

    /// Feed `gain`'s output into this analyser
    pub fn connect_input(&self, gain: &GainNode) {
        let mut inputs = self.inner.inputs.lock();
        inputs.retain(|g| g.is_connected());
        if !inputs.iter().any(|g| g.id() == gain.id()) {
            inputs.push(gain.clone());
        }
    }

    pub fn input_count(&self) -> usize {
        let mut inputs = self.inner.inputs.lock();
        inputs.retain(|g| g.is_connected());
        inputs.len()
    }

    /// Fill `out` with byte magnitudes of the window ending now.
    ///
    /// Writes at most `frequency_bin_count()` values.
    pub fn get_byte_frequency_data(&self, out: &mut [u8]) {
        self.byte_frequency_data_at(Instant::now(), out);
    }

    pub(crate) fn byte_frequency_data_at(&self, now: Instant, out: &mut [u8]) {
        let options = self.inner.options;
        let n = options.fft_size;
        let rate = self.inner.sample_rate;

        let mut time_domain = vec![0.0f32; n];
        let window_span = Duration::from_secs_f64(n as f64 / rate as f64);
        let t0 = now.checked_sub(window_span).unwrap_or(now);
        {
            let mut inputs = self.inner.inputs.lock();
            inputs.retain(|g| g.is_connected());
            for gain in inputs.iter() {
                gain.render_add(t0, rate, 1, &mut time_domain);
            }
        }

        let mut spectrum: Vec<Complex<f32>> = time_domain
            .iter()
            .zip(&self.inner.window)
            .map(|(s, w)| Complex::new(s * w, 0.0))
            .collect();
        self.inner.fft.process(&mut spectrum);

        let tau = options.smoothing;
        let range = options.max_decibels - options.min_decibels;
        let mut smoothed = self.inner.smoothed.lock();

        for (k, (prev, byte)) in smoothed.iter_mut().zip(out.iter_mut()).enumerate() {
            let magnitude = spectrum[k].norm() / n as f32;
            let value = tau * *prev + (1.0 - tau) * magnitude;
            *prev = if value.is_finite() { value } else { 0.0 };

            let db = 20.0 * prev.log10();
            let scaled = 255.0 * (db - options.min_decibels) / range;
            *byte = if scaled.is_nan() { 0 } else { scaled.clamp(0.0, 255.0) as u8 };
        }
    }
}
