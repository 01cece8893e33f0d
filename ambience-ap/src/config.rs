//! Configuration management for the ambience audio player
//!
//! Bootstrap configuration is a single TOML file. Every field has a built-in
//! default, so a missing file or a partial file is valid.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--port, --assets, --backend, ...)
//! 2. Environment variables (AMBIENCE_CONFIG, AMBIENCE_PORT, ...)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use crate::visualizer::intensity::IntensityParams;
use crate::visualizer::policy::TealPulse;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,

    /// Location the engine initializes against when no client reports one
    pub initial_path: String,

    /// Where sound assets come from
    pub assets: AssetConfig,

    /// Audio backend selection
    pub audio: AudioConfig,

    /// Playback tuning
    pub engine: EngineSettings,

    /// Visual feedback tuning
    pub visualizer: VisualizerSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: 5760,
            initial_path: "/".to_string(),
            assets: AssetConfig::default(),
            audio: AudioConfig::default(),
            engine: EngineSettings::default(),
            visualizer: VisualizerSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from `path`, or built-in defaults when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: TomlConfig = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                ambience_common::config::read_toml(path)?
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                TomlConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.visualizer.validate()?;
        if self.assets.extension.is_empty() {
            return Err(Error::Config("assets.extension must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Asset source configuration
///
/// `base_url` takes precedence over `root` when both are set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Local folder holding `{name}.{extension}` files
    pub root: Option<PathBuf>,

    /// HTTP base URL serving `{name}.{extension}` files
    pub base_url: Option<String>,

    /// File extension of loop assets
    pub extension: String,

    /// Asset name of the click effect
    pub click: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: None,
            base_url: None,
            extension: "wav".to_string(),
            click: "ahh".to_string(),
        }
    }
}

/// Which audio host to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    /// System output device via cpal
    Device,
    /// Clock-driven graph without an output device
    Headless,
    /// No audio capability (playback degrades to silent no-op)
    #[serde(rename = "none")]
    #[value(name = "none")]
    Disabled,
}

/// Audio backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub backend: AudioBackend,

    /// Output device name (None = system default)
    pub device_name: Option<String>,

    /// Context sample rate for the headless backend
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: AudioBackend::Device,
            device_name: None,
            sample_rate: 44100,
        }
    }
}

/// Playback tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Gain of an audible loop
    pub nominal_volume: f32,

    /// Discrete steps per fade ramp
    pub fade_steps: u32,

    /// Interval between fade steps (milliseconds)
    pub fade_tick_ms: u64,

    /// Minimum interval between click effects (milliseconds)
    pub click_cooldown_ms: u64,

    /// Gain of a click when the caller gives none
    pub default_click_volume: f32,

    /// Gain of the kicks layer into the analyser (never audible)
    pub kicks_analysis_gain: f32,

    /// Play the intro track before the main loop on first load
    pub play_intro: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            nominal_volume: 0.5,
            fade_steps: 10,
            fade_tick_ms: 50,
            click_cooldown_ms: 200,
            default_click_volume: 0.7,
            kicks_analysis_gain: 1.0,
            play_intro: true,
        }
    }
}

impl EngineSettings {
    /// Wall-clock length of a full fade ramp
    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_tick_ms * self.fade_steps as u64)
    }

    pub fn click_cooldown(&self) -> Duration {
        Duration::from_millis(self.click_cooldown_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.fade_steps == 0 {
            return Err(Error::Config("engine.fade_steps must be at least 1".to_string()));
        }
        if self.fade_tick_ms == 0 {
            return Err(Error::Config("engine.fade_tick_ms must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.nominal_volume) {
            return Err(Error::Config(format!(
                "engine.nominal_volume must be within 0.0-1.0 (got {})",
                self.nominal_volume
            )));
        }
        if self.kicks_analysis_gain < 0.0 {
            return Err(Error::Config("engine.kicks_analysis_gain must not be negative".to_string()));
        }
        Ok(())
    }
}

/// Visual feedback tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisualizerSettings {
    /// Interval between frames (milliseconds); ~60 Hz display refresh by default
    pub frame_interval_ms: u64,

    /// Analyser FFT window (power of two)
    pub fft_size: usize,

    /// Analyser time smoothing constant (0.0-1.0)
    pub smoothing: f32,

    /// Analyser byte mapping floor (dB)
    pub min_decibels: f32,

    /// Analyser byte mapping ceiling (dB)
    pub max_decibels: f32,

    /// Number of lowest frequency bins treated as the kick band
    pub kick_band_bins: usize,

    /// Intensity transform constants
    pub intensity: IntensityParams,

    /// Colour policy constants
    pub colors: TealPulse,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            fft_size: 512,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            kick_band_bins: 40,
            intensity: IntensityParams::default(),
            colors: TealPulse::default(),
        }
    }
}

impl VisualizerSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(Error::Config(format!(
                "visualizer.fft_size must be a power of two within 32-32768 (got {})",
                self.fft_size
            )));
        }
        if self.kick_band_bins == 0 || self.kick_band_bins > self.fft_size / 2 {
            return Err(Error::Config(format!(
                "visualizer.kick_band_bins must be within 1-{}",
                self.fft_size / 2
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(Error::Config("visualizer.smoothing must be within 0.0-1.0".to_string()));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(Error::Config(
                "visualizer.min_decibels must be below max_decibels".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
