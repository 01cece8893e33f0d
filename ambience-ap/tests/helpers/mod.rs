//! Test helpers for ambience-ap integration tests
//!
//! - WAV fixture generation (hound, in memory)
//! - A fully stocked in-memory asset source
//! - A headless engine configuration
//! - A sink that records everything written to it

#![allow(dead_code)]

pub mod audio_generator;
pub mod recording_sink;

pub use audio_generator::{silent_wav, sine_wav, TEST_SAMPLE_RATE};
pub use recording_sink::RecordingSink;

use ambience_ap::assets::source::MemoryAssets;
use ambience_ap::audio::context::AudioHost;
use ambience_ap::config::{AudioBackend, TomlConfig};
use ambience_ap::Engine;
use std::sync::Arc;

/// Loops every page uses, plus the intro
pub const LOOPS: [&str; 4] = ["main", "login", "create", "intro"];

/// In-memory assets: 2 s loops, a 1 s intro and a 50 ms click
pub fn fixture_assets() -> Arc<MemoryAssets> {
    let assets = MemoryAssets::new();
    for (i, name) in LOOPS.iter().enumerate() {
        let duration_ms = if *name == "intro" { 1000 } else { 2000 };
        assets.insert(*name, sine_wav(duration_ms, 220.0 * (i + 1) as f32, 0.3));
        assets.insert(format!("{}-kicks", name), sine_wav(duration_ms, 60.0, 0.8));
    }
    assets.insert("ahh", sine_wav(50, 880.0, 0.5));
    Arc::new(assets)
}

/// Headless audio at the fixture sample rate, intro disabled
pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.audio.backend = AudioBackend::Headless;
    config.audio.sample_rate = TEST_SAMPLE_RATE;
    config.engine.play_intro = false;
    config
}

pub struct TestEngine {
    pub engine: Arc<Engine>,
    pub assets: Arc<MemoryAssets>,
    pub sink: Arc<RecordingSink>,
}

/// Engine over `config` and `assets`, not yet initialized
pub fn build_engine(config: &TomlConfig, assets: Arc<MemoryAssets>) -> TestEngine {
    let sink = Arc::new(RecordingSink::default());
    let engine = Arc::new(Engine::new(
        config,
        assets.clone(),
        AudioHost::from_config(&config.audio),
        sink.clone(),
    ));
    TestEngine { engine, assets, sink }
}

/// Initialized engine on `path` with the fixture assets
pub async fn started_engine(path: &str) -> TestEngine {
    let test = build_engine(&test_config(), fixture_assets());
    test.engine.init(path).await.unwrap();
    test
}

/// Let fades (500 ms at the defaults) and spawned tasks run to completion
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(700)).await;
}

/// Everything currently queued on `rx`
pub fn drain_events(
    rx: &mut tokio::sync::broadcast::Receiver<ambience_common::AmbienceEvent>,
) -> Vec<ambience_common::AmbienceEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
