//! Directory-backed assets and file configuration, end to end

mod helpers;

use ambience_ap::assets::source::DirAssets;
use ambience_ap::assets::AssetLoader;
use ambience_ap::audio::context::AudioHost;
use ambience_ap::config::{AudioBackend, TomlConfig};
use ambience_ap::playback::PlaybackPhase;
use ambience_ap::visualizer::NullSink;
use ambience_ap::{Engine, Error};
use helpers::*;
use std::io::Write;
use std::sync::Arc;

fn write_asset(dir: &std::path::Path, name: &str, bytes: &[u8]) {
    std::fs::write(dir.join(format!("{}.wav", name)), bytes).unwrap();
}

#[tokio::test]
async fn test_dir_assets_pair_and_kicks_fallback() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "main", &sine_wav(500, 220.0, 0.3));
    write_asset(dir.path(), "main-kicks", &sine_wav(500, 60.0, 0.8));
    write_asset(dir.path(), "login", &sine_wav(500, 330.0, 0.3));

    let loader = AssetLoader::new(Arc::new(DirAssets::new(dir.path(), "wav")));

    let main = loader.load_pair("main").await.unwrap();
    assert!(!main.kicks_is_main());
    assert_eq!(main.main.sample_rate(), TEST_SAMPLE_RATE);
    assert_eq!(main.main.frames(), 4000);

    let login = loader.load_pair("login").await.unwrap();
    assert!(login.kicks_is_main());

    match loader.load_pair("create").await {
        Err(Error::AssetLoad { asset, status }) => {
            assert_eq!(asset, "create");
            assert_eq!(status, Some(404));
        }
        other => panic!("expected asset load error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test(start_paused = true)]
async fn test_engine_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "login", &silent_wav(1000));
    write_asset(dir.path(), "ahh", &sine_wav(50, 880.0, 0.5));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
initial_path = "/login"

[assets]
root = "{}"

[audio]
backend = "headless"
sample_rate = {}

[engine]
fade_tick_ms = 20
play_intro = false
"#,
        dir.path().display(),
        TEST_SAMPLE_RATE
    )
    .unwrap();

    let config = TomlConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.audio.backend, AudioBackend::Headless);
    let root = config.assets.root.clone().unwrap();

    let engine = Engine::new(
        &config,
        Arc::new(DirAssets::new(root, config.assets.extension.clone())),
        AudioHost::from_config(&config.audio),
        Arc::new(NullSink),
    );
    engine.init(&config.initial_path).await.unwrap();

    let orchestrator = engine.orchestrator();
    assert_eq!(orchestrator.current_loop().as_deref(), Some("login"));
    // 10 steps of 20 ms
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    let session = orchestrator.current_session().unwrap();
    assert_eq!(session.gain().value(), 0.5);
    assert!(session.buffers().kicks_is_main());

    // No main asset in the folder: the transition is aborted
    engine.navigation().on_location_changed("/").await;
    assert_eq!(orchestrator.phase(), PlaybackPhase::Playing);
    assert_eq!(orchestrator.current_loop().as_deref(), Some("login"));
    engine.shutdown();
}

#[tokio::test]
async fn test_invalid_config_file_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[visualizer]\nfft_size = 100").unwrap();
    assert!(matches!(TomlConfig::load(Some(file.path())), Err(Error::Config(_))));
}
