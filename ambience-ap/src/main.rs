//! Ambience Audio Player (ambience-ap) - Main entry point
//!
//! Boots the engine against the configured asset source and audio backend
//! and serves the HTTP/SSE control surface until Ctrl-C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use ambience_ap::assets::source::{AssetSource, DirAssets, HttpAssets};
use ambience_ap::audio::context::AudioHost;
use ambience_ap::audio::output;
use ambience_ap::config::{AudioBackend, TomlConfig};
use ambience_ap::{api, Engine};
use ambience_common::config::{default_asset_root, resolve_config_path, CONFIG_ENV_VAR};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ambience-ap
#[derive(Parser, Debug)]
#[command(name = "ambience-ap")]
#[command(about = "Page-aware ambient audio player")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "AMBIENCE_PORT")]
    port: Option<u16>,

    /// Folder holding sound assets
    #[arg(short, long, env = "AMBIENCE_ASSETS")]
    assets: Option<PathBuf>,

    /// Base URL serving sound assets (takes precedence over --assets)
    #[arg(long, env = "AMBIENCE_ASSET_URL")]
    asset_url: Option<String>,

    /// Audio backend
    #[arg(short, long, value_enum, env = "AMBIENCE_BACKEND")]
    backend: Option<AudioBackend>,

    /// Location to initialize against
    #[arg(long, env = "AMBIENCE_INITIAL_PATH")]
    initial_path: Option<String>,

    /// List audio output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR)
        .context("Failed to resolve configuration file")?;
    let mut config =
        TomlConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ambience_ap={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.list_devices {
        for device in output::list_devices().context("Failed to list audio devices")? {
            println!("{}", device);
        }
        return Ok(());
    }

    info!("Starting ambience audio player on port {}", config.port);
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let assets = asset_source(&config)?;
    let host = AudioHost::from_config(&config.audio);
    info!("Audio host: {:?}", host);

    let engine = Arc::new(Engine::with_event_sink(&config, assets, host));

    let init_engine = Arc::clone(&engine);
    let initial_path = config.initial_path.clone();
    tokio::spawn(async move {
        if let Err(e) = init_engine.init(&initial_path).await {
            error!("Engine initialization failed: {}", e);
        }
    });

    api::run(config.port, Arc::clone(&engine), shutdown_signal())
        .await
        .context("Server error")?;

    engine.shutdown();
    info!("Shutdown complete");
    Ok(())
}

fn apply_overrides(config: &mut TomlConfig, args: &Args) {
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(root) = &args.assets {
        config.assets.root = Some(root.clone());
    }
    if let Some(url) = &args.asset_url {
        config.assets.base_url = Some(url.clone());
    }
    if let Some(backend) = args.backend {
        config.audio.backend = backend;
    }
    if let Some(path) = &args.initial_path {
        config.initial_path = path.clone();
    }
}

fn asset_source(config: &TomlConfig) -> Result<Arc<dyn AssetSource>> {
    let ext = config.assets.extension.clone();
    if let Some(url) = &config.assets.base_url {
        let source = HttpAssets::new(url.clone(), ext)
            .map_err(|e| anyhow::anyhow!("Invalid asset URL {}: {}", url, e))?;
        return Ok(Arc::new(source));
    }

    let root = config.assets.root.clone().unwrap_or_else(default_asset_root);
    if !root.is_dir() {
        warn!("Asset folder {} does not exist", root.display());
    }
    Ok(Arc::new(DirAssets::new(root, ext)))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
