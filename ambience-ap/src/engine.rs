//! Engine facade
//!
//! One owned [`Engine`] wires every component together and is handed to the
//! UI entry points (the HTTP surface, tests, embedding hosts) by reference.
//! There is no ambient global instance.

use crate::assets::source::AssetSource;
use crate::assets::AssetLoader;
use crate::audio::analyser::AnalyserOptions;
use crate::audio::context::{AudioAvailability, AudioHost, ContextLifecycle};
use crate::config::{EngineSettings, TomlConfig};
use crate::error::Result;
use crate::navigation::{EventNavigator, NavigationBridge};
use crate::playback::click::{ClickEffectPlayer, ClickOutcome};
use crate::playback::fader::{FadeController, FadeSettings};
use crate::playback::orchestrator::{CrossfadeOrchestrator, PlaybackPhase, RequestOutcome, StartOptions};
use crate::playback::session::SessionSettings;
use crate::state::SharedState;
use crate::visualizer::sink::{Control, EventSink, RenderSink};
use crate::visualizer::{Visualizer, VisualizerParams};
use ambience_common::events::AmbienceEvent;
use ambience_common::PageState;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub phase: PlaybackPhase,
    pub current_loop: Option<String>,
    pub page: PageState,
    pub muted: bool,
    pub effects_suppressed: bool,
    pub visualizer_active: bool,
    pub audio: AudioAvailability,
}

pub struct Engine {
    state: Arc<SharedState>,
    lifecycle: Arc<ContextLifecycle>,
    loader: AssetLoader,
    orchestrator: CrossfadeOrchestrator,
    click: ClickEffectPlayer,
    navigation: NavigationBridge,
    visualizer: Visualizer,
    sink: Arc<dyn RenderSink>,
    settings: EngineSettings,
    click_asset: String,
    intro_task: Mutex<Option<JoinHandle<()>>>,
    initialized: AtomicBool,
}

impl Engine {
    pub fn new(
        config: &TomlConfig,
        assets: Arc<dyn AssetSource>,
        host: AudioHost,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        Self::build(config, assets, host, |_| sink)
    }

    /// Engine whose sink publishes on its own event channel
    pub fn with_event_sink(config: &TomlConfig, assets: Arc<dyn AssetSource>, host: AudioHost) -> Self {
        Self::build(config, assets, host, |state| {
            Arc::new(EventSink::new(Arc::clone(state)))
        })
    }

    fn build<F>(config: &TomlConfig, assets: Arc<dyn AssetSource>, host: AudioHost, make_sink: F) -> Self
    where
        F: FnOnce(&Arc<SharedState>) -> Arc<dyn RenderSink>,
    {
        let state = Arc::new(SharedState::new());
        let sink = make_sink(&state);
        let lifecycle = Arc::new(ContextLifecycle::new(host));
        let loader = AssetLoader::new(assets);

        let settings = config.engine.clone();
        let fader = Arc::new(FadeController::new(
            FadeSettings {
                steps: settings.fade_steps,
                duration: settings.fade_duration(),
                nominal_volume: settings.nominal_volume,
            },
            Arc::clone(&state),
        ));

        let vis = &config.visualizer;
        let visualizer = Visualizer::new(
            VisualizerParams::from(vis),
            Arc::clone(&state),
            Arc::clone(&sink),
            Arc::new(vis.colors),
        );

        let session_settings = SessionSettings {
            analyser: AnalyserOptions {
                fft_size: vis.fft_size,
                smoothing: vis.smoothing,
                min_decibels: vis.min_decibels,
                max_decibels: vis.max_decibels,
            },
            kicks_analysis_gain: settings.kicks_analysis_gain,
        };

        let orchestrator = CrossfadeOrchestrator::new(
            Arc::clone(&lifecycle),
            loader.clone(),
            fader,
            visualizer.clone(),
            Arc::clone(&state),
            session_settings,
        );

        let navigation = NavigationBridge::new(
            Arc::clone(&state),
            orchestrator.clone(),
            Arc::new(EventNavigator::new(Arc::clone(&state))),
        );

        let click = ClickEffectPlayer::new(
            Arc::clone(&lifecycle),
            Arc::clone(&state),
            settings.click_cooldown(),
        );

        Self {
            state,
            lifecycle,
            loader,
            orchestrator,
            click,
            navigation,
            visualizer,
            sink,
            settings,
            click_asset: config.assets.click.clone(),
            intro_task: Mutex::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Start up against the host's current location.
    ///
    /// Performed once; later calls are ignored. Missing audio or assets are
    /// logged and leave the engine usable without sound. Any other audio
    /// failure is returned and init may be retried.
    pub async fn init(&self, initial_path: &str) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            warn!("Engine already initialized");
            return Ok(());
        }

        let page = PageState::from_path(initial_path);
        self.state.replace_page(page);
        info!("Initializing on {} (page {})", initial_path, page);

        self.sink.set_control(Control::Mute, self.state.is_muted());
        self.sink.set_control(Control::Effects, self.state.is_click_suppressed());
        self.visualizer.reset_output();

        if let Err(e) = self.lifecycle.acquire().await {
            if e.is_environment_unsupported() {
                warn!("Audio unavailable, continuing silently: {}", e);
                return Ok(());
            }
            self.initialized.store(false, Ordering::Release);
            return Err(e);
        }

        if let Err(e) = self.click.load(&self.loader, &self.click_asset).await {
            warn!("Click effect unavailable: {}", e);
        }

        if page == PageState::Main && self.settings.play_intro {
            let task = tokio::spawn(run_intro(self.orchestrator.clone(), self.loader.clone()));
            *self.intro_task.lock() = Some(task);
        } else if let Err(e) = self.orchestrator.start(page.loop_name()).await {
            debug!("Initial loop not started: {}", e);
        }
        Ok(())
    }

    /// Stop playback and close the audio context for good. The machine ends
    /// Idle and later requests fail without reopening audio.
    pub fn shutdown(&self) {
        if let Some(task) = self.intro_task.lock().take() {
            task.abort();
        }
        self.orchestrator.shutdown();
        self.lifecycle.close();
        info!("Engine shut down");
    }

    /// Flip mute and return the new value
    pub fn toggle_mute(&self) -> bool {
        let muted = self.state.toggle_muted();
        self.orchestrator.on_mute_changed(muted);
        if muted {
            self.visualizer.reset_output();
        }
        self.sink.set_control(Control::Mute, muted);
        self.state.broadcast_event(AmbienceEvent::MuteChanged {
            muted,
            timestamp: chrono::Utc::now(),
        });
        info!("Mute {}", if muted { "on" } else { "off" });
        muted
    }

    /// Flip click-effect suppression and return the new value
    pub fn toggle_effect_suppress(&self) -> bool {
        let suppressed = self.state.toggle_click_suppressed();
        self.sink.set_control(Control::Effects, suppressed);
        self.state.broadcast_event(AmbienceEvent::EffectSuppressChanged {
            suppressed,
            timestamp: chrono::Utc::now(),
        });
        suppressed
    }

    /// Play the click effect (default volume when `None`)
    pub fn play_click(&self, volume: Option<f32>) -> ClickOutcome {
        let outcome = self
            .click
            .play(volume.unwrap_or(self.settings.default_click_volume));
        debug!("Click: {:?}", outcome);
        outcome
    }

    pub fn navigation(&self) -> &NavigationBridge {
        &self.navigation
    }

    pub fn orchestrator(&self) -> &CrossfadeOrchestrator {
        &self.orchestrator
    }

    pub fn lifecycle(&self) -> &Arc<ContextLifecycle> {
        &self.lifecycle
    }

    pub fn visualizer(&self) -> &Visualizer {
        &self.visualizer
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            phase: self.orchestrator.phase(),
            current_loop: self.orchestrator.current_loop(),
            page: self.state.page(),
            muted: self.state.is_muted(),
            effects_suppressed: self.state.is_click_suppressed(),
            visualizer_active: self.state.is_visualizer_active(),
            audio: self.lifecycle.availability(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AmbienceEvent> {
        self.state.subscribe_events()
    }
}

/// Intro first, `main` pre-loading alongside; `main` follows without a fade-in
async fn run_intro(orchestrator: CrossfadeOrchestrator, loader: AssetLoader) {
    let main = PageState::Main.loop_name();
    let preload = tokio::spawn(async move { loader.load_pair(main).await });

    let intro_played = match orchestrator.play_intro().await {
        Ok(RequestOutcome::Started { session_id }) => {
            orchestrator.wait_session_end(session_id).await;
            true
        }
        Ok(outcome) => {
            debug!("Intro not played: {:?}", outcome);
            false
        }
        Err(e) => {
            warn!("Intro unavailable, starting main loop: {}", e);
            false
        }
    };

    let preloaded = match preload.await {
        Ok(Ok(buffers)) => {
            orchestrator.cache_buffers(main, buffers.clone());
            Some(buffers)
        }
        Ok(Err(e)) => {
            debug!("Main preload failed: {}", e);
            None
        }
        Err(e) => {
            debug!("Main preload task failed: {}", e);
            None
        }
    };

    let options = StartOptions {
        skip_fade_in: intro_played,
        preloaded,
        only_if_idle: true,
        ..Default::default()
    };
    match orchestrator.request(main, options).await {
        Ok(outcome) => debug!("Main after intro: {:?}", outcome),
        Err(e) => debug!("Main loop not started: {}", e),
    }
}
