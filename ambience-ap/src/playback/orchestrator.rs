//! Crossfade orchestrator
//!
//! Owns the playback state machine:
//!
//! ```text
//! Idle --request--> Playing --request--> Transitioning --fade-out done--> Playing
//!                      ^                     |  request: replace incoming
//!                      |                     v
//!                      +---- intro ends ---- Idle
//! ```
//!
//! Buffers are loaded before the machine is touched, so a failed load leaves
//! it exactly as it was. The machine lock is never held across an await.
//! Lock order is machine, then fade ramps, then visualizer.
//!
//! Requests are numbered when they arrive. A request whose load completes
//! after a newer request has already been applied is discarded, so the last
//! navigation wins regardless of load latency.

use crate::assets::{AssetLoader, DecodedBufferPair};
use crate::audio::context::ContextLifecycle;
use crate::error::{Error, Result};
use crate::playback::fader::FadeController;
use crate::playback::session::{PlaybackSession, SessionSettings};
use crate::state::SharedState;
use crate::visualizer::Visualizer;
use ambience_common::events::AmbienceEvent;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Asset name of the first-load intro track
pub const INTRO_LOOP: &str = "intro";

/// Observable machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    Idle,
    Playing,
    Transitioning,
}

enum Machine {
    Idle,
    Playing(Arc<PlaybackSession>),
    Transitioning {
        outgoing: Arc<PlaybackSession>,
        incoming: Arc<PlaybackSession>,
    },
}

impl Machine {
    fn phase(&self) -> PlaybackPhase {
        match self {
            Machine::Idle => PlaybackPhase::Idle,
            Machine::Playing(_) => PlaybackPhase::Playing,
            Machine::Transitioning { .. } => PlaybackPhase::Transitioning,
        }
    }

    /// The session that is (or will be, once the fade-out ends) audible
    fn current(&self) -> Option<&Arc<PlaybackSession>> {
        match self {
            Machine::Idle => None,
            Machine::Playing(session) => Some(session),
            Machine::Transitioning { incoming, .. } => Some(incoming),
        }
    }

    fn find(&self, id: Uuid) -> Option<&Arc<PlaybackSession>> {
        match self {
            Machine::Idle => None,
            Machine::Playing(session) => Some(session).filter(|s| s.id() == id),
            Machine::Transitioning { outgoing, incoming } => {
                [outgoing, incoming].into_iter().find(|s| s.id() == id)
            }
        }
    }
}

struct MachineState {
    machine: Machine,
    next_seq: u64,
    applied_seq: u64,
}

/// How a request should start its session
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Loop seamlessly (false for the intro)
    pub looping: bool,
    /// Set gain straight to nominal instead of ramping, when starting from Idle
    pub skip_fade_in: bool,
    /// Buffers loaded ahead of time
    pub preloaded: Option<DecodedBufferPair>,
    /// Only start when nothing is playing
    pub only_if_idle: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            looping: true,
            skip_fade_in: false,
            preloaded: None,
            only_if_idle: false,
        }
    }
}

impl StartOptions {
    /// Non-looping playback (the intro)
    pub fn one_shot() -> Self {
        Self {
            looping: false,
            ..Default::default()
        }
    }
}

/// What a request did to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Idle -> Playing
    Started { session_id: Uuid },
    /// Playing -> Transitioning
    TransitionStarted { session_id: Uuid },
    /// Transitioning with a new incoming session
    Retargeted { session_id: Uuid },
    /// Already the current loop
    Unchanged,
    /// A newer request was applied while this one loaded
    Superseded,
    /// `only_if_idle` and something was already playing
    Skipped,
}

struct Inner {
    lifecycle: Arc<ContextLifecycle>,
    loader: AssetLoader,
    fader: Arc<FadeController>,
    visualizer: Visualizer,
    state: Arc<SharedState>,
    settings: SessionSettings,
    machine: Mutex<MachineState>,
    cache: Mutex<HashMap<String, DecodedBufferPair>>,
}

/// Cheap cloneable handle to the playback state machine
#[derive(Clone)]
pub struct CrossfadeOrchestrator {
    inner: Arc<Inner>,
}

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

impl CrossfadeOrchestrator {
    pub fn new(
        lifecycle: Arc<ContextLifecycle>,
        loader: AssetLoader,
        fader: Arc<FadeController>,
        visualizer: Visualizer,
        state: Arc<SharedState>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                lifecycle,
                loader,
                fader,
                visualizer,
                state,
                settings,
                machine: Mutex::new(MachineState {
                    machine: Machine::Idle,
                    next_seq: 0,
                    applied_seq: 0,
                }),
                cache: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.inner.machine.lock().machine.phase()
    }

    /// Loop of the current session ("current" includes a pending incoming session)
    pub fn current_loop(&self) -> Option<String> {
        self.inner
            .machine
            .lock()
            .machine
            .current()
            .map(|s| s.loop_name().to_string())
    }

    pub fn current_session(&self) -> Option<Arc<PlaybackSession>> {
        self.inner.machine.lock().machine.current().cloned()
    }

    /// Session fading out, while transitioning
    pub fn outgoing_session(&self) -> Option<Arc<PlaybackSession>> {
        match &self.inner.machine.lock().machine {
            Machine::Transitioning { outgoing, .. } => Some(Arc::clone(outgoing)),
            _ => None,
        }
    }

    pub fn fader(&self) -> &Arc<FadeController> {
        &self.inner.fader
    }

    pub fn visualizer(&self) -> &Visualizer {
        &self.inner.visualizer
    }

    /// Start `loop_name` from Idle
    pub async fn start(&self, loop_name: &str) -> Result<RequestOutcome> {
        self.request(loop_name, StartOptions::default()).await
    }

    /// Crossfade to `loop_name`, or start it if nothing plays
    pub async fn transition(&self, loop_name: &str) -> Result<RequestOutcome> {
        self.request(loop_name, StartOptions::default()).await
    }

    /// Play the one-shot intro pair
    pub async fn play_intro(&self) -> Result<RequestOutcome> {
        self.request(INTRO_LOOP, StartOptions::one_shot()).await
    }

    /// Make `loop_name` the current loop.
    ///
    /// Load failures are logged, broadcast as `TransitionAborted` and returned;
    /// the machine is left untouched.
    pub async fn request(&self, loop_name: &str, options: StartOptions) -> Result<RequestOutcome> {
        let seq = {
            let mut st = self.inner.machine.lock();
            st.next_seq += 1;
            let seq = st.next_seq;
            if st.machine.current().map(|s| s.loop_name()) == Some(loop_name) {
                st.applied_seq = seq;
                debug!("'{}' is already the current loop", loop_name);
                return Ok(RequestOutcome::Unchanged);
            }
            if options.only_if_idle && !matches!(st.machine, Machine::Idle) {
                return Ok(RequestOutcome::Skipped);
            }
            seq
        };

        let context = match self.inner.lifecycle.acquire().await {
            Ok(context) => context,
            Err(e) if e.is_environment_unsupported() => {
                debug!("No audio, '{}' not started: {}", loop_name, e);
                return Err(e);
            }
            Err(e) => return Err(self.abort(loop_name, e)),
        };

        let buffers = match options.preloaded.clone() {
            Some(buffers) => buffers,
            None => match self.load(loop_name).await {
                Ok(buffers) => buffers,
                Err(e) => return Err(self.abort(loop_name, e)),
            },
        };

        let session = match PlaybackSession::build(
            &context,
            loop_name,
            buffers,
            options.looping,
            &self.inner.settings,
        ) {
            Ok(session) => Arc::new(session),
            Err(e) => return Err(self.abort(loop_name, e)),
        };

        self.apply(seq, session, &options)
    }

    async fn load(&self, loop_name: &str) -> Result<DecodedBufferPair> {
        let cached = self.inner.cache.lock().get(loop_name).cloned();
        if let Some(buffers) = cached {
            debug!("Reusing cached buffers for '{}'", loop_name);
            return Ok(buffers);
        }
        let buffers = self.inner.loader.load_pair(loop_name).await?;
        self.inner
            .cache
            .lock()
            .insert(loop_name.to_string(), buffers.clone());
        Ok(buffers)
    }

    /// Remember buffers loaded elsewhere (the intro's main preload)
    pub fn cache_buffers(&self, loop_name: &str, buffers: DecodedBufferPair) {
        self.inner.cache.lock().insert(loop_name.to_string(), buffers);
    }

    fn abort(&self, loop_name: &str, e: Error) -> Error {
        warn!("Playback of '{}' aborted, keeping current state: {}", loop_name, e);
        self.inner.state.broadcast_event(AmbienceEvent::TransitionAborted {
            loop_name: loop_name.to_string(),
            reason: e.to_string(),
            timestamp: now(),
        });
        e
    }

    fn apply(&self, seq: u64, session: Arc<PlaybackSession>, options: &StartOptions) -> Result<RequestOutcome> {
        let mut st = self.inner.machine.lock();

        if seq < st.applied_seq {
            debug!("Request for '{}' superseded while loading", session.loop_name());
            session.teardown();
            return Ok(RequestOutcome::Superseded);
        }
        if options.only_if_idle && !matches!(st.machine, Machine::Idle) {
            session.teardown();
            return Ok(RequestOutcome::Skipped);
        }
        st.applied_seq = seq;

        let session_id = session.id();
        match std::mem::replace(&mut st.machine, Machine::Idle) {
            Machine::Idle => {
                if let Err(e) = session.start() {
                    session.teardown();
                    return Err(self.abort(session.loop_name(), e));
                }
                let faded_in = if options.skip_fade_in {
                    self.inner.fader.set_audible(session.gain());
                    false
                } else {
                    self.inner.fader.fade_in(session.gain());
                    !self.inner.state.is_muted()
                };
                if !self.inner.state.is_muted() {
                    self.inner.visualizer.arm(session.analyser().clone());
                }
                st.machine = Machine::Playing(Arc::clone(&session));
                drop(st);

                info!("Started '{}' (session {})", session.loop_name(), session_id);
                self.announce_started(&session, faded_in);
                Ok(RequestOutcome::Started { session_id })
            }

            Machine::Playing(outgoing) => {
                self.inner.visualizer.stop();
                info!(
                    "Transition '{}' -> '{}'",
                    outgoing.loop_name(),
                    session.loop_name()
                );
                self.inner.state.broadcast_event(AmbienceEvent::TransitionStarted {
                    from: outgoing.loop_name().to_string(),
                    to: session.loop_name().to_string(),
                    timestamp: now(),
                });

                let outgoing_id = outgoing.id();
                let outgoing_gain = outgoing.gain().clone();
                st.machine = Machine::Transitioning {
                    outgoing,
                    incoming: session,
                };
                // A zero-length fade completes inline and re-locks the machine
                drop(st);

                let this = self.clone();
                self.inner.fader.fade_out(
                    &outgoing_gain,
                    Box::new(move || this.complete_transition(outgoing_id)),
                );
                Ok(RequestOutcome::TransitionStarted { session_id })
            }

            Machine::Transitioning { outgoing, incoming } => {
                debug!(
                    "Retargeting transition from '{}' to '{}'",
                    incoming.loop_name(),
                    session.loop_name()
                );
                incoming.teardown();
                st.machine = Machine::Transitioning {
                    outgoing,
                    incoming: session,
                };
                Ok(RequestOutcome::Retargeted { session_id })
            }
        }
    }

    fn announce_started(&self, session: &Arc<PlaybackSession>, faded_in: bool) {
        self.inner.state.broadcast_event(AmbienceEvent::LoopStarted {
            loop_name: session.loop_name().to_string(),
            session_id: session.id(),
            faded_in,
            timestamp: now(),
        });
        if !session.is_looping() {
            let this = self.clone();
            let session = Arc::clone(session);
            tokio::spawn(async move {
                session.ended().await;
                this.on_session_ended(session.id());
            });
        }
    }

    /// Fade-out completion for the session `outgoing_id`
    fn complete_transition(&self, outgoing_id: Uuid) {
        let mut st = self.inner.machine.lock();
        match &st.machine {
            Machine::Transitioning { outgoing, .. } if outgoing.id() == outgoing_id => {}
            _ => {
                debug!("Stale fade-out completion for session {}", outgoing_id);
                return;
            }
        }
        if let Some(started) = self.finish_transition(&mut st) {
            drop(st);
            self.announce_started(&started, !self.inner.state.is_muted());
        }
    }

    /// Retire the outgoing session and start the incoming one.
    ///
    /// Returns the session that became audible.
    fn finish_transition(&self, st: &mut MachineState) -> Option<Arc<PlaybackSession>> {
        let (outgoing, incoming) = match std::mem::replace(&mut st.machine, Machine::Idle) {
            Machine::Transitioning { outgoing, incoming } => (outgoing, incoming),
            other => {
                st.machine = other;
                return None;
            }
        };

        self.inner.fader.cancel(outgoing.gain());
        outgoing.teardown();

        if let Err(e) = incoming.start() {
            error!("Failed to start '{}': {}", incoming.loop_name(), e);
            incoming.teardown();
            self.abort(incoming.loop_name(), e);
            return None;
        }
        self.inner.fader.fade_in(incoming.gain());
        if !self.inner.state.is_muted() {
            self.inner.visualizer.arm(incoming.analyser().clone());
        }
        st.machine = Machine::Playing(Arc::clone(&incoming));

        info!("Transition to '{}' complete", incoming.loop_name());
        self.inner.state.broadcast_event(AmbienceEvent::TransitionCompleted {
            loop_name: incoming.loop_name().to_string(),
            timestamp: now(),
        });
        Some(incoming)
    }

    /// A one-shot session reached its end (or was stopped)
    fn on_session_ended(&self, session_id: Uuid) {
        let mut st = self.inner.machine.lock();
        let finished = match &st.machine {
            Machine::Playing(session) if session.id() == session_id => Arc::clone(session),
            _ => return,
        };

        self.inner.visualizer.stop();
        self.inner.fader.cancel(finished.gain());
        finished.teardown();
        st.machine = Machine::Idle;
        drop(st);

        info!("'{}' finished", finished.loop_name());
        if finished.loop_name() == INTRO_LOOP {
            self.inner
                .state
                .broadcast_event(AmbienceEvent::IntroFinished { timestamp: now() });
        }
    }

    /// Wait until the session `session_id` has stopped.
    ///
    /// Returns at once if the machine no longer holds it.
    pub async fn wait_session_end(&self, session_id: Uuid) {
        let session = self.inner.machine.lock().machine.find(session_id).cloned();
        if let Some(session) = session {
            session.ended().await;
            self.on_session_ended(session_id);
        }
    }

    /// Apply a mute flag change to the current session.
    ///
    /// Muting silences at once and stops the visualizer; a transition in
    /// flight completes immediately. Unmuting restores the nominal volume and
    /// re-arms the visualizer from a fresh state.
    pub fn on_mute_changed(&self, muted: bool) {
        let mut st = self.inner.machine.lock();

        if muted {
            self.inner.visualizer.stop();
            if matches!(st.machine, Machine::Transitioning { .. }) {
                if let Some(started) = self.finish_transition(&mut st) {
                    drop(st);
                    self.announce_started(&started, false);
                }
                return;
            }
            if let Machine::Playing(session) = &st.machine {
                self.inner.fader.set_immediate(session.gain(), 0.0);
            }
            return;
        }

        if let Machine::Playing(session) = &st.machine {
            self.inner.fader.set_audible(session.gain());
            self.inner.visualizer.arm(session.analyser().clone());
        }
    }

    /// Stop everything and return to Idle. In-flight requests are discarded.
    pub fn shutdown(&self) {
        let mut st = self.inner.machine.lock();
        st.applied_seq = st.next_seq + 1;
        st.next_seq = st.applied_seq;

        self.inner.visualizer.stop();
        self.inner.fader.cancel_all();
        match std::mem::replace(&mut st.machine, Machine::Idle) {
            Machine::Idle => {}
            Machine::Playing(session) => session.teardown(),
            Machine::Transitioning { outgoing, incoming } => {
                outgoing.teardown();
                incoming.teardown();
            }
        }
        info!("Playback stopped");
    }
}
