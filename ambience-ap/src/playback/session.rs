//! Playback sessions
//!
//! A session is one loop on the graph: main and kicks sources, the audible
//! gain, the kicks analysis gain and the analyser both feed. Sessions are
//! built complete (sources constructed and connected) before anything is
//! started, and torn down as a unit.

use crate::assets::DecodedBufferPair;
use crate::audio::analyser::{AnalyserNode, AnalyserOptions};
use crate::audio::context::AudioContext;
use crate::audio::nodes::{BufferSource, GainNode, SourceState, StopError};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Graph wiring parameters for new sessions
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub analyser: AnalyserOptions,
    /// Gain of the kicks layer into the analyser; it never reaches the output
    pub kicks_analysis_gain: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            analyser: AnalyserOptions::default(),
            kicks_analysis_gain: 1.0,
        }
    }
}

/// One loop's sources and nodes
pub struct PlaybackSession {
    id: Uuid,
    loop_name: String,
    looping: bool,
    main: BufferSource,
    kicks: BufferSource,
    gain: GainNode,
    kicks_gain: GainNode,
    analyser: AnalyserNode,
    buffers: DecodedBufferPair,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("loop_name", &self.loop_name)
            .field("looping", &self.looping)
            .field("main", &self.main.state())
            .field("gain", &self.gain.value())
            .finish()
    }
}

impl PlaybackSession {
    /// Construct and wire a session at gain 0. Nothing plays until [`start`](Self::start).
    pub fn build(
        context: &AudioContext,
        loop_name: &str,
        buffers: DecodedBufferPair,
        looping: bool,
        settings: &SessionSettings,
    ) -> Result<Self> {
        let gain = context.create_gain(0.0)?;
        let kicks_gain = context.create_gain(settings.kicks_analysis_gain)?;
        let analyser = context.create_analyser(settings.analyser)?;

        context.connect_to_destination(&gain);
        analyser.connect_input(&gain);
        analyser.connect_input(&kicks_gain);

        let main = context.create_buffer_source(Arc::clone(&buffers.main), looping)?;
        main.connect(&gain);
        let kicks = context.create_buffer_source(Arc::clone(&buffers.kicks), looping)?;
        kicks.connect(&kicks_gain);

        let session = Self {
            id: Uuid::new_v4(),
            loop_name: loop_name.to_string(),
            looping,
            main,
            kicks,
            gain,
            kicks_gain,
            analyser,
            buffers,
        };
        debug!("Built session {} for '{}'", session.id, session.loop_name);
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn loop_name(&self) -> &str {
        &self.loop_name
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn gain(&self) -> &GainNode {
        &self.gain
    }

    pub fn analyser(&self) -> &AnalyserNode {
        &self.analyser
    }

    pub fn main_source(&self) -> &BufferSource {
        &self.main
    }

    pub fn kicks_source(&self) -> &BufferSource {
        &self.kicks
    }

    pub fn buffers(&self) -> &DecodedBufferPair {
        &self.buffers
    }

    /// Start both sources at the loop point
    pub fn start(&self) -> Result<()> {
        self.main.start(Duration::ZERO)?;
        self.kicks.start(Duration::ZERO)?;
        debug!("Session {} ('{}') started", self.id, self.loop_name);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.main.state() != SourceState::Unstarted
    }

    /// Neither source playing and nothing left connected
    pub fn is_stopped(&self) -> bool {
        self.main.state() != SourceState::Playing
            && self.kicks.state() != SourceState::Playing
            && !self.main.is_connected()
            && !self.kicks.is_connected()
            && !self.gain.is_connected()
    }

    /// Resolves when the main source ends
    pub async fn ended(&self) {
        self.main.ended().await;
    }

    /// Stop and disconnect everything.
    ///
    /// "Never started" and "already stopped" are expected here and only logged.
    pub fn teardown(&self) {
        for (layer, source) in [("main", &self.main), ("kicks", &self.kicks)] {
            match source.stop() {
                Ok(()) => {}
                Err(e @ (StopError::NotStarted | StopError::AlreadyStopped)) => {
                    debug!("Session {} {} source: {}", self.id, layer, e);
                }
            }
            source.disconnect();
        }
        self.gain.disconnect();
        self.kicks_gain.disconnect();
        debug!("Session {} ('{}') torn down", self.id, self.loop_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::AudioBuffer;
    use crate::audio::context::AudioHost;

    fn pair() -> DecodedBufferPair {
        let main = Arc::new(AudioBuffer::new(vec![vec![0.25; 800]], 8000).unwrap());
        DecodedBufferPair {
            kicks: Arc::clone(&main),
            main,
        }
    }

    fn context() -> AudioContext {
        AudioContext::open(&AudioHost::Headless { sample_rate: 8000 }).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_wires_graph_silently() {
        let context = context();
        let session = PlaybackSession::build(&context, "main", pair(), true, &SessionSettings::default()).unwrap();

        assert_eq!(session.gain().value(), 0.0);
        assert!(!session.is_started());
        assert_eq!(context.destination_input_count(), 1);
        assert_eq!(session.analyser().input_count(), 2);
        assert_eq!(context.active_source_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_before_start_is_benign() {
        let context = context();
        let session = PlaybackSession::build(&context, "login", pair(), true, &SessionSettings::default()).unwrap();

        session.teardown();
        assert!(session.is_stopped());
        assert_eq!(context.active_source_count(), 0);
        assert_eq!(context.destination_input_count(), 0);

        // A second teardown only logs
        session.teardown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_session_ends() {
        let context = context();
        let session = PlaybackSession::build(&context, "intro", pair(), false, &SessionSettings::default()).unwrap();
        session.start().unwrap();
        assert!(session.is_started());

        // 800 frames at 8 kHz
        tokio::time::timeout(Duration::from_millis(150), session.ended())
            .await
            .unwrap();
        assert!(!session.is_looping());
    }
}
