//! Click feedback effect
//!
//! Short one-shot sounds, rate limited by timestamp: a click inside the
//! cooldown window is dropped, never queued. Every play builds its own
//! source and gain, so nothing is shared between clicks or with the loops.

use crate::assets::AssetLoader;
use crate::audio::buffer::AudioBuffer;
use crate::audio::context::ContextLifecycle;
use crate::error::Result;
use crate::state::SharedState;
use ambience_common::events::AmbienceEvent;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of a click request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickOutcome {
    Played,
    /// Effect buffer not loaded (yet)
    NotLoaded,
    /// No audio context
    Unavailable,
    Muted,
    Suppressed,
    /// Inside the cooldown window
    CoolingDown,
}

pub struct ClickEffectPlayer {
    lifecycle: Arc<ContextLifecycle>,
    state: Arc<SharedState>,
    buffer: RwLock<Option<Arc<AudioBuffer>>>,
    cooldown: Duration,
}

impl ClickEffectPlayer {
    pub fn new(lifecycle: Arc<ContextLifecycle>, state: Arc<SharedState>, cooldown: Duration) -> Self {
        Self {
            lifecycle,
            state,
            buffer: RwLock::new(None),
            cooldown,
        }
    }

    /// Fetch and decode the effect asset
    pub async fn load(&self, loader: &AssetLoader, name: &str) -> Result<()> {
        let buffer = loader.load_effect(name).await?;
        *self.buffer.write() = Some(buffer);
        debug!("Click effect '{}' ready", name);
        Ok(())
    }

    pub fn set_buffer(&self, buffer: Arc<AudioBuffer>) {
        *self.buffer.write() = Some(buffer);
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.read().is_some()
    }

    /// Play the effect once at `volume`
    pub fn play(&self, volume: f32) -> ClickOutcome {
        let buffer = match self.buffer.read().clone() {
            Some(buffer) => buffer,
            None => return ClickOutcome::NotLoaded,
        };
        if self.state.is_muted() {
            return ClickOutcome::Muted;
        }
        if self.state.is_click_suppressed() {
            return ClickOutcome::Suppressed;
        }
        let context = match self.lifecycle.current() {
            Some(context) => context,
            None => return ClickOutcome::Unavailable,
        };
        if !self.state.try_claim_click(Instant::now(), self.cooldown) {
            return ClickOutcome::CoolingDown;
        }

        let volume = volume.clamp(0.0, 1.0);
        let played = context.create_gain(volume).and_then(|gain| {
            let source = context.create_buffer_source(buffer, false)?;
            source.connect(&gain);
            context.connect_to_destination(&gain);
            source.start(Duration::ZERO)?;
            Ok((source, gain))
        });

        match played {
            Ok((source, gain)) => {
                // Release the one-shot's nodes once it has played out
                tokio::spawn(async move {
                    source.ended().await;
                    source.disconnect();
                    gain.disconnect();
                });
                self.state.broadcast_event(AmbienceEvent::ClickPlayed {
                    volume,
                    timestamp: chrono::Utc::now(),
                });
                ClickOutcome::Played
            }
            Err(e) => {
                warn!("Click effect failed: {}", e);
                ClickOutcome::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::context::AudioHost;

    async fn player() -> (ClickEffectPlayer, Arc<SharedState>, Arc<ContextLifecycle>) {
        let lifecycle = Arc::new(ContextLifecycle::new(AudioHost::Headless { sample_rate: 8000 }));
        lifecycle.acquire().await.unwrap();
        let state = Arc::new(SharedState::new());
        let player = ClickEffectPlayer::new(
            Arc::clone(&lifecycle),
            Arc::clone(&state),
            Duration::from_millis(200),
        );
        (player, state, lifecycle)
    }

    fn blip() -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer::new(vec![vec![0.5; 400]], 8000).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_loaded_is_noop() {
        let (player, _, _) = player().await;
        assert_eq!(player.play(0.7), ClickOutcome::NotLoaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_click_inside_cooldown_is_dropped() {
        let (player, _, lifecycle) = player().await;
        player.set_buffer(blip());

        assert_eq!(player.play(0.7), ClickOutcome::Played);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(player.play(0.7), ClickOutcome::CoolingDown);

        tokio::time::advance(Duration::from_millis(101)).await;
        assert_eq!(player.play(0.7), ClickOutcome::Played);

        // 50ms one-shots release their nodes once played out
        tokio::time::sleep(Duration::from_millis(100)).await;
        let context = lifecycle.current().unwrap();
        assert_eq!(context.active_source_count(), 0);
        assert_eq!(context.destination_input_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_muted_and_suppressed_are_independent() {
        let (player, state, _) = player().await;
        player.set_buffer(blip());

        state.toggle_muted();
        assert_eq!(player.play(0.7), ClickOutcome::Muted);
        state.toggle_muted();

        state.toggle_click_suppressed();
        assert_eq!(player.play(0.7), ClickOutcome::Suppressed);
        state.toggle_click_suppressed();

        assert_eq!(player.play(0.7), ClickOutcome::Played);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_clicks_do_not_extend_cooldown() {
        let (player, _, _) = player().await;
        player.set_buffer(blip());

        assert_eq!(player.play(0.7), ClickOutcome::Played);
        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(player.play(0.7), ClickOutcome::CoolingDown);
        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(player.play(0.7), ClickOutcome::Played);
    }
}
