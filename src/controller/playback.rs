//! Playback control methods

use crate::backend::{self, Ack, PlaybackBackend};
use crate::error::{PlayerError, Result};
use crate::model::{
    ContentRecord, ContentType, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE, PlaybackSession,
    PlaybackState, RepeatMode,
};

use super::PlayerController;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    Next,
    Previous,
}

impl PlayerController {
    /// Load `content` (with an optional queue it sits in at `index`) and start it.
    ///
    /// The live backend is reused when the same content of the same type is
    /// already loaded; otherwise it is torn down before the new one is
    /// initialized. On failure the session is left Idle with the error
    /// recorded and no backend live.
    pub async fn play_content(
        &self,
        content: ContentRecord,
        queue: Option<Vec<ContentRecord>>,
        index: usize,
    ) -> Result<()> {
        if let Err(e) = PlaybackSession::validate_queue(queue.as_deref(), index) {
            tracing::warn!(error = %e, "Rejected queue");
            return Err(e);
        }

        let content_type = ContentType::resolve(&content);
        tracing::info!(
            content_id = %content.id,
            title = %content.title,
            %content_type,
            queue_len = queue.as_ref().map_or(1, Vec::len),
            index,
            "Playing content"
        );

        let mut slot = self.backend.lock().await;

        let (reuse, settings) = {
            let mut session = self.session.lock().await;
            let reuse = slot.is_some() && session.is_loaded(&content, content_type);
            session.state = PlaybackState::Loading;
            session.error = None;
            (reuse, session.settings.clone())
        };

        if !reuse {
            let generation = self.release_backend(&mut slot).await;
            let ctx = self.backend_context(generation, &settings);
            match backend::initialize(content_type, &content, ctx).await {
                Ok(ready) => {
                    self.session
                        .lock()
                        .await
                        .load(content.clone(), content_type, ready.duration());
                    *slot = Some(ready);
                }
                Err(e) => return Err(self.surface_error(e, PlaybackState::Idle).await),
            }
        }

        self.session.lock().await.set_queue(&content, queue, index);

        let Some(active) = slot.as_mut() else {
            return Err(PlayerError::NoActiveContent);
        };
        if let Err(e) = self.start(active.as_mut()).await {
            self.release_backend(&mut slot).await;
            return Err(self.surface_error(e, PlaybackState::Idle).await);
        }
        drop(slot);

        self.append_history(&content, content_type).await;
        self.report_start(&content, content_type);
        Ok(())
    }

    /// Tear down the live backend after invalidating its events. Returns the new generation.
    async fn release_backend(&self, slot: &mut Option<Box<dyn PlaybackBackend>>) -> u64 {
        let generation = {
            let mut session = self.session.lock().await;
            session.generation += 1;
            session.unload();
            session.generation
        };
        if let Some(mut old) = slot.take() {
            tracing::debug!(content_type = %old.content_type(), generation, "Releasing backend");
            old.teardown().await;
        }
        generation
    }

    /// Begin or resume playback. Finished content starts over.
    pub(crate) async fn start(&self, backend: &mut dyn PlaybackBackend) -> Result<()> {
        let (finished, duration) = {
            let session = self.session.lock().await;
            (
                session.state == PlaybackState::Ended || session.reached_end(),
                session.duration,
            )
        };
        if finished {
            let outcome = backend.seek(0.0, duration).await?;
            self.session
                .lock()
                .await
                .apply_seek(outcome.position, outcome.scroll_offset);
        }

        let ack = backend.play().await?;
        if ack == Ack::Immediate {
            let mut session = self.session.lock().await;
            session.state = PlaybackState::Playing;
            session.buffering = false;
        }
        Ok(())
    }

    pub async fn play(&self) -> Result<()> {
        let mut slot = self.backend.lock().await;
        let Some(active) = slot.as_mut() else {
            return Err(PlayerError::NoActiveContent);
        };
        tracing::debug!("Resuming playback");
        if let Err(e) = self.start(active.as_mut()).await {
            return Err(self.surface_error(e, PlaybackState::Error).await);
        }
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let mut slot = self.backend.lock().await;
        let Some(active) = slot.as_mut() else {
            return Err(PlayerError::NoActiveContent);
        };
        tracing::debug!("Pausing playback");
        match active.pause().await {
            Ok(Ack::Immediate) => {
                let mut session = self.session.lock().await;
                if session.state != PlaybackState::Ended {
                    session.state = PlaybackState::Paused;
                }
                Ok(())
            }
            Ok(Ack::Deferred) => Ok(()),
            Err(e) => Err(self.surface_error(e, PlaybackState::Error).await),
        }
    }

    pub async fn toggle_play(&self) -> Result<()> {
        if self.state().await.is_playing() {
            self.pause().await
        } else {
            self.play().await
        }
    }

    pub async fn stop(&self) -> Result<()> {
        let mut slot = self.backend.lock().await;
        let Some(active) = slot.as_mut() else {
            return Err(PlayerError::NoActiveContent);
        };
        if let Err(e) = active.stop().await {
            return Err(self.surface_error(e, PlaybackState::Error).await);
        }
        let mut session = self.session.lock().await;
        session.state = PlaybackState::Idle;
        session.current_time = 0.0;
        session.buffering = false;
        tracing::info!("Playback stopped");
        Ok(())
    }

    /// Seek to `position` seconds. Negative positions are rejected without touching the session.
    pub async fn seek(&self, position: f64) -> Result<()> {
        if !position.is_finite() || position < 0.0 {
            tracing::warn!(position, "Rejected seek");
            return Err(PlayerError::InvalidSeek(position));
        }

        let mut slot = self.backend.lock().await;
        let Some(active) = slot.as_mut() else {
            return Err(PlayerError::NoActiveContent);
        };
        let duration = self.session.lock().await.duration;
        match active.seek(position, duration).await {
            Ok(outcome) => {
                tracing::debug!(requested = position, applied = outcome.position, "Seeked");
                self.session
                    .lock()
                    .await
                    .apply_seek(outcome.position, outcome.scroll_offset);
                Ok(())
            }
            Err(e) => Err(self.surface_error(e, PlaybackState::Error).await),
        }
    }

    /// Skip forward in the queue. Returns `false` when there is nothing to skip to.
    pub async fn play_next(&self) -> Result<bool> {
        self.advance(Direction::Next, true).await
    }

    pub async fn play_previous(&self) -> Result<bool> {
        self.advance(Direction::Previous, true).await
    }

    pub(crate) async fn advance(&self, direction: Direction, user_initiated: bool) -> Result<bool> {
        let (index, queue) = {
            let mut session = self.session.lock().await;
            let index = match direction {
                Direction::Next => self.with_rng(|rng| session.next_index(rng)),
                Direction::Previous => session.previous_index(),
            };
            let Some(index) = index else {
                tracing::debug!(?direction, "Nothing to move to");
                return Ok(false);
            };
            if user_initiated
                && session.current_content.is_some()
                && session.state != PlaybackState::Ended
            {
                session.stats.skip_count += 1;
            }
            (index, session.queue.clone())
        };

        let Some(content) = queue.get(index).cloned() else {
            return Ok(false);
        };
        tracing::debug!(?direction, index, "Moving in queue");
        self.play_content(content, Some(queue), index).await?;
        Ok(true)
    }

    pub async fn set_shuffle(&self, enabled: bool) {
        self.session.lock().await.settings.shuffle = enabled;
        tracing::info!(enabled, "Shuffle changed");
    }

    pub async fn toggle_shuffle(&self) -> bool {
        let mut session = self.session.lock().await;
        session.settings.shuffle = !session.settings.shuffle;
        tracing::info!(enabled = session.settings.shuffle, "Shuffle toggled");
        session.settings.shuffle
    }

    pub async fn set_repeat(&self, mode: RepeatMode) {
        self.session.lock().await.settings.repeat = mode;
        tracing::info!(%mode, "Repeat mode changed");
    }

    /// none → all → one → none
    pub async fn cycle_repeat(&self) -> RepeatMode {
        let mut session = self.session.lock().await;
        session.settings.repeat = session.settings.repeat.next();
        tracing::info!(mode = %session.settings.repeat, "Repeat mode cycled");
        session.settings.repeat
    }

    pub async fn set_autoplay_next(&self, enabled: bool) {
        self.session.lock().await.settings.autoplay_next = enabled;
        tracing::info!(enabled, "Autoplay changed");
    }

    pub async fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        let mut slot = self.backend.lock().await;
        self.session.lock().await.settings.volume = volume;
        if let Some(active) = slot.as_mut() {
            active.set_volume(volume);
        }
        tracing::debug!(volume, "Volume changed");
    }

    pub async fn set_playback_rate(&self, rate: f32) {
        let rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        let mut slot = self.backend.lock().await;
        self.session.lock().await.settings.playback_rate = rate;
        if let Some(active) = slot.as_mut() {
            active.set_playback_rate(rate);
        }
        tracing::debug!(rate, "Playback rate changed");
    }

    /// Flip text-to-speech for the loaded article. Returns the resulting setting.
    pub async fn toggle_tts(&self) -> Result<bool> {
        let mut slot = self.backend.lock().await;
        let (current, playing) = {
            let session = self.session.lock().await;
            (session.settings.tts_enabled, session.state.is_playing())
        };
        let Some(active) = slot.as_mut() else {
            tracing::debug!("Text-to-speech toggle ignored, nothing loaded");
            return Ok(current);
        };

        match active.set_speech(!current, playing).await {
            Ok(true) => {
                self.session.lock().await.settings.tts_enabled = !current;
                tracing::info!(enabled = !current, "Text-to-speech toggled");
                Ok(!current)
            }
            Ok(false) => {
                tracing::debug!(content_type = %active.content_type(), "Text-to-speech only applies to articles");
                Ok(current)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Text-to-speech toggle failed");
                self.caps.notifier.notify(&e.user_message());
                Err(e)
            }
        }
    }

    /// Release the backend and every timer, then reset the session. Preferences and history survive.
    pub async fn destroy(&self) {
        let mut slot = self.backend.lock().await;
        self.release_backend(&mut slot).await;
        self.session.lock().await.reset();
        tracing::info!("Player destroyed");
    }
}
