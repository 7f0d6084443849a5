//! Backend event listener
//!
//! Engines, the video component and the reading timer all report through
//! one channel. Events are applied in arrival order; anything stamped with
//! an old generation comes from a torn-down backend and is dropped.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::PlayerError;
use crate::model::{PlaybackState, RepeatMode};
use crate::platform::{BackendEvent, MediaEvent};

use super::PlayerController;
use super::playback::Direction;

/// Work that needs the backend lock, done after the session lock is released
enum FollowUp {
    Ended,
    Failed(String),
}

impl PlayerController {
    pub(crate) fn start_event_listener(
        &self,
        mut events: mpsc::UnboundedReceiver<BackendEvent>,
    ) -> JoinHandle<()> {
        let controller = self.clone();
        tracing::info!("Starting backend event listener");

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.handle_event(event).await;
            }
            tracing::debug!("Backend event listener shutting down");
        })
    }

    /// Apply one backend event to the session.
    pub async fn handle_event(&self, event: BackendEvent) {
        let BackendEvent { generation, event } = event;

        let follow_up = {
            let mut session = self.session.lock().await;
            if generation != session.generation {
                tracing::trace!(
                    generation,
                    current = session.generation,
                    event = ?event,
                    "Ignoring stale backend event"
                );
                return;
            }

            match event {
                MediaEvent::Playing => {
                    tracing::debug!("MediaEvent::Playing");
                    session.state = PlaybackState::Playing;
                    session.buffering = false;
                    None
                }
                MediaEvent::Paused => {
                    tracing::debug!("MediaEvent::Paused");
                    if session.state != PlaybackState::Ended {
                        session.state = PlaybackState::Paused;
                    }
                    None
                }
                MediaEvent::Stopped => {
                    tracing::debug!("MediaEvent::Stopped");
                    session.state = PlaybackState::Idle;
                    session.current_time = 0.0;
                    None
                }
                MediaEvent::TimeUpdate { position, duration } => {
                    tracing::trace!(position, duration, "MediaEvent::TimeUpdate");
                    session.update_progress(position, duration);
                    None
                }
                MediaEvent::ReadingTick => {
                    session.advance_reading(1.0);
                    tracing::trace!(current_time = session.current_time, "MediaEvent::ReadingTick");
                    // An article with no text has nothing to read and ends on the first tick.
                    if session.state.is_playing() && (session.reached_end() || session.duration <= 0.0) {
                        Some(FollowUp::Ended)
                    } else {
                        None
                    }
                }
                MediaEvent::Waiting => {
                    session.buffering = true;
                    None
                }
                MediaEvent::CanPlay => {
                    session.buffering = false;
                    None
                }
                MediaEvent::Ended => Some(FollowUp::Ended),
                MediaEvent::Error(message) => Some(FollowUp::Failed(message)),
            }
        };

        match follow_up {
            Some(FollowUp::Ended) => self.on_content_ended(generation).await,
            Some(FollowUp::Failed(message)) => {
                if self.session.lock().await.generation == generation {
                    self.surface_error(PlayerError::PlaybackFailed(message), PlaybackState::Error)
                        .await;
                }
            }
            None => {}
        }
    }

    /// Natural completion: report it, then repeat, advance or settle.
    async fn on_content_ended(&self, generation: u64) {
        let finished = {
            let mut session = self.session.lock().await;
            if session.generation != generation || session.state == PlaybackState::Ended {
                return;
            }
            if session.duration > 0.0 {
                let duration = session.duration;
                session.update_progress(duration, duration);
            }
            session.state = PlaybackState::Ended;
            session.buffering = false;
            let play_duration = session.take_content_play_time();

            match (session.current_content.clone(), session.content_type) {
                (Some(content), Some(content_type)) => Some((
                    content,
                    content_type,
                    play_duration,
                    session.stats.completion_rate,
                    session.settings.repeat,
                    session.settings.autoplay_next,
                )),
                _ => None,
            }
        };
        let Some((content, content_type, play_duration, completion_rate, repeat, autoplay_next)) = finished
        else {
            return;
        };

        tracing::info!(
            content_id = %content.id,
            %content_type,
            play_duration,
            completion_rate,
            "Content ended"
        );
        self.report_complete(&content, content_type, play_duration, completion_rate);

        if repeat == RepeatMode::One {
            self.restart(generation).await;
        } else if autoplay_next {
            match self.advance(Direction::Next, false).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!("Reached the end of the queue");
                    self.settle(generation).await;
                }
                Err(e) => tracing::warn!(error = %e, "Could not start next content"),
            }
        } else {
            self.settle(generation).await;
        }
    }

    /// Park the finished backend so its timers and engine stop reporting.
    async fn settle(&self, generation: u64) {
        let mut slot = self.backend.lock().await;
        {
            let session = self.session.lock().await;
            if session.generation != generation || session.state != PlaybackState::Ended {
                return;
            }
        }
        let Some(active) = slot.as_mut() else {
            return;
        };
        if let Err(e) = active.pause().await {
            tracing::warn!(error = %e, "Could not pause finished content");
        }
    }

    async fn restart(&self, generation: u64) {
        let mut slot = self.backend.lock().await;
        if self.session.lock().await.generation != generation {
            return;
        }
        let Some(active) = slot.as_mut() else {
            return;
        };
        tracing::debug!("Repeating current content");
        if let Err(e) = self.start(active.as_mut()).await {
            self.surface_error(e, PlaybackState::Error).await;
        }
    }
}
