//! Audio playback on a native engine handle

use async_trait::async_trait;

use super::{Ack, BackendContext, PlaybackBackend, SeekOutcome, clamp_position};
use crate::error::{PlayerError, Result};
use crate::model::{ContentRecord, ContentType};
use crate::platform::{AudioHandle, AudioSource};

pub struct AudioBackend {
    handle: Option<Box<dyn AudioHandle>>,
    duration: f64,
}

impl AudioBackend {
    pub async fn initialize(record: &ContentRecord, ctx: BackendContext) -> Result<Self> {
        let url = record.audio_source().ok_or_else(|| PlayerError::BackendInitFailed {
            content_type: ContentType::Audio,
            reason: "content has no audio source".to_string(),
        })?;

        let mut source = AudioSource::single(url, record.duration);
        source.volume = ctx.volume;
        source.playback_rate = ctx.playback_rate;

        let handle = ctx
            .audio
            .open(source, ctx.events.clone())
            .await
            .map_err(|e| PlayerError::BackendInitFailed {
                content_type: ContentType::Audio,
                reason: format!("{:#}", e),
            })?;

        let duration = handle.duration().or(record.duration).unwrap_or(0.0);
        tracing::info!(content_id = %record.id, url, duration, "Audio handle opened");

        Ok(Self {
            handle: Some(handle),
            duration,
        })
    }

    fn handle(&mut self) -> Result<&mut Box<dyn AudioHandle>> {
        self.handle
            .as_mut()
            .ok_or_else(|| PlayerError::PlaybackFailed("audio handle already released".to_string()))
    }
}

fn playback_failed(e: anyhow::Error) -> PlayerError {
    PlayerError::PlaybackFailed(format!("{:#}", e))
}

#[async_trait]
impl PlaybackBackend for AudioBackend {
    fn content_type(&self) -> ContentType {
        ContentType::Audio
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    async fn play(&mut self) -> Result<Ack> {
        self.handle()?.play().await.map_err(playback_failed)?;
        Ok(Ack::Deferred)
    }

    async fn pause(&mut self) -> Result<Ack> {
        self.handle()?.pause().await.map_err(playback_failed)?;
        Ok(Ack::Deferred)
    }

    async fn stop(&mut self) -> Result<()> {
        self.handle()?.stop().await.map_err(playback_failed)
    }

    async fn seek(&mut self, position: f64, duration: f64) -> Result<SeekOutcome> {
        let target = clamp_position(position, duration);
        self.handle()?.seek(target).await.map_err(playback_failed)?;
        Ok(SeekOutcome {
            position: target,
            scroll_offset: None,
        })
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(handle) = self.handle.as_mut() {
            handle.set_volume(volume);
        }
    }

    fn set_playback_rate(&mut self, rate: f32) {
        if let Some(handle) = self.handle.as_mut() {
            handle.set_playback_rate(rate);
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release().await;
            tracing::debug!("Audio handle released");
        }
    }
}
