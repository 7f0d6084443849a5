//! Video playback through the external rendering component
//!
//! No engine handle is owned here. Every control becomes an intent for the
//! video component, and play/pause state is tracked optimistically.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Ack, BackendContext, PlaybackBackend, SeekOutcome, clamp_position};
use crate::error::{PlayerError, Result};
use crate::model::{ContentRecord, ContentType};
use crate::platform::{ViewBridge, ViewIntent};

pub struct VideoBackend {
    view: Arc<dyn ViewBridge>,
    duration: f64,
    live: bool,
}

impl VideoBackend {
    pub fn initialize(record: &ContentRecord, ctx: BackendContext) -> Result<Self> {
        let src = record.video_source().ok_or_else(|| PlayerError::BackendInitFailed {
            content_type: ContentType::Video,
            reason: "content has no video source".to_string(),
        })?;

        ctx.view.emit(ViewIntent::VideoInitialize {
            src: src.to_string(),
            poster: record.poster().map(str::to_string),
            duration_hint: record.duration,
            events: ctx.events.clone(),
        });

        Ok(Self {
            view: ctx.view,
            duration: record.duration.unwrap_or(0.0),
            live: true,
        })
    }
}

#[async_trait]
impl PlaybackBackend for VideoBackend {
    fn content_type(&self) -> ContentType {
        ContentType::Video
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    async fn play(&mut self) -> Result<Ack> {
        self.view.emit(ViewIntent::VideoPlay);
        Ok(Ack::Immediate)
    }

    async fn pause(&mut self) -> Result<Ack> {
        self.view.emit(ViewIntent::VideoPause);
        Ok(Ack::Immediate)
    }

    async fn stop(&mut self) -> Result<()> {
        self.view.emit(ViewIntent::VideoStop);
        Ok(())
    }

    async fn seek(&mut self, position: f64, duration: f64) -> Result<SeekOutcome> {
        let target = clamp_position(position, duration);
        self.view.emit(ViewIntent::VideoSeek(target));
        Ok(SeekOutcome {
            position: target,
            scroll_offset: None,
        })
    }

    async fn teardown(&mut self) {
        if self.live {
            self.live = false;
            self.view.emit(ViewIntent::VideoDestroy);
        }
    }
}
