//! Content-type specific playback backends
//!
//! Each content type gets one implementation of [`PlaybackBackend`]. The
//! controller holds at most one live backend and only talks to it through the
//! trait; [`initialize`] is the one place that maps a content type to an
//! implementation.

mod article;
mod audio;
mod video;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use article::ArticleBackend;
pub use audio::AudioBackend;
pub use video::VideoBackend;

use crate::error::Result;
use crate::model::{ContentRecord, ContentType};
use crate::platform::{AudioEngine, EventSink, SpeechSynthesizer, ViewBridge};
use crate::tts::{DEFAULT_CHUNK_SIZE, SpeechOptions};

pub const DEFAULT_READING_CHARS_PER_MINUTE: u32 = 250;

/// How a play/pause request was acknowledged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ack {
    /// The state change is in effect now.
    Immediate,
    /// The engine confirms asynchronously with a `Playing`/`Paused` event.
    Deferred,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeekOutcome {
    /// Position actually applied, in seconds
    pub position: f64,
    /// Set when the position was reinterpreted as a scroll offset
    pub scroll_offset: Option<f64>,
}

#[async_trait]
pub trait PlaybackBackend: Send {
    fn content_type(&self) -> ContentType;

    /// Duration known at initialization, in seconds (0 when unknown)
    fn duration(&self) -> f64;

    async fn play(&mut self) -> Result<Ack>;

    async fn pause(&mut self) -> Result<Ack>;

    async fn stop(&mut self) -> Result<()>;

    /// Seek to a non-negative `position`; `duration` is the session's current view of it.
    async fn seek(&mut self, position: f64, duration: f64) -> Result<SeekOutcome>;

    fn set_volume(&mut self, _volume: f32) {}

    fn set_playback_rate(&mut self, _rate: f32) {}

    /// Switch text-to-speech on or off. Returns `false` when the backend has no speech mode.
    async fn set_speech(&mut self, _enabled: bool, _playing: bool) -> Result<bool> {
        Ok(false)
    }

    /// Release every resource held. Called exactly once before the backend is dropped.
    async fn teardown(&mut self);
}

/// Article reading and speech settings
#[derive(Clone, Debug)]
pub struct ArticleOptions {
    pub chars_per_minute: u32,
    pub chunk_size: usize,
    pub speech: SpeechOptions,
    pub speech_poll_interval: Duration,
    pub speech_timeout: Duration,
}

impl Default for ArticleOptions {
    fn default() -> Self {
        Self {
            chars_per_minute: DEFAULT_READING_CHARS_PER_MINUTE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            speech: SpeechOptions::default(),
            speech_poll_interval: Duration::from_secs(1),
            speech_timeout: Duration::from_secs(60),
        }
    }
}

/// Everything a backend needs at initialization
#[derive(Clone)]
pub struct BackendContext {
    pub audio: Arc<dyn AudioEngine>,
    pub view: Arc<dyn ViewBridge>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub events: EventSink,
    pub volume: f32,
    pub playback_rate: f32,
    pub tts_enabled: bool,
    pub article: ArticleOptions,
}

/// Build and initialize the backend for `content_type`.
pub async fn initialize(
    content_type: ContentType,
    record: &ContentRecord,
    ctx: BackendContext,
) -> Result<Box<dyn PlaybackBackend>> {
    tracing::debug!(
        content_id = %record.id,
        %content_type,
        generation = ctx.events.generation(),
        "Initializing playback backend"
    );

    let backend: Box<dyn PlaybackBackend> = match content_type {
        ContentType::Audio => Box::new(AudioBackend::initialize(record, ctx).await?),
        ContentType::Video => Box::new(VideoBackend::initialize(record, ctx)?),
        ContentType::Article => Box::new(ArticleBackend::initialize(record, ctx).await?),
    };
    Ok(backend)
}

/// Clamp into `[0, duration]`, leaving the upper bound open while the duration is unknown.
pub(crate) fn clamp_position(position: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        position.clamp(0.0, duration)
    } else {
        position.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_position() {
        assert_eq!(clamp_position(120.0, 100.0), 100.0);
        assert_eq!(clamp_position(50.0, 100.0), 50.0);
        assert_eq!(clamp_position(500.0, 0.0), 500.0);
    }
}
