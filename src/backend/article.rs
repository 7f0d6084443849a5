//! Article "playback": a reading timer, optionally replaced by synthesized speech

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::{Ack, ArticleOptions, BackendContext, PlaybackBackend, SeekOutcome, clamp_position};
use crate::error::{PlayerError, Result};
use crate::model::{ContentRecord, ContentType};
use crate::platform::{
    AudioEngine, AudioHandle, AudioSource, EventSink, MediaEvent, SpeechStatus, SpeechSynthesizer,
    ViewBridge, ViewIntent,
};
use crate::tts;

const READING_TICK: Duration = Duration::from_secs(1);

pub struct ArticleBackend {
    body: String,
    duration: f64,
    view: Arc<dyn ViewBridge>,
    audio: Arc<dyn AudioEngine>,
    speech: Arc<dyn SpeechSynthesizer>,
    events: EventSink,
    options: ArticleOptions,
    volume: f32,
    playback_rate: f32,
    reading_timer: Option<JoinHandle<()>>,
    speech_handle: Option<Box<dyn AudioHandle>>,
}

impl ArticleBackend {
    pub async fn initialize(record: &ContentRecord, ctx: BackendContext) -> Result<Self> {
        let body = record.body().to_string();
        let duration = tts::estimate_reading_seconds(&body, ctx.article.chars_per_minute);

        let mut backend = Self {
            body,
            duration,
            view: ctx.view,
            audio: ctx.audio,
            speech: ctx.speech,
            events: ctx.events,
            options: ctx.article,
            volume: ctx.volume,
            playback_rate: ctx.playback_rate,
            reading_timer: None,
            speech_handle: None,
        };

        if ctx.tts_enabled {
            backend.enable_speech().await;
        }

        tracing::info!(
            content_id = %record.id,
            duration,
            speech = backend.speech_handle.is_some(),
            "Article ready"
        );
        Ok(backend)
    }

    /// Synthesize the body and bind an audio handle to it. Failures leave the reading timer in charge.
    async fn enable_speech(&mut self) -> bool {
        if self.speech_handle.is_some() {
            return true;
        }
        let request = SpeechRequest {
            body: self.body.clone(),
            audio: self.audio.clone(),
            speech: self.speech.clone(),
            events: self.events.clone(),
            options: self.options.clone(),
            volume: self.volume,
            playback_rate: self.playback_rate,
        };
        match request.open().await {
            Ok(handle) => {
                self.speech_handle = Some(handle);
                true
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "Text-to-speech unavailable, using reading timer");
                false
            }
        }
    }

    fn start_reading_timer(&mut self) {
        self.stop_reading_timer();
        let events = self.events.clone();
        self.reading_timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(READING_TICK);
            interval.tick().await;
            loop {
                interval.tick().await;
                events.emit(MediaEvent::ReadingTick);
            }
        }));
    }

    fn stop_reading_timer(&mut self) {
        if let Some(timer) = self.reading_timer.take() {
            timer.abort();
        }
    }

    pub fn speech_active(&self) -> bool {
        self.speech_handle.is_some()
    }
}

/// Owned inputs for one synthesis round
struct SpeechRequest {
    body: String,
    audio: Arc<dyn AudioEngine>,
    speech: Arc<dyn SpeechSynthesizer>,
    events: EventSink,
    options: ArticleOptions,
    volume: f32,
    playback_rate: f32,
}

impl SpeechRequest {
    async fn open(self) -> anyhow::Result<Box<dyn AudioHandle>> {
        let text = tts::clean_text(&self.body);
        if text.is_empty() {
            bail!("article has no readable text");
        }
        let chunks = tts::split_into_chunks(&text, self.options.chunk_size);

        let mut options = self.options.speech.clone();
        options.speed = self.playback_rate;

        tracing::debug!(chunks = chunks.len(), voice = %options.voice, "Submitting text for synthesis");
        let task_id = self.speech.submit(chunks, &options).await?;

        let deadline = tokio::time::Instant::now() + self.options.speech_timeout;
        let segments = loop {
            match self.speech.status(&task_id).await? {
                SpeechStatus::Completed(segments) => break segments,
                SpeechStatus::Failed(reason) => bail!("synthesis task {} failed: {}", task_id, reason),
                SpeechStatus::Pending => {
                    if tokio::time::Instant::now() >= deadline {
                        bail!("synthesis task {} timed out", task_id);
                    }
                    tokio::time::sleep(self.options.speech_poll_interval).await;
                }
            }
        };
        if segments.is_empty() {
            bail!("synthesis task {} produced no audio", task_id);
        }

        let source = AudioSource {
            segments,
            volume: self.volume,
            playback_rate: self.playback_rate,
        };
        self.audio
            .open(source, self.events)
            .await
            .context("opening synthesized speech")
    }
}

fn playback_failed(e: anyhow::Error) -> PlayerError {
    PlayerError::PlaybackFailed(format!("{:#}", e))
}

#[async_trait]
impl PlaybackBackend for ArticleBackend {
    fn content_type(&self) -> ContentType {
        ContentType::Article
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    async fn play(&mut self) -> Result<Ack> {
        match self.speech_handle.as_mut() {
            Some(handle) => {
                handle.play().await.map_err(playback_failed)?;
                Ok(Ack::Deferred)
            }
            None => {
                self.start_reading_timer();
                Ok(Ack::Immediate)
            }
        }
    }

    async fn pause(&mut self) -> Result<Ack> {
        self.stop_reading_timer();
        match self.speech_handle.as_mut() {
            Some(handle) => {
                handle.pause().await.map_err(playback_failed)?;
                Ok(Ack::Deferred)
            }
            None => Ok(Ack::Immediate),
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop_reading_timer();
        if let Some(handle) = self.speech_handle.as_mut() {
            handle.stop().await.map_err(playback_failed)?;
        }
        Ok(())
    }

    async fn seek(&mut self, position: f64, duration: f64) -> Result<SeekOutcome> {
        let target = clamp_position(position, duration);
        if let Some(handle) = self.speech_handle.as_mut() {
            handle.seek(target).await.map_err(playback_failed)?;
        }
        self.view.emit(ViewIntent::ArticleScroll(target));
        Ok(SeekOutcome {
            position: target,
            scroll_offset: Some(target),
        })
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(handle) = self.speech_handle.as_mut() {
            handle.set_volume(volume);
        }
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.playback_rate = rate;
        if let Some(handle) = self.speech_handle.as_mut() {
            handle.set_playback_rate(rate);
        }
    }

    async fn set_speech(&mut self, enabled: bool, playing: bool) -> Result<bool> {
        if enabled {
            if !self.enable_speech().await {
                return Err(PlayerError::PlaybackFailed(
                    "text-to-speech could not be started".to_string(),
                ));
            }
            if playing {
                self.stop_reading_timer();
                if let Some(handle) = self.speech_handle.as_mut() {
                    handle.play().await.map_err(playback_failed)?;
                }
            }
        } else {
            if let Some(mut handle) = self.speech_handle.take() {
                handle.release().await;
            }
            if playing {
                self.start_reading_timer();
            }
        }
        Ok(true)
    }

    async fn teardown(&mut self) {
        self.stop_reading_timer();
        if let Some(mut handle) = self.speech_handle.take() {
            handle.release().await;
        }
        tracing::debug!("Article backend torn down");
    }
}

impl Drop for ArticleBackend {
    fn drop(&mut self) {
        self.stop_reading_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApiClient, DEFAULT_BASE_URL};
    use crate::platform::headless::{HeadlessAudioEngine, HeadlessViewBridge, RemoteSpeechSynthesizer};
    use tokio::sync::mpsc;

    fn context(events: EventSink) -> BackendContext {
        let client = ApiClient::new(DEFAULT_BASE_URL, None, Duration::from_secs(1)).unwrap();
        BackendContext {
            audio: Arc::new(HeadlessAudioEngine::new()),
            view: Arc::new(HeadlessViewBridge::new()),
            speech: Arc::new(RemoteSpeechSynthesizer::new(client)),
            events,
            volume: 1.0,
            playback_rate: 1.0,
            tts_enabled: false,
            article: ArticleOptions::default(),
        }
    }

    fn record(chars: usize) -> ContentRecord {
        let mut record = ContentRecord::new("a", "Article");
        record.article_content = Some("x".repeat(chars));
        record
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_reading_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend = ArticleBackend::initialize(&record(500), context(EventSink::new(1, tx)))
            .await
            .unwrap();
        assert_eq!(backend.duration(), 120.0);

        assert_eq!(backend.play().await.unwrap(), Ack::Immediate);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(backend.pause().await.unwrap(), Ack::Immediate);
        assert!(backend.reading_timer.is_none());

        let ticks = std::iter::from_fn(|| rx.try_recv().ok()).count();
        assert_eq!(ticks, 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_seek_reinterprets_as_scroll() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut backend = ArticleBackend::initialize(&record(250), context(EventSink::new(1, tx)))
            .await
            .unwrap();

        let duration = backend.duration();
        let outcome = backend.seek(90.0, duration).await.unwrap();
        assert_eq!(outcome.position, 60.0);
        assert_eq!(outcome.scroll_offset, Some(60.0));
        assert!(!backend.speech_active());
    }
}
