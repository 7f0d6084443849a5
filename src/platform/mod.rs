//! Platform capabilities the player drives but does not own
//!
//! The audio engine, the video/article view layer, the speech synthesizer and
//! the user-notification surface are injected behind these traits so the
//! controller can run against real devices, the headless implementations in
//! [`headless`], or fakes in tests.
//!
//! Every callback into the player goes through an [`EventSink`] stamped with
//! the generation of the backend that created it. The controller drops events
//! whose generation is no longer current, so a slow callback from a torn-down
//! backend can never mutate the session.

pub mod headless;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::tts::SpeechOptions;

/// Something that happened inside a media backend
#[derive(Clone, Debug, PartialEq)]
pub enum MediaEvent {
    Playing,
    Paused,
    Stopped,
    TimeUpdate { position: f64, duration: f64 },
    Ended,
    Error(String),
    Waiting,
    CanPlay,
    /// One second of article reading time elapsed
    ReadingTick,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackendEvent {
    pub generation: u64,
    pub event: MediaEvent,
}

/// Generation-stamped channel back into the player
#[derive(Clone, Debug)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<BackendEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<BackendEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event; silently dropped once the player is gone.
    pub fn emit(&self, event: MediaEvent) {
        let _ = self.tx.send(BackendEvent {
            generation: self.generation,
            event,
        });
    }
}

/// One playable piece of audio
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSegment {
    pub url: String,
    pub duration_hint: Option<f64>,
}

/// What to open on the audio engine. Segments play back to back as one stream.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSource {
    pub segments: Vec<AudioSegment>,
    pub volume: f32,
    pub playback_rate: f32,
}

impl AudioSource {
    pub fn single(url: impl Into<String>, duration_hint: Option<f64>) -> Self {
        Self {
            segments: vec![AudioSegment {
                url: url.into(),
                duration_hint,
            }],
            volume: 1.0,
            playback_rate: 1.0,
        }
    }

    /// Sum of the segment hints, if every segment has one
    pub fn total_duration_hint(&self) -> Option<f64> {
        self.segments
            .iter()
            .map(|s| s.duration_hint)
            .sum::<Option<f64>>()
    }
}

/// Native audio engine
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Open a handle on `source`. Resolves once the engine reports it can play.
    async fn open(&self, source: AudioSource, events: EventSink) -> Result<Box<dyn AudioHandle>>;
}

/// A live audio engine handle. Playback state changes are acknowledged via events.
#[async_trait]
pub trait AudioHandle: Send {
    async fn play(&mut self) -> Result<()>;
    async fn pause(&mut self) -> Result<()>;
    async fn stop(&mut self) -> Result<()>;
    async fn seek(&mut self, position: f64) -> Result<()>;
    fn set_volume(&mut self, volume: f32);
    fn set_playback_rate(&mut self, rate: f32);
    /// Duration reported by the engine, once known
    fn duration(&self) -> Option<f64>;
    /// Release native resources; the handle is unusable afterwards.
    async fn release(&mut self);
}

/// Intents for the out-of-core rendering layer
#[derive(Clone, Debug)]
pub enum ViewIntent {
    VideoInitialize {
        src: String,
        poster: Option<String>,
        duration_hint: Option<f64>,
        /// The video component reports progress, completion and errors here.
        events: EventSink,
    },
    VideoPlay,
    VideoPause,
    VideoStop,
    VideoSeek(f64),
    VideoDestroy,
    ArticleScroll(f64),
}

impl ViewIntent {
    pub fn name(&self) -> &'static str {
        match self {
            ViewIntent::VideoInitialize { .. } => "video-initialize",
            ViewIntent::VideoPlay => "video-play",
            ViewIntent::VideoPause => "video-pause",
            ViewIntent::VideoStop => "video-stop",
            ViewIntent::VideoSeek(_) => "video-seek",
            ViewIntent::VideoDestroy => "video-destroy",
            ViewIntent::ArticleScroll(_) => "article-scroll",
        }
    }
}

pub trait ViewBridge: Send + Sync {
    fn emit(&self, intent: ViewIntent);
}

#[derive(Clone, Debug, PartialEq)]
pub enum SpeechStatus {
    Pending,
    Completed(Vec<AudioSegment>),
    Failed(String),
}

/// Text-to-speech service: submit text chunks, then poll for the synthesized audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn submit(&self, chunks: Vec<String>, options: &SpeechOptions) -> Result<String>;
    async fn status(&self, task_id: &str) -> Result<SpeechStatus>;
}

/// Transient user-visible notification (toast)
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}
