//! Fake capabilities that record everything into one ordered log

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;

use meenews_player::controller::{PlayRecord, TelemetrySink};
use meenews_player::model::{ContentRecord, HistoryEntry, HistoryStore, PlaybackSettings, PlayerSnapshot};
use meenews_player::platform::{
    AudioEngine, AudioHandle, AudioSegment, AudioSource, EventSink, MediaEvent, Notifier,
    SpeechStatus, SpeechSynthesizer, ViewBridge, ViewIntent,
};
use meenews_player::tts::SpeechOptions;
use meenews_player::{Capabilities, PlayerController, PlayerOptions};

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }
}

pub struct FakeAudioEngine {
    log: EventLog,
    pub duration: Mutex<Option<f64>>,
    pub fail_open: AtomicBool,
    sinks: Mutex<Vec<EventSink>>,
}

impl FakeAudioEngine {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            duration: Mutex::new(Some(100.0)),
            fail_open: AtomicBool::new(false),
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Event sink handed to the most recently opened handle
    pub fn last_sink(&self) -> EventSink {
        self.sinks.lock().unwrap().last().cloned().expect("no audio handle opened")
    }
}

#[async_trait]
impl AudioEngine for FakeAudioEngine {
    async fn open(&self, source: AudioSource, events: EventSink) -> Result<Box<dyn AudioHandle>> {
        let urls: Vec<&str> = source.segments.iter().map(|s| s.url.as_str()).collect();
        self.log.push(format!("audio-open:{}", urls.join(",")));
        if self.fail_open.load(Ordering::SeqCst) {
            bail!("device unavailable");
        }
        self.sinks.lock().unwrap().push(events.clone());
        events.emit(MediaEvent::CanPlay);

        let duration = source.total_duration_hint().or(*self.duration.lock().unwrap());
        Ok(Box::new(FakeAudioHandle {
            log: self.log.clone(),
            events,
            duration,
        }))
    }
}

struct FakeAudioHandle {
    log: EventLog,
    events: EventSink,
    duration: Option<f64>,
}

#[async_trait]
impl AudioHandle for FakeAudioHandle {
    async fn play(&mut self) -> Result<()> {
        self.log.push("audio-play");
        self.events.emit(MediaEvent::Playing);
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.log.push("audio-pause");
        self.events.emit(MediaEvent::Paused);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.log.push("audio-stop");
        self.events.emit(MediaEvent::Stopped);
        Ok(())
    }

    async fn seek(&mut self, position: f64) -> Result<()> {
        self.log.push(format!("audio-seek:{}", position));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.push(format!("audio-volume:{}", volume));
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.log.push(format!("audio-rate:{}", rate));
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    async fn release(&mut self) {
        self.log.push("audio-release");
    }
}

pub struct FakeView {
    log: EventLog,
    sinks: Mutex<Vec<EventSink>>,
}

impl FakeView {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            sinks: Mutex::new(Vec::new()),
        }
    }

    pub fn last_sink(&self) -> EventSink {
        self.sinks.lock().unwrap().last().cloned().expect("no video initialized")
    }
}

impl ViewBridge for FakeView {
    fn emit(&self, intent: ViewIntent) {
        match intent {
            ViewIntent::VideoInitialize { events, .. } => {
                self.sinks.lock().unwrap().push(events);
                self.log.push("video-initialize");
            }
            ViewIntent::VideoSeek(position) => self.log.push(format!("video-seek:{}", position)),
            ViewIntent::ArticleScroll(offset) => self.log.push(format!("article-scroll:{}", offset)),
            other => self.log.push(other.name()),
        }
    }
}

/// Completes every job on the first poll, or fails it
pub struct FakeSpeech {
    log: EventLog,
    pub fail: AtomicBool,
    jobs: AtomicUsize,
}

impl FakeSpeech {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail: AtomicBool::new(false),
            jobs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn submit(&self, chunks: Vec<String>, _options: &SpeechOptions) -> Result<String> {
        let job = self.jobs.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.push(format!("speech-submit:{}", chunks.len()));
        Ok(format!("job-{}", job))
    }

    async fn status(&self, task_id: &str) -> Result<SpeechStatus> {
        if self.fail.load(Ordering::SeqCst) {
            return Ok(SpeechStatus::Failed("voice unavailable".to_string()));
        }
        Ok(SpeechStatus::Completed(vec![
            AudioSegment {
                url: format!("{}-a.mp3", task_id),
                duration_hint: Some(20.0),
            },
            AudioSegment {
                url: format!("{}-b.mp3", task_id),
                duration_hint: Some(15.0),
            },
        ]))
    }
}

#[derive(Default)]
pub struct FakeTelemetry {
    pub records: Mutex<Vec<PlayRecord>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl TelemetrySink for FakeTelemetry {
    async fn record_play(&self, record: &PlayRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail.load(Ordering::SeqCst) {
            bail!("collector offline");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl Notifier for FakeNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    pub saved: Mutex<Vec<HistoryEntry>>,
    pub saves: AtomicUsize,
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        *self.saved.lock().unwrap() = entries.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub controller: PlayerController,
    pub log: EventLog,
    pub audio: Arc<FakeAudioEngine>,
    pub view: Arc<FakeView>,
    pub speech: Arc<FakeSpeech>,
    pub telemetry: Arc<FakeTelemetry>,
    pub notifier: Arc<FakeNotifier>,
    pub history: Arc<MemoryHistoryStore>,
}

impl Harness {
    pub fn new(settings: PlaybackSettings) -> Self {
        let log = EventLog::default();
        let audio = Arc::new(FakeAudioEngine::new(log.clone()));
        let view = Arc::new(FakeView::new(log.clone()));
        let speech = Arc::new(FakeSpeech::new(log.clone()));
        let telemetry = Arc::new(FakeTelemetry::default());
        let notifier = Arc::new(FakeNotifier::default());
        let history = Arc::new(MemoryHistoryStore::default());

        let caps = Capabilities {
            audio: audio.clone(),
            view: view.clone(),
            speech: speech.clone(),
            history: history.clone(),
            telemetry: telemetry.clone(),
            notifier: notifier.clone(),
        };
        let options = PlayerOptions {
            settings,
            shuffle_seed: Some(7),
            ..Default::default()
        };

        Self {
            controller: PlayerController::new(caps, options),
            log,
            audio,
            view,
            speech,
            telemetry,
            notifier,
            history,
        }
    }

    /// Poll the snapshot until `pred` holds, letting the event listener run in between.
    pub async fn wait_for(&self, what: &str, pred: impl Fn(&PlayerSnapshot) -> bool) -> PlayerSnapshot {
        for _ in 0..500 {
            let snapshot = self.controller.snapshot().await;
            if pred(&snapshot) {
                return snapshot;
            }
            tokio::task::yield_now().await;
        }
        panic!("timed out waiting for {}", what);
    }

    /// Give spawned tasks and the listener a chance to drain.
    pub async fn settle(&self) {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    pub async fn wait_for_log(&self, entry: &str, count: usize) {
        for _ in 0..500 {
            if self.log.count(entry) >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} x {:?} in {:?}", count, entry, self.log.entries());
    }

    pub async fn wait_for_records(&self, count: usize) -> Vec<PlayRecord> {
        for _ in 0..500 {
            let records = self.telemetry.records.lock().unwrap().clone();
            if records.len() >= count {
                return records;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {} play records", count);
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifier.messages.lock().unwrap().clone()
    }
}

pub fn audio(id: &str) -> ContentRecord {
    let mut record = ContentRecord::new(id, format!("Audio {}", id));
    record.audio_url = Some(format!("https://cdn.test/{}.mp3", id));
    record
}

pub fn video(id: &str) -> ContentRecord {
    let mut record = ContentRecord::new(id, format!("Video {}", id));
    record.video_url = Some(format!("https://cdn.test/{}.mp4", id));
    record.duration = Some(300.0);
    record
}

pub fn article(id: &str, chars: usize) -> ContentRecord {
    let mut record = ContentRecord::new(id, format!("Article {}", id));
    record.article_content = Some("字".repeat(chars));
    record
}
