//! Headless capability implementations for the command-line player
//!
//! Nothing is decoded or rendered. Audio and video advance a simulated clock
//! in real time and report progress like a native engine would, which is
//! enough to drive queues, repeat and autoplay end to end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::{
    AudioEngine, AudioHandle, AudioSegment, AudioSource, EventSink, MediaEvent, Notifier,
    SpeechStatus, SpeechSynthesizer, ViewBridge, ViewIntent,
};
use crate::model::ApiClient;
use crate::tts::{self, SpeechOptions};

const DEFAULT_TICK: Duration = Duration::from_secs(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct TrackClock {
    position: f64,
    rate: f64,
    playing: bool,
}

/// A media timeline that moves forward while playing and reports like an engine
struct SimulatedTrack {
    clock: Arc<Mutex<TrackClock>>,
    events: EventSink,
    duration: f64,
    tick: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl SimulatedTrack {
    fn new(duration: f64, rate: f32, tick: Duration, events: EventSink) -> Self {
        Self {
            clock: Arc::new(Mutex::new(TrackClock {
                position: 0.0,
                rate: f64::from(rate),
                playing: false,
            })),
            events,
            duration,
            tick,
            ticker: None,
        }
    }

    fn play(&mut self) {
        {
            let mut clock = lock(&self.clock);
            if clock.position >= self.duration {
                clock.position = 0.0;
            }
            clock.playing = true;
        }
        self.events.emit(MediaEvent::Playing);

        if self.ticker.as_ref().is_none_or(|t| t.is_finished()) {
            self.ticker = Some(self.spawn_ticker());
        }
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let clock = self.clock.clone();
        let events = self.events.clone();
        let duration = self.duration;
        let tick = self.tick;

        tokio::spawn(async move {
            let step = tick.as_secs_f64();
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            loop {
                interval.tick().await;
                let (position, ended) = {
                    let mut clock = lock(&clock);
                    if !clock.playing {
                        continue;
                    }
                    clock.position = (clock.position + step * clock.rate).min(duration);
                    let ended = clock.position >= duration;
                    if ended {
                        clock.playing = false;
                    }
                    (clock.position, ended)
                };

                events.emit(MediaEvent::TimeUpdate { position, duration });
                if ended {
                    events.emit(MediaEvent::Ended);
                    break;
                }
            }
        })
    }

    fn pause(&mut self) {
        lock(&self.clock).playing = false;
        self.events.emit(MediaEvent::Paused);
    }

    fn stop(&mut self) {
        {
            let mut clock = lock(&self.clock);
            clock.playing = false;
            clock.position = 0.0;
        }
        self.abort_ticker();
        self.events.emit(MediaEvent::Stopped);
    }

    fn seek(&mut self, position: f64) {
        let position = position.clamp(0.0, self.duration);
        lock(&self.clock).position = position;
        self.events.emit(MediaEvent::TimeUpdate {
            position,
            duration: self.duration,
        });
    }

    fn set_rate(&mut self, rate: f32) {
        lock(&self.clock).rate = f64::from(rate);
    }

    fn abort_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for SimulatedTrack {
    fn drop(&mut self) {
        self.abort_ticker();
    }
}

/// Audio engine that plays nothing but keeps time
pub struct HeadlessAudioEngine {
    tick: Duration,
}

impl HeadlessAudioEngine {
    pub fn new() -> Self {
        Self { tick: DEFAULT_TICK }
    }

    pub fn with_tick(tick: Duration) -> Self {
        Self { tick }
    }
}

impl Default for HeadlessAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioEngine for HeadlessAudioEngine {
    async fn open(&self, source: AudioSource, events: EventSink) -> Result<Box<dyn AudioHandle>> {
        let first = source
            .segments
            .first()
            .map(|s| s.url.clone())
            .ok_or_else(|| anyhow!("audio source has no segments"))?;
        let duration = match source.total_duration_hint() {
            Some(duration) if duration > 0.0 => duration,
            _ => bail!("duration of {} is unknown", first),
        };

        tracing::info!(
            url = %first,
            segments = source.segments.len(),
            duration,
            "Headless audio opened"
        );
        events.emit(MediaEvent::CanPlay);

        Ok(Box::new(HeadlessAudioHandle {
            track: SimulatedTrack::new(duration, source.playback_rate, self.tick, events),
            volume: source.volume,
        }))
    }
}

struct HeadlessAudioHandle {
    track: SimulatedTrack,
    volume: f32,
}

#[async_trait]
impl AudioHandle for HeadlessAudioHandle {
    async fn play(&mut self) -> Result<()> {
        self.track.play();
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.track.pause();
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.track.stop();
        Ok(())
    }

    async fn seek(&mut self, position: f64) -> Result<()> {
        self.track.seek(position);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        tracing::debug!(volume, previous = self.volume, "Headless volume changed");
        self.volume = volume;
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.track.set_rate(rate);
    }

    fn duration(&self) -> Option<f64> {
        Some(self.track.duration)
    }

    async fn release(&mut self) {
        self.track.abort_ticker();
    }
}

/// Logs view intents and stands in for the video component
pub struct HeadlessViewBridge {
    tick: Duration,
    video: Mutex<Option<SimulatedTrack>>,
}

impl HeadlessViewBridge {
    pub fn new() -> Self {
        Self::with_tick(DEFAULT_TICK)
    }

    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick,
            video: Mutex::new(None),
        }
    }
}

impl Default for HeadlessViewBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewBridge for HeadlessViewBridge {
    fn emit(&self, intent: ViewIntent) {
        tracing::debug!(intent = intent.name(), "View intent");
        let mut video = lock(&self.video);

        match intent {
            ViewIntent::VideoInitialize {
                src,
                duration_hint,
                events,
                ..
            } => {
                *video = match duration_hint {
                    Some(duration) if duration > 0.0 => {
                        tracing::info!(%src, duration, "Headless video ready");
                        events.emit(MediaEvent::CanPlay);
                        Some(SimulatedTrack::new(duration, 1.0, self.tick, events))
                    }
                    _ => {
                        tracing::warn!(%src, "Video duration unknown, progress will not be reported");
                        None
                    }
                };
            }
            ViewIntent::VideoPlay => video.iter_mut().for_each(SimulatedTrack::play),
            ViewIntent::VideoPause => video.iter_mut().for_each(SimulatedTrack::pause),
            ViewIntent::VideoStop => video.iter_mut().for_each(SimulatedTrack::stop),
            ViewIntent::VideoSeek(position) => {
                if let Some(track) = video.as_mut() {
                    track.seek(position);
                }
            }
            ViewIntent::VideoDestroy => {
                *video = None;
            }
            ViewIntent::ArticleScroll(offset) => {
                tracing::info!(offset, "Article scrolled");
            }
        }
    }
}

#[derive(Clone, Debug)]
struct SpeechPart {
    text: String,
    remote_id: Option<String>,
    segment: Option<AudioSegment>,
    failed: bool,
}

impl SpeechPart {
    fn pending(&self) -> bool {
        self.segment.is_none() && !self.failed
    }
}

/// Speech synthesis through the backend's `/ai/tts` task endpoints, one task per chunk
pub struct RemoteSpeechSynthesizer {
    client: ApiClient,
    next_job: AtomicU64,
    jobs: Mutex<HashMap<String, (f32, Vec<SpeechPart>)>>,
}

impl RemoteSpeechSynthesizer {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            next_job: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    async fn refresh(&self, speed: f32, part: &mut SpeechPart) {
        let Some(remote_id) = part.remote_id.clone() else {
            return;
        };
        match self.client.speech_task(&remote_id).await {
            Ok(task) if task.is_completed() => match task.audio_url {
                Some(url) => {
                    let hint = task
                        .estimated_duration
                        .unwrap_or_else(|| tts::estimate_speech_seconds(&part.text, speed));
                    part.segment = Some(AudioSegment {
                        url,
                        duration_hint: Some(hint),
                    });
                }
                None => {
                    tracing::warn!(task_id = %remote_id, "Synthesis completed without audio");
                    part.failed = true;
                }
            },
            Ok(task) if task.is_failed() => {
                tracing::warn!(task_id = %remote_id, "Synthesis chunk failed");
                part.failed = true;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(task_id = %remote_id, error = %e, "Synthesis status check failed");
                part.failed = true;
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for RemoteSpeechSynthesizer {
    async fn submit(&self, chunks: Vec<String>, options: &SpeechOptions) -> Result<String> {
        let mut parts = Vec::with_capacity(chunks.len());
        for (index, text) in chunks.into_iter().enumerate() {
            let mut part = SpeechPart {
                text,
                remote_id: None,
                segment: None,
                failed: false,
            };
            match self.client.submit_speech(&part.text, options).await {
                Ok(task) => part.remote_id = Some(task.task_id),
                Err(e) => {
                    tracing::warn!(chunk = index, error = %e, "Synthesis submit failed");
                    part.failed = true;
                }
            }
            parts.push(part);
        }

        let job_id = format!("tts-{}", self.next_job.fetch_add(1, Ordering::Relaxed));
        tracing::info!(job_id = %job_id, chunks = parts.len(), "Synthesis job submitted");
        lock(&self.jobs).insert(job_id.clone(), (options.speed, parts));
        Ok(job_id)
    }

    async fn status(&self, task_id: &str) -> Result<SpeechStatus> {
        let (speed, mut parts) = lock(&self.jobs)
            .get(task_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown synthesis job {}", task_id))?;

        for part in parts.iter_mut().filter(|p| p.pending()) {
            self.refresh(speed, part).await;
        }

        let status = if parts.iter().any(SpeechPart::pending) {
            SpeechStatus::Pending
        } else {
            let segments: Vec<AudioSegment> = parts.iter().filter_map(|p| p.segment.clone()).collect();
            if segments.is_empty() {
                SpeechStatus::Failed("no chunk could be synthesized".to_string())
            } else {
                SpeechStatus::Completed(segments)
            }
        };

        let mut jobs = lock(&self.jobs);
        if matches!(status, SpeechStatus::Pending) {
            jobs.insert(task_id.to_string(), (speed, parts));
        } else {
            jobs.remove(task_id);
        }
        Ok(status)
    }
}

/// Prints notifications to stderr
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(message, "User notification");
        eprintln!("! {}", message);
    }
}
