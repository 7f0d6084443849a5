//! Playback session state: what is loaded, the queue, timing and statistics

use rand::Rng;
use serde::Serialize;

use super::content::{ContentId, ContentRecord, ContentType};
use super::types::{PlayStats, PlaybackState, RepeatMode};
use crate::error::{PlayerError, Result};

/// Engine progress jumps larger than this are seeks, not playback
const MAX_PROGRESS_DELTA_SECS: f64 = 5.0;

pub const MIN_PLAYBACK_RATE: f32 = 0.5;
pub const MAX_PLAYBACK_RATE: f32 = 2.0;

/// User preferences that survive a session reset
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlaybackSettings {
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub autoplay_next: bool,
    pub volume: f32,
    pub playback_rate: f32,
    pub tts_enabled: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            shuffle: false,
            repeat: RepeatMode::None,
            autoplay_next: true,
            volume: 1.0,
            playback_rate: 1.0,
            tts_enabled: false,
        }
    }
}

/// The live, mutable state describing what is loaded and playing
#[derive(Clone, Debug, Default)]
pub struct PlaybackSession {
    pub(crate) current_content: Option<ContentRecord>,
    pub(crate) content_type: Option<ContentType>,
    pub(crate) queue: Vec<ContentRecord>,
    pub(crate) current_index: usize,
    pub(crate) state: PlaybackState,
    pub(crate) buffering: bool,
    pub(crate) current_time: f64,
    pub(crate) duration: f64,
    pub(crate) settings: PlaybackSettings,
    pub(crate) article_scroll_position: f64,
    pub(crate) error: Option<String>,
    pub(crate) stats: PlayStats,
    /// Play time accrued since the content was loaded or last completed
    pub(crate) content_play_time: f64,
    /// Identifies the live backend; events from older backends are discarded
    pub(crate) generation: u64,
}

impl PlaybackSession {
    pub fn new(settings: PlaybackSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_content(&self) -> Option<&ContentRecord> {
        self.current_content.as_ref()
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    pub fn queue(&self) -> &[ContentRecord] {
        &self.queue
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn stats(&self) -> PlayStats {
        self.stats
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `record` of `content_type` is what the live backend already has loaded
    pub fn is_loaded(&self, record: &ContentRecord, content_type: ContentType) -> bool {
        self.current_content.as_ref().map(|c| &c.id) == Some(&record.id)
            && self.content_type == Some(content_type)
    }

    /// Rejects an explicit queue whose index falls outside it.
    pub fn validate_queue(queue: Option<&[ContentRecord]>, index: usize) -> Result<()> {
        match queue {
            Some(queue) if !queue.is_empty() && index >= queue.len() => {
                Err(PlayerError::InvalidQueueIndex { index, len: queue.len() })
            }
            _ => Ok(()),
        }
    }

    /// Install the queue for `content`; without an explicit queue the content plays alone.
    pub fn set_queue(&mut self, content: &ContentRecord, queue: Option<Vec<ContentRecord>>, index: usize) {
        match queue {
            Some(queue) if !queue.is_empty() => {
                self.current_index = index.min(queue.len() - 1);
                self.queue = queue;
            }
            _ => {
                self.queue = vec![content.clone()];
                self.current_index = 0;
            }
        }
    }

    /// Record newly loaded content and reset per-content timing.
    pub fn load(&mut self, content: ContentRecord, content_type: ContentType, duration: f64) {
        self.current_content = Some(content);
        self.content_type = Some(content_type);
        self.current_time = 0.0;
        self.duration = duration.max(0.0);
        self.article_scroll_position = 0.0;
        self.stats.completion_rate = 0.0;
        self.content_play_time = 0.0;
        self.buffering = false;
    }

    /// Drop the loaded content after its backend is gone.
    pub fn unload(&mut self) {
        self.current_content = None;
        self.content_type = None;
        self.current_time = 0.0;
        self.duration = 0.0;
        self.buffering = false;
    }

    pub fn next_index<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let len = self.queue.len();
        if len == 0 {
            return None;
        }

        if self.settings.shuffle {
            if len < 2 {
                return None;
            }
            // Uniform over every index except the current one.
            let pick = rng.gen_range(0..len - 1);
            return Some(if pick >= self.current_index { pick + 1 } else { pick });
        }

        if self.current_index + 1 < len {
            Some(self.current_index + 1)
        } else if self.settings.repeat == RepeatMode::All {
            Some(0)
        } else {
            None
        }
    }

    pub fn previous_index(&self) -> Option<usize> {
        if self.queue.is_empty() {
            return None;
        }

        if self.current_index > 0 {
            Some(self.current_index - 1)
        } else if self.settings.repeat == RepeatMode::All {
            Some(self.queue.len() - 1)
        } else {
            None
        }
    }

    pub fn can_play_next(&self) -> bool {
        let len = self.queue.len();
        len > 0
            && (self.current_index + 1 < len
                || self.settings.repeat == RepeatMode::All
                || (self.settings.shuffle && len > 1))
    }

    pub fn can_play_previous(&self) -> bool {
        !self.queue.is_empty() && (self.current_index > 0 || self.settings.repeat == RepeatMode::All)
    }

    pub fn progress_percent(&self) -> f64 {
        if self.duration <= 0.0 {
            0.0
        } else {
            (self.current_time / self.duration * 100.0).min(100.0)
        }
    }

    /// Apply an engine progress report.
    pub fn update_progress(&mut self, position: f64, duration: f64) {
        let position = position.max(0.0);
        if self.state.is_playing() {
            let delta = position - self.current_time;
            if delta > 0.0 && delta <= MAX_PROGRESS_DELTA_SECS {
                self.accrue(delta);
            }
        }

        self.current_time = position;
        if duration > 0.0 {
            self.duration = duration;
        }
        self.update_completion();
    }

    /// Accrue article reading time; only counts while playing and stops at the duration.
    pub fn advance_reading(&mut self, seconds: f64) {
        if !self.state.is_playing() {
            return;
        }
        let target = (self.current_time + seconds).min(self.duration);
        let delta = target - self.current_time;
        if delta > 0.0 {
            self.current_time = target;
            self.accrue(delta);
        }
        self.update_completion();
    }

    fn accrue(&mut self, seconds: f64) {
        self.stats.total_play_time += seconds;
        self.content_play_time += seconds;
    }

    /// Play time of the current play-through; the counter restarts from zero.
    pub fn take_content_play_time(&mut self) -> f64 {
        std::mem::take(&mut self.content_play_time)
    }

    /// Jump to `position` without counting it as playback.
    pub fn apply_seek(&mut self, position: f64, scroll_offset: Option<f64>) {
        self.current_time = position.max(0.0);
        if let Some(offset) = scroll_offset {
            self.article_scroll_position = offset;
        }
        self.update_completion();
    }

    /// Whether accrued time has reached a known duration
    pub fn reached_end(&self) -> bool {
        self.duration > 0.0 && self.current_time >= self.duration
    }

    fn update_completion(&mut self) {
        if self.duration > 0.0 {
            self.stats.completion_rate = self.progress_percent();
        }
    }

    /// Fresh session keeping the user's preferences.
    pub fn reset(&mut self) {
        let settings = self.settings.clone();
        let generation = self.generation;
        *self = Self::new(settings);
        self.generation = generation;
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let content = self.current_content.as_ref();
        PlayerSnapshot {
            content_id: content.map(|c| c.id.clone()),
            title: content.map(|c| c.title.clone()).unwrap_or_default(),
            description: content
                .map(|c| c.display_description().to_string())
                .unwrap_or_default(),
            content_type: self.content_type,
            state: self.state,
            is_playing: self.state.is_playing(),
            is_paused: self.state.is_paused(),
            is_loading: self.state == PlaybackState::Loading || self.buffering,
            current_time: self.current_time,
            duration: self.duration,
            progress_percent: self.progress_percent(),
            formatted_current_time: format_time(self.current_time),
            formatted_duration: format_time(self.duration),
            queue_len: self.queue.len(),
            current_index: self.current_index,
            can_play_next: self.can_play_next(),
            can_play_previous: self.can_play_previous(),
            article_scroll_position: self.article_scroll_position,
            settings: self.settings.clone(),
            error: self.error.clone(),
            stats: self.stats,
        }
    }
}

/// Complete playback information for rendering
#[derive(Clone, Debug, Serialize)]
pub struct PlayerSnapshot {
    pub content_id: Option<ContentId>,
    pub title: String,
    pub description: String,
    pub content_type: Option<ContentType>,
    pub state: PlaybackState,
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_loading: bool,
    pub current_time: f64,
    pub duration: f64,
    pub progress_percent: f64,
    pub formatted_current_time: String,
    pub formatted_duration: String,
    pub queue_len: usize,
    pub current_index: usize,
    pub can_play_next: bool,
    pub can_play_previous: bool,
    pub article_scroll_position: f64,
    pub settings: PlaybackSettings,
    pub error: Option<String>,
    pub stats: PlayStats,
}

/// `m:ss`, minutes unbounded
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
