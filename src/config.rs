//! Configuration for the command-line player
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. TOML file (`--config`, else `meenews.toml` in the working directory if present)
//! 3. Environment variables (`MEENEWS_BASE_URL`, `MEENEWS_TOKEN`, `MEENEWS_DATA_DIR`, `MEENEWS_LOG_DIR`)
//! 4. Command-line flags, applied by the binary

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::backend::ArticleOptions;
use crate::controller::{DeviceInfo, PlayerOptions};
use crate::error::ConfigError;
use crate::model::{
    DEFAULT_BASE_URL, DEFAULT_HISTORY_CAPACITY, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE,
    PlaybackSettings, RepeatMode,
};
use crate::tts::{DEFAULT_CHUNK_SIZE, SpeechOptions};

pub const DEFAULT_CONFIG_FILE: &str = "meenews.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub player: PlayerConfig,
    pub tts: TtsConfig,
    /// History file location
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            player: PlayerConfig::default(),
            tts: TtsConfig::default(),
            data_dir: PathBuf::from(".meenews"),
            log_dir: PathBuf::from(".logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub autoplay_next: bool,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub volume: f32,
    pub playback_rate: f32,
    pub tts_enabled: bool,
    pub reading_chars_per_minute: u32,
    pub history_capacity: usize,
    /// Send play records to the backend
    pub telemetry: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let settings = PlaybackSettings::default();
        Self {
            autoplay_next: settings.autoplay_next,
            shuffle: settings.shuffle,
            repeat: settings.repeat,
            volume: settings.volume,
            playback_rate: settings.playback_rate,
            tts_enabled: settings.tts_enabled,
            reading_chars_per_minute: crate::backend::DEFAULT_READING_CHARS_PER_MINUTE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            telemetry: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    #[serde(flatten)]
    pub speech: SpeechOptions,
    pub chunk_size: usize,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            speech: SpeechOptions::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval_ms: 1000,
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Defaults, then `path` (or the default file if present), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply environment overrides through `lookup`. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = get("MEENEWS_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Some(token) = get("MEENEWS_TOKEN") {
            self.api.token = Some(token);
        }
        if let Some(dir) = get("MEENEWS_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("MEENEWS_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        let player = &self.player;

        if !(0.0..=1.0).contains(&player.volume) {
            problems.push(format!("player.volume must be between 0 and 1, got {}", player.volume));
        }
        if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&player.playback_rate) {
            problems.push(format!(
                "player.playback_rate must be between {} and {}, got {}",
                MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE, player.playback_rate
            ));
        }
        if player.reading_chars_per_minute == 0 {
            problems.push("player.reading_chars_per_minute must be positive".to_string());
        }
        if player.history_capacity == 0 {
            problems.push("player.history_capacity must be positive".to_string());
        }
        if self.tts.chunk_size == 0 {
            problems.push("tts.chunk_size must be positive".to_string());
        }
        if let Err(errors) = self.tts.speech.validate() {
            problems.extend(errors.into_iter().map(|e| format!("tts.{}", e)));
        }
        if self.api.base_url.trim().is_empty() {
            problems.push("api.base_url must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs.max(1))
    }

    pub fn player_options(&self) -> PlayerOptions {
        let player = &self.player;
        PlayerOptions {
            settings: PlaybackSettings {
                shuffle: player.shuffle,
                repeat: player.repeat,
                autoplay_next: player.autoplay_next,
                volume: player.volume,
                playback_rate: player.playback_rate,
                tts_enabled: player.tts_enabled,
            },
            article: ArticleOptions {
                chars_per_minute: player.reading_chars_per_minute,
                chunk_size: self.tts.chunk_size,
                speech: self.tts.speech.clone(),
                speech_poll_interval: Duration::from_millis(self.tts.poll_interval_ms.max(1)),
                speech_timeout: Duration::from_secs(self.tts.timeout_secs),
            },
            history_capacity: player.history_capacity,
            device: DeviceInfo::detect(),
            shuffle_seed: None,
        }
    }
}
