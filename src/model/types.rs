//! Core type definitions for the player

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the playback session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
    Error,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }

    pub fn is_paused(self) -> bool {
        self == PlaybackState::Paused
    }
}

/// Repeat mode state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None,
    One,
    All,
}

impl RepeatMode {
    /// Order used by the repeat toggle: none → all → one → none
    pub fn next(self) -> Self {
        match self {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::None,
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RepeatMode::None => "none",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        })
    }
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(RepeatMode::None),
            "one" | "track" => Ok(RepeatMode::One),
            "all" | "queue" => Ok(RepeatMode::All),
            other => Err(format!("unknown repeat mode '{}'", other)),
        }
    }
}

/// Aggregate counters for the session; reset when the session is destroyed
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PlayStats {
    /// Seconds of actual playback accrued across all content
    pub total_play_time: f64,
    /// Progress through the current content, in percent
    pub completion_rate: f64,
    /// Times the user skipped away from content before it ended
    pub skip_count: u32,
}
