//! Model module - Player state and data types
//!
//! - `types`: Core enums (playback state, repeat mode) and statistics
//! - `content`: Content records and content-type resolution
//! - `playback`: The playback session, queue selection and snapshots
//! - `history`: Bounded play history and its persistence
//! - `api_client`: REST backend client

mod types;
mod content;
mod playback;
mod history;
mod api_client;

pub use types::{PlayStats, PlaybackState, RepeatMode};

pub use content::{ContentId, ContentRecord, ContentType};

pub use playback::{
    format_time, PlaybackSession, PlaybackSettings, PlayerSnapshot, MAX_PLAYBACK_RATE,
    MIN_PLAYBACK_RATE,
};

pub use history::{
    History, HistoryEntry, HistoryStore, JsonFileHistoryStore, NullHistoryStore,
    DEFAULT_HISTORY_CAPACITY, HISTORY_STORAGE_KEY,
};

pub use api_client::{ApiClient, Category, FeedQuery, SpeechTask, DEFAULT_BASE_URL};
