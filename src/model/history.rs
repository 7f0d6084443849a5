//! Play history: bounded, most-recent-first, persisted as JSON

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentRecord, ContentType};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
pub const HISTORY_STORAGE_KEY: &str = "play_history";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub content: ContentRecord,
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
    #[serde(rename = "playedAt")]
    pub played_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(content: ContentRecord, content_type: ContentType) -> Self {
        Self {
            content,
            content_type,
            played_at: Utc::now(),
        }
    }

    fn same_item(&self, other: &HistoryEntry) -> bool {
        self.content.id == other.content.id && self.content_type == other.content_type
    }
}

#[derive(Clone, Debug)]
pub struct History {
    entries: Vec<HistoryEntry>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Restore persisted entries, enforcing ordering invariants on untrusted input.
    pub fn from_entries(entries: Vec<HistoryEntry>, capacity: usize) -> Self {
        let mut history = Self::new(capacity);
        for entry in entries.into_iter().rev() {
            history.push(entry);
        }
        history
    }

    /// Move `entry` to the front, replacing any older entry for the same content and type.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.retain(|existing| !existing.same_item(&entry));
        self.entries.insert(0, entry);
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Local key-value persistence of the history list
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self) -> Result<Vec<HistoryEntry>>;
    async fn save(&self, entries: &[HistoryEntry]) -> Result<()>;
}

/// Stores the history under `<data_dir>/play_history.json`
#[derive(Clone, Debug)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("{}.json", HISTORY_STORAGE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn load(&self) -> Result<Vec<HistoryEntry>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let entries: Vec<HistoryEntry> = serde_json::from_str(&content)?;
        Ok(entries)
    }

    async fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let content = serde_json::to_string(entries)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

/// Store that keeps nothing, for sessions without a data directory
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHistoryStore;

#[async_trait]
impl HistoryStore for NullHistoryStore {
    async fn load(&self) -> Result<Vec<HistoryEntry>> {
        Ok(Vec::new())
    }

    async fn save(&self, _entries: &[HistoryEntry]) -> Result<()> {
        Ok(())
    }
}
