//! Play reporting and local history
//!
//! Both are side channels of playback: a failure here is logged and
//! swallowed, and never changes what the player does next.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::PlayerController;
use crate::error::PlayerError;
use crate::model::{ApiClient, ContentId, ContentRecord, ContentType, HistoryEntry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayAction {
    Start,
    Complete,
}

/// Where playback happens, sent with start records
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    pub device_type: String,
    pub device_name: Option<String>,
}

impl DeviceInfo {
    pub fn detect() -> Self {
        Self {
            device_type: std::env::consts::OS.to_string(),
            device_name: hostname::get().ok().and_then(|h| h.into_string().ok()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayRecord {
    pub content_id: ContentId,
    pub content_type: ContentType,
    pub action: PlayAction,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Seconds of actual playback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_duration: Option<f64>,
    /// Percent of the content reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_rate: Option<f64>,
}

impl PlayRecord {
    pub fn start(content_id: ContentId, content_type: ContentType, device: &DeviceInfo) -> Self {
        Self {
            content_id,
            content_type,
            action: PlayAction::Start,
            timestamp: Utc::now(),
            device_type: Some(device.device_type.clone()),
            device_name: device.device_name.clone(),
            play_duration: None,
            completion_rate: None,
        }
    }

    pub fn complete(
        content_id: ContentId,
        content_type: ContentType,
        play_duration: f64,
        completion_rate: f64,
    ) -> Self {
        Self {
            content_id,
            content_type,
            action: PlayAction::Complete,
            timestamp: Utc::now(),
            device_type: None,
            device_name: None,
            play_duration: Some(play_duration),
            completion_rate: Some(completion_rate),
        }
    }
}

/// Collector for play records
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record_play(&self, record: &PlayRecord) -> anyhow::Result<()>;
}

#[async_trait]
impl TelemetrySink for ApiClient {
    async fn record_play(&self, record: &PlayRecord) -> anyhow::Result<()> {
        ApiClient::record_play(self, record).await?;
        Ok(())
    }
}

/// Drops every record
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTelemetrySink;

#[async_trait]
impl TelemetrySink for NullTelemetrySink {
    async fn record_play(&self, _record: &PlayRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

impl PlayerController {
    pub(crate) fn report_start(&self, content: &ContentRecord, content_type: ContentType) {
        self.report(PlayRecord::start(content.id.clone(), content_type, &self.options.device));
    }

    pub(crate) fn report_complete(
        &self,
        content: &ContentRecord,
        content_type: ContentType,
        play_duration: f64,
        completion_rate: f64,
    ) {
        self.report(PlayRecord::complete(
            content.id.clone(),
            content_type,
            play_duration,
            completion_rate,
        ));
    }

    fn report(&self, record: PlayRecord) {
        let sink = self.caps.telemetry.clone();
        tokio::spawn(async move {
            match sink.record_play(&record).await {
                Ok(()) => tracing::debug!(
                    content_id = %record.content_id,
                    action = ?record.action,
                    "Play record delivered"
                ),
                Err(e) => {
                    let error = PlayerError::TelemetryFailed(format!("{:#}", e));
                    tracing::warn!(
                        content_id = %record.content_id,
                        action = ?record.action,
                        error = %error,
                        "Play record not delivered"
                    );
                }
            }
        });
    }

    /// Put `content` at the front of the history and persist it.
    pub(crate) async fn append_history(&self, content: &ContentRecord, content_type: ContentType) {
        let entries = {
            let mut history = self.history.lock().await;
            history.push(HistoryEntry::new(content.clone(), content_type));
            history.entries().to_vec()
        };
        self.persist_history(&entries).await;
    }

    pub(crate) async fn persist_history(&self, entries: &[HistoryEntry]) {
        if let Err(e) = self.caps.history.save(entries).await {
            let error = PlayerError::TelemetryFailed(format!("{:#}", e));
            tracing::warn!(error = %error, entries = entries.len(), "History not persisted");
        }
    }
}
