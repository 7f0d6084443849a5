//! Content records fetched from the backend and content-type resolution

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PlayerError;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "flac", "ogg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv", "flv", "webm"];

/// Backend identifier, sent as a number by most endpoints and as a string by some
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for ContentId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<i64>() {
            Ok(n) => serializer.serialize_i64(n),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => ContentId(n.to_string()),
            RawId::Str(s) => ContentId(s),
        })
    }
}

/// The three playable kinds of content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Audio,
    Video,
    Article,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Audio => "audio",
            ContentType::Video => "video",
            ContentType::Article => "article",
        }
    }

    /// Classify a record; the first matching rule wins and article is the fallback.
    pub fn resolve(record: &ContentRecord) -> ContentType {
        if let Some(Ok(content_type)) = record.content_type.as_deref().map(str::parse) {
            return content_type;
        }

        if non_empty(&record.audio_url).is_some() {
            return ContentType::Audio;
        }
        if non_empty(&record.video_url).is_some() {
            return ContentType::Video;
        }
        if non_empty(&record.article_content).is_some() || non_empty(&record.text_content).is_some() {
            return ContentType::Article;
        }

        let url = non_empty(&record.media_url)
            .or_else(|| non_empty(&record.file_url))
            .unwrap_or_default();
        if let Some(content_type) = Self::from_extension(url) {
            return content_type;
        }

        if let Some(mime) = non_empty(&record.mime_type) {
            let mime = mime.to_ascii_lowercase();
            if mime.starts_with("audio/") {
                return ContentType::Audio;
            }
            if mime.starts_with("video/") {
                return ContentType::Video;
            }
        }

        ContentType::Article
    }

    fn from_extension(url: &str) -> Option<ContentType> {
        // Query strings and fragments are not part of the file name.
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let (_, extension) = path.rsplit_once('.')?;
        let extension = extension.to_ascii_lowercase();

        if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
            Some(ContentType::Audio)
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Some(ContentType::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(ContentType::Audio),
            "video" => Ok(ContentType::Video),
            "article" => Ok(ContentType::Article),
            other => Err(PlayerError::UnsupportedContentType(other.to_string())),
        }
    }
}

/// A unit of media or text as returned by the backend
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: ContentId,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<f64>,
    /// Fields this client does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for ContentId {
    fn default() -> Self {
        Self(String::new())
    }
}

impl ContentRecord {
    pub fn new(id: impl Into<ContentId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn audio_source(&self) -> Option<&str> {
        non_empty(&self.audio_url).or_else(|| non_empty(&self.media_url))
    }

    pub fn video_source(&self) -> Option<&str> {
        non_empty(&self.video_url).or_else(|| non_empty(&self.media_url))
    }

    pub fn poster(&self) -> Option<&str> {
        non_empty(&self.cover_url).or_else(|| non_empty(&self.thumbnail_url))
    }

    /// Textual body used for reading-time estimates and speech synthesis
    pub fn body(&self) -> &str {
        non_empty(&self.article_content)
            .or_else(|| non_empty(&self.text_content))
            .or_else(|| non_empty(&self.content))
            .unwrap_or_default()
    }

    pub fn display_description(&self) -> &str {
        non_empty(&self.description)
            .or_else(|| non_empty(&self.summary))
            .unwrap_or_default()
    }
}

impl From<String> for ContentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

/// Durations arrive as numbers, numeric strings or null depending on the endpoint.
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().filter(|d| *d >= 0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok().filter(|d| *d >= 0.0),
        _ => None,
    })
}
