//! REST backend client wrapper with all API methods
//!
//! Every endpoint answers with the same envelope, `{ success, data, message }`.
//! List endpoints carry their items in `data.results`; detail endpoints put the
//! object directly in `data`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::content::{ContentId, ContentRecord};
use crate::error::ApiError;
use crate::tts::SpeechOptions;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8090";
const PLAY_RECORD_PATH: &str = "/player/record";
const SPEECH_TASK_PATH: &str = "/ai/tts";

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
}

/// Query parameters for feed and search endpoints
#[derive(Clone, Debug, Default)]
pub struct FeedQuery {
    params: Vec<(String, String)>,
}

impl FeedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; empty values are dropped, later values replace earlier ones.
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        self.params.retain(|(k, _)| k != key);
        if !value.is_empty() {
            self.params.push((key.to_string(), value));
        }
        self
    }

    pub fn page(self, page: u32, page_size: u32) -> Self {
        self.with("page", page).with("page_size", page_size)
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub children: Vec<Category>,
}

/// Server-side speech synthesis job
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SpeechTask {
    pub task_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, alias = "audioUrl")]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<f64>,
}

impl SpeechTask {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "failed" | "error")
    }
}

/// Client for the content backend
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: token.filter(|t| !t.is_empty()).map(Arc::from),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> ApiResult<Value> {
        crate::log_api_request!(operation, base_url = %self.base_url);
        let result = Self::execute(builder).await;
        crate::log_api_result!(operation, result);
        result
    }

    async fn execute(builder: RequestBuilder) -> ApiResult<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        if !envelope.success {
            let message = envelope.message.unwrap_or_else(|| "unsuccessful response".to_string());
            return Err(ApiError::Envelope(message));
        }

        Ok(envelope.data)
    }

    async fn get_results(&self, path: &str, query: &FeedQuery, operation: &str) -> ApiResult<Vec<ContentRecord>> {
        let data = self
            .send(self.request(Method::GET, path).query(query.params()), operation)
            .await?;
        parse_results(data)
    }

    /// Mixed-media recommendation feed
    pub async fn recommend(&self, query: &FeedQuery) -> ApiResult<Vec<ContentRecord>> {
        self.get_results("/content/recommend", query, "recommend").await
    }

    /// Daily news, articles first
    pub async fn daily_news(&self, query: &FeedQuery) -> ApiResult<Vec<ContentRecord>> {
        let query = query
            .clone()
            .with("type", "article")
            .with("category", "daily")
            .with("sort", "published_at");
        self.get_results("/content/recommend", &query, "daily_news").await
    }

    pub async fn follow_content(&self, query: &FeedQuery) -> ApiResult<Vec<ContentRecord>> {
        let query = query.clone().with("tag", "follow");
        self.get_results("/content/recommend", &query, "follow_content").await
    }

    pub async fn news_content(&self, query: &FeedQuery) -> ApiResult<Vec<ContentRecord>> {
        let query = query.clone().with("tag", "news").with("sort", "latest");
        self.get_results("/content/recommend", &query, "news_content").await
    }

    pub async fn trending(&self, query: &FeedQuery) -> ApiResult<Vec<ContentRecord>> {
        self.get_results("/content/trending", query, "trending").await
    }

    pub async fn search(&self, query: &FeedQuery) -> ApiResult<Vec<ContentRecord>> {
        self.get_results("/content/search", query, "search").await
    }

    pub async fn recent_played(&self, query: &FeedQuery) -> ApiResult<Vec<ContentRecord>> {
        self.get_results("/users/recent-played", query, "recent_played").await
    }

    pub async fn related(&self, id: &ContentId, query: &FeedQuery) -> ApiResult<Vec<ContentRecord>> {
        self.get_results(&format!("/content/{}/related", id), query, "related").await
    }

    pub async fn content_detail(&self, id: &ContentId) -> ApiResult<ContentRecord> {
        let data = self
            .send(self.request(Method::GET, &format!("/content/{}", id)), "content_detail")
            .await?;
        decode(data)
    }

    pub async fn categories(&self, query: &FeedQuery) -> ApiResult<Vec<Category>> {
        let data = self
            .send(self.request(Method::GET, "/categories").query(query.params()), "categories")
            .await?;
        decode(data)
    }

    pub async fn like(&self, id: &ContentId, liked: bool) -> ApiResult<Value> {
        let body = json!({ "content_id": id, "liked": liked });
        self.send(self.request(Method::POST, "/content/like").json(&body), "like")
            .await
    }

    pub async fn bookmark(&self, id: &ContentId, bookmarked: bool) -> ApiResult<Value> {
        let body = json!({ "content_id": id, "bookmarked": bookmarked });
        self.send(self.request(Method::POST, "/content/bookmark").json(&body), "bookmark")
            .await
    }

    pub async fn follow_user(&self, user_id: &str, follow: bool) -> ApiResult<Value> {
        let body = json!({ "user_id": user_id, "follow": follow });
        self.send(self.request(Method::POST, "/user/follow").json(&body), "follow_user")
            .await
    }

    /// Post a playback start/complete record
    pub async fn record_play<T: Serialize + ?Sized>(&self, record: &T) -> ApiResult<()> {
        self.send(self.request(Method::POST, PLAY_RECORD_PATH).json(record), "record_play")
            .await?;
        Ok(())
    }

    /// Queue `text` for synthesis
    pub async fn submit_speech(&self, text: &str, options: &SpeechOptions) -> ApiResult<SpeechTask> {
        let body = json!({
            "text": text,
            "voice": options.voice,
            "speed": options.speed,
            "volume": options.volume,
            "language": options.language,
        });
        let data = self
            .send(self.request(Method::POST, SPEECH_TASK_PATH).json(&body), "submit_speech")
            .await?;
        decode(data)
    }

    pub async fn speech_task(&self, task_id: &str) -> ApiResult<SpeechTask> {
        let path = format!("{}/{}", SPEECH_TASK_PATH, task_id);
        let data = self.send(self.request(Method::GET, &path), "speech_task").await?;
        decode(data)
    }
}

fn parse_results(data: Value) -> ApiResult<Vec<ContentRecord>> {
    match data {
        Value::Object(mut map) => match map.remove("results") {
            Some(results @ Value::Array(_)) => decode(results),
            _ => Err(ApiError::Decode("missing results array".to_string())),
        },
        _ => Err(ApiError::Decode("expected an object with results".to_string())),
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> ApiResult<T> {
    serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
}
