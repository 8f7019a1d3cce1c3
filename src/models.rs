use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{ErrorKind, Result};

// Messages API request format
#[derive(Serialize, Debug, Clone)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl MessagesRequest {
    /// Single-turn request: one system prompt, one user message.
    pub fn single_turn(model: &str, max_tokens: u32, system: &str, prompt: &str) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            system: system.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }
}

// Messages API response format
#[derive(Deserialize, Debug, Clone)]
pub struct MessagesResponse {
    #[serde(default)]
    pub model: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl MessagesResponse {
    /// All text blocks joined; `None` when the reply has no text at all.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    BlogPost,
    ProductDescription,
    SocialPost,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::BlogPost => "blog_post",
            ContentKind::ProductDescription => "product_description",
            ContentKind::SocialPost => "social_post",
        }
    }
}

// Generation request accepted by the service
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub content_type: ContentKind,
    pub topic: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub word_count: Option<u32>,
    // social posts only; defaults to instagram
    #[serde(default)]
    pub platform: Option<String>,
    // product descriptions only
    #[serde(default)]
    pub product_details: Option<serde_json::Value>,
}

// Generated content handed back to callers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub title: String,
    pub content: String,
    pub meta_description: String,
    pub keywords: Vec<String>,
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
    pub content_type: ContentKind,
}

// Several requests generated in order by one worker pass
#[derive(Deserialize, Debug, Clone)]
pub struct BatchRequest {
    pub requests: Vec<ContentRequest>,
}

/// Outcome of one batch item; a failed item does not stop the batch.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItem {
    Ok { content: GeneratedContent },
    Error { error: ErrorKind, message: String },
}

impl From<Result<GeneratedContent>> for BatchItem {
    fn from(result: Result<GeneratedContent>) -> Self {
        match result {
            Ok(content) => BatchItem::Ok { content },
            Err(e) => BatchItem::Error {
                error: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct BatchResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

impl BatchResponse {
    pub fn new(results: Vec<Result<GeneratedContent>>) -> Self {
        let results: Vec<BatchItem> = results.into_iter().map(BatchItem::from).collect();
        let succeeded = results
            .iter()
            .filter(|item| matches!(item, BatchItem::Ok { .. }))
            .count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

// Queued job - holds the request(s) + response channel
pub enum GenerationJob {
    Single {
        request: ContentRequest,
        response_tx: oneshot::Sender<Result<GeneratedContent>>,
    },
    Batch {
        requests: Vec<ContentRequest>,
        response_tx: oneshot::Sender<Vec<Result<GeneratedContent>>>,
    },
}
