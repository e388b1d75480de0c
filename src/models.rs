use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const THINKING_MESSAGE: &str = "Thinking...";
pub const REQUEST_FAILED_MESSAGE: &str = "Request failed. Check backend URL and server.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A cited source snippet as shown next to an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub index: u32,
    pub title: String,
    pub source: String,
    pub snippet: String,
}

impl Citation {
    /// Last path segment of `source`, which is all a reader needs to see.
    pub fn display_source(&self) -> &str {
        let trimmed = self.source.trim_end_matches(['/', '\\']);
        trimmed
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(trimmed)
    }

    pub fn label(&self) -> String {
        format!("[{}] {}", self.index, self.title)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MessageMeta {
    pub latency_ms: f64,
    pub token_estimate: Option<f64>,
}

impl MessageMeta {
    pub fn summary(&self) -> String {
        let estimate = self
            .token_estimate
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        format!("Latency: {} ms | Token est: {}", self.latency_ms, estimate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub meta: Option<MessageMeta>,
    #[serde(default)]
    pub pending: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    pub fn placeholder() -> Self {
        Self {
            pending: true,
            ..Self::new(Role::Assistant, THINKING_MESSAGE.to_string())
        }
    }

    pub fn answer(content: String, citations: Vec<Citation>, meta: MessageMeta) -> Self {
        Self {
            citations,
            meta: Some(meta),
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn request_failed() -> Self {
        Self::new(Role::Assistant, REQUEST_FAILED_MESSAGE.to_string())
    }

    fn new(role: Role, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            citations: vec![],
            meta: None,
            pending: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub q: &'a str,
}

/// Citation as the backend sends it. Every field is optional so a sloppy
/// entry degrades to "no citation" instead of failing the whole response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawCitation {
    #[serde(default)]
    pub i: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub citations: Vec<RawCitation>,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub token_estimate: Option<f64>,
}

impl QueryResponse {
    pub fn meta(&self) -> MessageMeta {
        MessageMeta {
            latency_ms: self.latency_ms,
            token_estimate: self.token_estimate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(source: &str) -> Citation {
        Citation {
            index: 1,
            title: "Guide".to_string(),
            source: source.to_string(),
            snippet: String::new(),
        }
    }

    #[test]
    fn display_source_keeps_last_segment() {
        assert_eq!(citation("docs/guides/setup.md").display_source(), "setup.md");
        assert_eq!(citation("C:\\data\\notes.txt").display_source(), "notes.txt");
        assert_eq!(citation("docs/guides/").display_source(), "guides");
        assert_eq!(citation("readme.md").display_source(), "readme.md");
        assert_eq!(citation("").display_source(), "");
    }

    #[test]
    fn label_uses_index_and_title() {
        assert_eq!(citation("a").label(), "[1] Guide");
    }

    #[test]
    fn meta_summary_handles_missing_estimate() {
        let meta = MessageMeta {
            latency_ms: 120.0,
            token_estimate: None,
        };
        assert_eq!(meta.summary(), "Latency: 120 ms | Token est: n/a");

        let meta = MessageMeta {
            latency_ms: 87.0,
            token_estimate: Some(412.0),
        };
        assert_eq!(meta.summary(), "Latency: 87 ms | Token est: 412");
    }

    #[test]
    fn placeholder_is_pending_assistant() {
        let placeholder = Message::placeholder();
        assert!(placeholder.pending);
        assert_eq!(placeholder.role, Role::Assistant);
        assert_eq!(placeholder.content, THINKING_MESSAGE);
        assert_ne!(placeholder.id, Message::placeholder().id);
    }

    #[test]
    fn response_tolerates_missing_and_null_fields() {
        let parsed: QueryResponse = serde_json::from_str(
            r#"{"answer":"Hi","citations":null,"token_estimate":null}"#,
        )
        .expect("lenient payload should decode");
        assert_eq!(parsed.answer, "Hi");
        assert!(parsed.citations.is_empty());
        assert_eq!(parsed.latency_ms, 0.0);
        assert_eq!(parsed.token_estimate, None);

        let parsed: QueryResponse = serde_json::from_str(
            r#"{"answer":"A [1]","citations":[{"i":1,"title":null,"source":"x/y.md"},{"title":"t"}],"latency_ms":12}"#,
        )
        .expect("partial citations should decode");
        assert_eq!(parsed.citations.len(), 2);
        assert_eq!(parsed.citations[0].i, Some(1));
        assert_eq!(parsed.citations[0].title, "");
        assert_eq!(parsed.citations[1].i, None);
    }

    #[test]
    fn response_without_answer_is_rejected() {
        let parsed = serde_json::from_str::<QueryResponse>(r#"{"citations":[]}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::Assistant).expect("serialize role"),
            "\"assistant\""
        );
        assert_eq!(Role::User.as_str(), "user");
    }
}
