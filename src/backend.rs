use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::models::{HealthResponse, QueryRequest, QueryResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    Transport,
    Response,
    Decode,
}

impl QueryErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryErrorKind::Transport => "transport",
            QueryErrorKind::Response => "response",
            QueryErrorKind::Decode => "decode",
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

impl QueryError {
    pub fn kind(&self) -> QueryErrorKind {
        match self {
            QueryError::Transport(_) => QueryErrorKind::Transport,
            QueryError::Status { .. } => QueryErrorKind::Response,
            QueryError::Decode(_) => QueryErrorKind::Decode,
        }
    }
}

/// The question-answering service. One call settles exactly once, with either
/// a decoded payload or a classified error.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(&self, question: &str) -> Result<QueryResponse, QueryError>;

    async fn health(&self) -> Result<HealthResponse, QueryError>;
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl QueryBackend for BackendClient {
    async fn query(&self, question: &str) -> Result<QueryResponse, QueryError> {
        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&QueryRequest { q: question })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(QueryError::Status {
                status,
                body: normalize_err_body(&body),
            });
        }

        serde_json::from_str::<QueryResponse>(&body)
            .map_err(|err| QueryError::Decode(err.to_string()))
    }

    async fn health(&self) -> Result<HealthResponse, QueryError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(QueryError::Status {
                status,
                body: normalize_err_body(&body),
            });
        }

        serde_json::from_str::<HealthResponse>(&body)
            .map_err(|err| QueryError::Decode(err.to_string()))
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(detail) = json
            .get("detail")
            .or_else(|| json.get("error"))
            .and_then(|v| v.as_str())
        {
            return detail.to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn query_posts_question_and_decodes_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_json(serde_json::json!({ "q": "what is mmr?" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "answer": "Maximal marginal relevance [1].",
                "citations": [
                    { "i": 1, "title": "mmr", "source": "docs/mmr.md", "snippet": "MMR is..." }
                ],
                "latency_ms": 321,
                "token_estimate": 88
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BackendClient::new(format!("{}/", server.uri()));
        let response = client.query("what is mmr?").await.unwrap();

        assert_eq!(response.answer, "Maximal marginal relevance [1].");
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].i, Some(1));
        assert_eq!(response.latency_ms, 321.0);
        assert_eq!(response.token_estimate, Some(88.0));
    }

    #[tokio::test]
    async fn non_success_status_is_a_response_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({ "detail": "boom" })),
            )
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri());
        let err = client.query("q").await.unwrap_err();

        assert_eq!(err.kind(), QueryErrorKind::Response);
        match err {
            QueryError::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri());
        let err = client.query("q").await.unwrap_err();
        assert_eq!(err.kind(), QueryErrorKind::Decode);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = BackendClient::new(format!("http://{addr}"));
        let err = client.query("q").await.unwrap_err();
        assert_eq!(err.kind(), QueryErrorKind::Transport);
    }

    #[tokio::test]
    async fn health_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })),
            )
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri());
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "ok");
    }

    #[test]
    fn err_body_prefers_detail_then_raw_text() {
        assert_eq!(normalize_err_body("  "), "<empty body>");
        assert_eq!(normalize_err_body(r#"{"error":"bad"}"#), "bad");
        assert_eq!(normalize_err_body("plain failure"), "plain failure");
    }
}
