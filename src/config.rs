use std::env;

pub const BACKEND_URL_VAR: &str = "RAG_BACKEND_URL";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub backend_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_backend_url(env::var(BACKEND_URL_VAR).ok())
    }

    /// Blank values fall back to the local default.
    pub fn from_backend_url(value: Option<String>) -> Self {
        let backend_base_url = value
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        Self { backend_base_url }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_backend_url(None)
    }
}
