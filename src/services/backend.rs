use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::error::BackendError;
use crate::services::ai_types::{ChatRequest, ChatResponse};

/// One text-generation call: prompt in, first choice's message content out.
///
/// Timeouts are applied by the caller, implementations only classify failures.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn complete(&self, credential: &str, prompt: &str) -> Result<String, BackendError>;
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for Arc<T> {
    async fn complete(&self, credential: &str, prompt: &str) -> Result<String, BackendError> {
        (**self).complete(credential, prompt).await
    }
}

/// Chat-completions endpoint (OpenRouter-compatible).
pub struct HttpBackend {
    client: Client,
    endpoint: String,
    model: String,
}

const CONNECT_TIMEOUT_SECS: u64 = 15;

impl HttpBackend {
    pub fn new(endpoint: &str, model: &str) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn complete(&self, credential: &str, prompt: &str) -> Result<String, BackendError> {
        let body = ChatRequest::user(&self.model, prompt);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .header("HTTP-Referer", "https://lambda.openrouter.local")
            .header("X-Title", "LambdaTranslator")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        let status = resp.status();

        // Read as text first so error bodies are not lost when they are not JSON.
        let text = resp
            .text()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_http(status, &text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|_| BackendError::Malformed("invalid JSON from backend".into()))?;

        if let Some(err) = &parsed.error {
            return Err(if err.is_auth() {
                BackendError::Authentication(err.describe())
            } else {
                BackendError::Transient(format!("API error: {}", err.describe()))
            });
        }

        match parsed.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
            Some(_) => Err(BackendError::Malformed("empty message content".into())),
            None => Err(BackendError::Malformed(
                "missing choices[0].message.content".into(),
            )),
        }
    }
}

pub fn classify_http(status: StatusCode, body: &str) -> BackendError {
    let message = extract_error_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited(message),
        _ => BackendError::Transient(message),
    }
}

fn extract_error_message(status: StatusCode, body_text: &str) -> String {
    // { "error": { "message": "..." } } or { "message": "..." }
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return format!("HTTP {}: {}", status.as_u16(), msg);
        }
    }

    let trimmed = body_text.trim();
    let snippet: String = trimmed.chars().take(200).collect();
    let ellipsis = if trimmed.chars().count() > 200 { "..." } else { "" };

    format!("HTTP {}: {}{}", status.as_u16(), snippet, ellipsis)
}
