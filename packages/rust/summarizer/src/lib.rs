//! Change summarization via an OpenAI-compatible chat-completions backend.
//!
//! The backend is optional: without an API key the [`Summarizer`] runs in
//! degraded mode and returns a fixed placeholder pair. Backend errors also
//! degrade to a fixed pair. Summarization never fails the pipeline — a
//! detected change is persisted and notified regardless of what happens
//! here.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pagewatch_shared::{ChangeSummary, OpenAiConfig, PagewatchError, Result};

/// Character budget for each text body sent to the backend. Bounds request
/// cost and latency; pages rarely change meaningfully past their head.
const MAX_PROMPT_CHARS: usize = 2000;

/// Request timeout for the summarization call.
const REQUEST_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PROMPT: &str = "You are a competitor analysis bot. Compare the \
    'Yesterday' content with 'Today' content and highlight significant changes \
    (pricing, features, headlines). Ignore minor wording changes.";

// ---------------------------------------------------------------------------
// Wire types (OpenAI chat-completions subset)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

/// Backend configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct Backend {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

impl Backend {
    /// Build from config + environment; `None` when the key env var is unset
    /// (the summarizer then runs degraded).
    pub fn from_config(config: &OpenAiConfig) -> Option<Self> {
        let api_key = pagewatch_shared::resolve_api_key(&config.api_key_env)?;
        Some(Self {
            api_key,
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

/// Produces human-readable change summaries, or fixed placeholders when the
/// backend is unavailable.
pub struct Summarizer {
    backend: Option<Backend>,
    client: Client,
}

impl Summarizer {
    /// Create a summarizer. `None` backend means degraded mode.
    pub fn new(backend: Option<Backend>) -> Result<Self> {
        if backend.is_none() {
            warn!("no summarization backend configured, summaries will be placeholders");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PagewatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { backend, client })
    }

    /// Whether a real backend is configured.
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Summarize the difference between two observed text bodies.
    ///
    /// Never returns an error: unconfigured and failing backends both
    /// degrade to fixed pairs the caller can persist as-is.
    pub async fn summarize(&self, old_text: &str, new_text: &str) -> ChangeSummary {
        let Some(backend) = &self.backend else {
            return ChangeSummary {
                summary: "AI summary unavailable".into(),
                description: "Changes detected but not analyzed".into(),
            };
        };

        match self.request_summary(backend, old_text, new_text).await {
            Ok(text) => ChangeSummary {
                summary: text,
                description: "AI Analysis Complete".into(),
            },
            Err(e) => {
                warn!(error = %e, "summarization backend call failed");
                ChangeSummary {
                    summary: "Error generating summary".into(),
                    description: "AI Analysis Failed".into(),
                }
            }
        }
    }

    async fn request_summary(
        &self,
        backend: &Backend,
        old_text: &str,
        new_text: &str,
    ) -> Result<String> {
        let request = ChatRequest {
            model: backend.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.into(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Yesterday:\n{}\n\nToday:\n{}",
                        truncate(old_text, MAX_PROMPT_CHARS),
                        truncate(new_text, MAX_PROMPT_CHARS),
                    ),
                },
            ],
        };

        debug!(model = %backend.model, "requesting change summary");

        let response = self
            .client
            .post(format!("{}/chat/completions", backend.api_base))
            .bearer_auth(&backend.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PagewatchError::Summarization(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PagewatchError::Summarization(format!("HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PagewatchError::Summarization(format!("invalid response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_else(|| "No summary generated.".into());

        Ok(content)
    }
}

/// Truncate to at most `max_chars` characters, on a char boundary.
fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn configured(server_uri: &str) -> Summarizer {
        Summarizer::new(Some(Backend {
            api_key: "sk-test".into(),
            model: "gpt-4o".into(),
            api_base: server_uri.to_string(),
        }))
        .expect("build summarizer")
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        // Multi-byte chars must not split
        assert_eq!(truncate("caféteria", 4), "café");
    }

    #[tokio::test]
    async fn degraded_mode_returns_placeholder() {
        let summarizer = Summarizer::new(None).expect("build");
        assert!(!summarizer.is_configured());

        let result = summarizer.summarize("old", "new").await;
        assert_eq!(result.summary, "AI summary unavailable");
        assert_eq!(result.description, "Changes detected but not analyzed");
    }

    #[tokio::test]
    async fn configured_backend_returns_model_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "Price raised from $10 to $20."}}
                ]
            })))
            .mount(&server)
            .await;

        let summarizer = configured(&server.uri());
        let result = summarizer.summarize("Price: $10", "Price: $20").await;

        assert_eq!(result.summary, "Price raised from $10 to $20.");
        assert_eq!(result.description, "AI Analysis Complete");
    }

    #[tokio::test]
    async fn backend_error_degrades_without_failing() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let summarizer = configured(&server.uri());
        let result = summarizer.summarize("old", "new").await;

        assert_eq!(result.summary, "Error generating summary");
        assert_eq!(result.description, "AI Analysis Failed");
    }

    #[tokio::test]
    async fn empty_choice_content_gets_fallback_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let summarizer = configured(&server.uri());
        let result = summarizer.summarize("old", "new").await;
        assert_eq!(result.summary, "No summary generated.");
    }

    #[tokio::test]
    async fn long_inputs_are_truncated_in_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let summarizer = configured(&server.uri());
        let long = "x".repeat(10_000);
        summarizer.summarize(&long, &long).await;

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let user_content = body["messages"][1]["content"].as_str().unwrap();
        // Both bodies bounded to the prompt budget plus framing
        assert!(user_content.len() < 2 * MAX_PROMPT_CHARS + 100);
    }
}
