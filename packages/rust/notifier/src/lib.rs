//! Email alert delivery via a Resend-style HTTP API.
//!
//! The delivery backend is optional: without an API key the [`Notifier`]
//! runs in simulated mode — the would-be message is logged and reported as
//! delivered. Only real transport errors are failures; the pipeline treats
//! "no backend configured" the same as a successful delivery.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pagewatch_shared::{EmailConfig, PagewatchError, Result};

/// Request timeout for delivery calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Wire types (Resend /emails subset)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Delivery backend configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct Backend {
    pub api_key: String,
    pub from: String,
    pub api_base: String,
}

impl Backend {
    /// Build from config + environment; `None` when the key env var is unset
    /// (the notifier then simulates delivery).
    pub fn from_config(config: &EmailConfig) -> Option<Self> {
        let api_key = pagewatch_shared::resolve_api_key(&config.api_key_env)?;
        Some(Self {
            api_key,
            from: config.from.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

/// Result of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Whether the message was (or counts as) delivered.
    pub delivered: bool,
    /// True when no backend is configured and the message was only logged.
    pub simulated: bool,
    /// Provider message id, when a real delivery happened.
    pub id: Option<String>,
}

/// Sends alert emails, or logs them when no backend is configured.
pub struct Notifier {
    backend: Option<Backend>,
    client: Client,
}

impl Notifier {
    /// Create a notifier. `None` backend means simulated mode.
    pub fn new(backend: Option<Backend>) -> Result<Self> {
        if backend.is_none() {
            warn!("no delivery backend configured, alerts will be logged only");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PagewatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { backend, client })
    }

    /// Whether a real delivery backend is configured.
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Deliver an alert email. Transport failures are errors; a missing
    /// backend is a simulated success.
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<Delivery> {
        let Some(backend) = &self.backend else {
            info!(%to, %subject, "simulated alert delivery");
            info!("{html}");
            return Ok(Delivery {
                delivered: true,
                simulated: true,
                id: None,
            });
        };

        let request = SendRequest {
            from: &backend.from,
            to,
            subject,
            html,
        };

        let response = self
            .client
            .post(format!("{}/emails", backend.api_base))
            .bearer_auth(&backend.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PagewatchError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PagewatchError::Notification(format!("HTTP {status}")));
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| PagewatchError::Notification(format!("invalid response: {e}")))?;

        info!(%to, id = ?parsed.id, "alert delivered");

        Ok(Delivery {
            delivered: true,
            simulated: false,
            id: parsed.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn configured(server_uri: &str) -> Notifier {
        Notifier::new(Some(Backend {
            api_key: "re-test".into(),
            from: "Pagewatch <onboarding@resend.dev>".into(),
            api_base: server_uri.to_string(),
        }))
        .expect("build notifier")
    }

    #[tokio::test]
    async fn simulated_mode_reports_delivered() {
        let notifier = Notifier::new(None).expect("build");
        assert!(!notifier.is_configured());

        let delivery = notifier
            .send("owner@example.com", "Change Detected", "<p>hi</p>")
            .await
            .expect("simulated send");

        assert!(delivery.delivered);
        assert!(delivery.simulated);
        assert!(delivery.id.is_none());
    }

    #[tokio::test]
    async fn real_delivery_posts_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("Authorization", "Bearer re-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "msg_123"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let notifier = configured(&server.uri());
        let delivery = notifier
            .send("owner@example.com", "Change Detected: Acme", "<p>body</p>")
            .await
            .expect("send");

        assert!(delivery.delivered);
        assert!(!delivery.simulated);
        assert_eq!(delivery.id.as_deref(), Some("msg_123"));

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["to"], "owner@example.com");
        assert_eq!(body["from"], "Pagewatch <onboarding@resend.dev>");
        assert_eq!(body["subject"], "Change Detected: Acme");
    }

    #[tokio::test]
    async fn transport_failure_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = configured(&server.uri());
        let err = notifier
            .send("owner@example.com", "s", "<p>b</p>")
            .await
            .unwrap_err();

        assert!(matches!(err, PagewatchError::Notification(_)));
    }
}
