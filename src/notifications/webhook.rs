//! Webhook notifier
//!
//! Posts each notice as JSON to a text/email relay:
//!
//! ```json
//! { "to": "555-0100", "message": "It's your turn to pick a stand" }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Notifier, NotifyError, NotifyResult};

/// Webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Relay URL endpoint
    pub url: String,
    /// Optional authentication token (sent as Bearer token)
    pub auth_token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            timeout_secs: default_timeout(),
        }
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let parsed =
            url::Url::parse(&self.url).map_err(|e| format!("Invalid webhook URL: {e}"))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err("Webhook URL must use http or https".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Notifier posting to an HTTP relay
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> NotifyResult<Self> {
        config.validate().map_err(NotifyError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, contact: &str, message: &str) -> NotifyResult<()> {
        let payload = serde_json::json!({
            "to": contact,
            "message": message,
        });

        let mut request = self.client.post(&self.config.url);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.json(&payload).send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %self.config.url, %status, "Webhook delivered");
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_config_validation() {
        assert!(WebhookConfig::new("https://relay.example.com/sms")
            .validate()
            .is_ok());
        assert!(WebhookConfig::new("ftp://relay.example.com").validate().is_err());
        assert!(WebhookConfig::new("not a url").validate().is_err());
        assert!(WebhookConfig::new("https://relay.example.com")
            .with_timeout(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            WebhookNotifier::new(WebhookConfig::new("relay")),
            Err(NotifyError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_posts_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "to": "555-0100",
                "message": "your turn"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(
            WebhookConfig::new(format!("{}/notify", server.uri())).with_auth_token("secret"),
        )
        .unwrap();

        notifier.notify("555-0100", "your turn").await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad number"))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(WebhookConfig::new(server.uri())).unwrap();
        let err = notifier.notify("nope", "your turn").await.unwrap_err();
        match err {
            NotifyError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad number");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
