use std::time::Duration;

use serde_json::json;

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email client configuration error: {0}")]
    Configuration(String),
    #[error("email transport error: {0}")]
    Transport(String),
    #[error("email provider returned status {0}")]
    Status(u16),
}

/// Fire-and-forget notification collaborator. Failures are reported to the
/// caller but never retried here.
#[derive(Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailClient {
    pub fn new(config: &AppConfig) -> Result<Self, EmailError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| EmailError::Configuration(err.to_string()))?;

        Ok(Self {
            http,
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
        })
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        if self.api_key.is_empty() {
            return Err(EmailError::Configuration("email_api_key is empty".into()));
        }

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .map_err(|err| EmailError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(EmailError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
