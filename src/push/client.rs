use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Push provider HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Push send reported failure")]
    SendRejected,
}

/// Outcome of a target-validity lookup.
#[derive(Debug)]
pub enum TargetStatus {
    /// Target is valid; carries the provider's metadata blob (raw JSON).
    Valid { details: String },
    /// The provider no longer knows the token (expired registration).
    Expired,
}

/// HTTP client for the push-notification provider.
///
/// Base URL is configurable for tests, mirroring the timeline provider
/// client.
#[derive(Clone)]
pub struct PushClient {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    timeout: Duration,
}

impl PushClient {
    pub fn new(api_base: impl Into<String>, api_key: SecretString, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key,
            timeout,
        }
    }

    /// Query the provider for a registration token's validity.
    ///
    /// A 404 means the registration has expired and the target should be
    /// deactivated; any other non-2xx is a provider error.
    pub async fn lookup_target(&self, token: &str) -> Result<TargetStatus, PushError> {
        let url = format!("{}/info/{}", self.api_base, token);
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .get(&url)
                .query(&[("details", "true")])
                .header("Authorization", format!("key={}", self.api_key.expose_secret()))
                .send(),
        )
        .await
        .map_err(|_| PushError::Timeout)?
        .map_err(PushError::Network)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(TargetStatus::Expired);
        }
        if !status.is_success() {
            return Err(PushError::HttpStatus(status.as_u16()));
        }

        let details = response.text().await.map_err(PushError::Network)?;
        Ok(TargetStatus::Valid { details })
    }

    /// Send a small key-value data message to one registration.
    pub async fn send_data_message(
        &self,
        registration_id: &str,
        data: &serde_json::Value,
    ) -> Result<(), PushError> {
        let url = format!("{}/send", self.api_base);
        let body = serde_json::json!({
            "registration_id": registration_id,
            "data": data,
        });

        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&url)
                .header("Authorization", format!("key={}", self.api_key.expose_secret()))
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| PushError::Timeout)?
        .map_err(PushError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::HttpStatus(status.as_u16()));
        }

        // The provider reports per-message success in the body.
        let result: serde_json::Value = response.json().await.map_err(PushError::Network)?;
        if result.get("success").and_then(|v| v.as_i64()) == Some(1) {
            Ok(())
        } else {
            Err(PushError::SendRejected)
        }
    }
}
