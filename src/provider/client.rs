use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use super::types::{AccessTokenResponse, FriendsPage, OembedResponse, RemoteUser, TimelineEntry};

/// Default cooldown when the provider rate-limits us without a
/// retry-after header.
const DEFAULT_RATE_LIMIT_COOLDOWN_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request exceeded the configured per-call timeout.
    #[error("Provider request timed out")]
    Timeout,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The stored access pair was rejected (401/403). Non-fatal to a
    /// multi-credential batch; the caller skips the credential.
    #[error("Credential rejected by provider: status {0}")]
    CredentialRejected(u16),
    /// Any other non-2xx response.
    #[error("Provider HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body did not match the expected shape.
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Access pair identifying one credential against the provider.
#[derive(Debug, Clone)]
pub struct CredentialAuth {
    pub access_token: String,
    pub access_secret: String,
}

/// HTTP client for the remote timeline provider.
///
/// All endpoints hang off a configurable base URL so tests can point the
/// client at a mock server. Rate-limit (429) responses are honored as a
/// blocking wait, never surfaced as an error.
#[derive(Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    api_base: String,
    consumer_key: SecretString,
    consumer_secret: SecretString,
    timeout: Duration,
}

impl ProviderClient {
    pub fn new(
        api_base: impl Into<String>,
        consumer_key: SecretString,
        consumer_secret: SecretString,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            consumer_key,
            consumer_secret,
            timeout,
        }
    }

    /// Exchange a request token + verifier for an access pair.
    pub async fn exchange_access_token(
        &self,
        request_token: &str,
        verifier: &str,
    ) -> Result<AccessTokenResponse, ProviderError> {
        let url = format!("{}/oauth/access_token", self.api_base);
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&url)
                .header("X-Consumer-Key", self.consumer_key.expose_secret())
                .header("X-Consumer-Secret", self.consumer_secret.expose_secret())
                .form(&[("request_token", request_token), ("verifier", verifier)])
                .send(),
        )
        .await
        .map_err(|_| ProviderError::Timeout)?
        .map_err(ProviderError::Network)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::CredentialRejected(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ProviderError::HttpStatus(status.as_u16()));
        }

        response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    /// Verify an access pair, returning the credential's own account.
    pub async fn verify_credentials(
        &self,
        auth: &CredentialAuth,
    ) -> Result<RemoteUser, ProviderError> {
        let url = format!("{}/account/verify", self.api_base);
        self.get_json(&url, auth, &[]).await
    }

    /// Enumerate the full follow graph, following pagination cursors.
    ///
    /// Provider-imposed rate-limit cooldowns during pagination are waited
    /// out inside `get_json`; the enumeration resumes afterward.
    pub async fn friends(&self, auth: &CredentialAuth) -> Result<Vec<RemoteUser>, ProviderError> {
        let url = format!("{}/friends/list", self.api_base);
        let mut users = Vec::new();
        let mut cursor: i64 = -1;

        loop {
            let cursor_param = cursor.to_string();
            let page: FriendsPage = self
                .get_json(&url, auth, &[("cursor", cursor_param.as_str())])
                .await?;
            users.extend(page.users);
            if page.next_cursor == 0 {
                break;
            }
            cursor = page.next_cursor;
        }

        tracing::debug!(count = users.len(), "Enumerated follow graph");
        Ok(users)
    }

    /// Fetch an account's timeline, optionally only entries newer than
    /// `since_id`. Page size is the provider's own default.
    pub async fn user_timeline(
        &self,
        auth: &CredentialAuth,
        handle: &str,
        since_id: Option<&str>,
    ) -> Result<Vec<TimelineEntry>, ProviderError> {
        let url = format!("{}/statuses/user_timeline", self.api_base);
        let mut params = vec![("handle", handle)];
        if let Some(since) = since_id {
            params.push(("since_id", since));
        }
        self.get_json(&url, auth, &params).await
    }

    /// Embed-lookup for a social-post URL.
    ///
    /// Returns `Ok(None)` on any non-2xx response: a missing or deleted
    /// post is an expected outcome, not an error.
    pub async fn oembed(&self, post_url: &str) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/oembed", self.api_base);
        let response = tokio::time::timeout(
            self.timeout,
            self.client.get(&url).query(&[("url", post_url)]).send(),
        )
        .await
        .map_err(|_| ProviderError::Timeout)?
        .map_err(ProviderError::Network)?;

        if !response.status().is_success() {
            tracing::debug!(
                url = %post_url,
                status = response.status().as_u16(),
                "Embed lookup returned non-success"
            );
            return Ok(None);
        }

        let embed: OembedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(Some(embed.html))
    }

    /// Send a direct message to a recipient's inbox.
    pub async fn send_direct_message(
        &self,
        auth: &CredentialAuth,
        recipient: &str,
        text: &str,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/direct_messages/new", self.api_base);
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&url)
                .header("Authorization", self.bearer(auth))
                .header("X-Consumer-Key", self.consumer_key.expose_secret())
                .form(&[("recipient", recipient), ("text", text)])
                .send(),
        )
        .await
        .map_err(|_| ProviderError::Timeout)?
        .map_err(ProviderError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }

    fn bearer(&self, auth: &CredentialAuth) -> String {
        // The access pair travels as a composite token; full request
        // signing is the transport collaborator's concern.
        format!("Token {}:{}", auth.access_token, auth.access_secret)
    }

    /// GET + JSON-decode with authentication, per-call timeout, and
    /// blocking rate-limit handling.
    ///
    /// A 429 response is waited out (retry-after header, else a default
    /// cooldown) and the request is re-issued; this loop never turns a
    /// rate limit into an error. 401/403 map to `CredentialRejected`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: &CredentialAuth,
        params: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        loop {
            let request = self
                .client
                .get(url)
                .query(params)
                .header("Authorization", self.bearer(auth))
                .header("X-Consumer-Key", self.consumer_key.expose_secret());

            let response = tokio::time::timeout(self.timeout, request.send())
                .await
                .map_err(|_| ProviderError::Timeout)?
                .map_err(ProviderError::Network)?;

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let cooldown = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN_SECS);
                tracing::warn!(
                    url = %url,
                    cooldown_secs = cooldown,
                    "Provider rate limit, waiting for cooldown"
                );
                tokio::time::sleep(Duration::from_secs(cooldown)).await;
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(ProviderError::CredentialRejected(status.as_u16()));
            }

            if !status.is_success() {
                return Err(ProviderError::HttpStatus(status.as_u16()));
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> ProviderClient {
        ProviderClient::new(
            base.to_string(),
            SecretString::from("ck"),
            SecretString::from("cs"),
            Duration::from_secs(5),
        )
    }

    fn test_auth() -> CredentialAuth {
        CredentialAuth {
            access_token: "at".to_string(),
            access_secret: "as".to_string(),
        }
    }

    #[tokio::test]
    async fn test_friends_follows_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/friends/list"))
            .and(query_param("cursor", "-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": [{"handle": "a", "display_name": "A"}],
                "next_cursor": 7
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/friends/list"))
            .and(query_param("cursor", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": [{"handle": "b", "display_name": "B"}],
                "next_cursor": 0
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let users = client.friends(&test_auth()).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].handle, "a");
        assert_eq!(users[1].handle, "b");
    }

    #[tokio::test]
    async fn test_rate_limit_waits_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/friends/list"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/friends/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": [],
                "next_cursor": 0
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        // Waits out the 429, then completes; the rate limit is never an error.
        let users = client.friends(&test_auth()).await.unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_credential_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/account/verify"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.verify_credentials(&test_auth()).await;
        assert!(matches!(
            result,
            Err(ProviderError::CredentialRejected(401))
        ));
    }

    #[tokio::test]
    async fn test_timeline_passes_since_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/statuses/user_timeline"))
            .and(query_param("handle", "carol"))
            .and(query_param("since_id", "41"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": "42",
                "text": "hello",
                "created_at": "2026-08-20T12:00:00Z",
                "author": {"handle": "carol"}
            }])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let entries = client
            .user_timeline(&test_auth(), "carol", Some("41"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "42");
        assert_eq!(entries[0].author.handle, "carol");
    }

    #[tokio::test]
    async fn test_oembed_404_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oembed"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let embed = client
            .oembed("https://example.social/carol/status/1")
            .await
            .unwrap();
        assert!(embed.is_none());
    }

    #[tokio::test]
    async fn test_token_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-at",
                "access_secret": "new-as",
                "handle": "carol"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let pair = client.exchange_access_token("rt", "v").await.unwrap();
        assert_eq!(pair.access_token, "new-at");
        assert_eq!(pair.handle, "carol");
    }
}
