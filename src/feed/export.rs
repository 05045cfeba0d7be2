use chrono::Utc;
use std::path::Path;
use thiserror::Error;

use crate::provider::{CredentialAuth, ProviderClient, ProviderError};
use crate::storage::Database;

use super::artifact::write_artifact;
use super::outline::{OutlineBuilder, OutlineNode};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Database error: {0}")]
    Store(String),
    #[error("Outline serialization failed: {0}")]
    Render(String),
    #[error("Failed to write outline artifact: {0}")]
    Io(String),
}

/// Complete a token exchange and export the credential's outline-of-feeds.
///
/// Upserts the credential, walks the full follow graph, and emits one OPML
/// node per followed account that exposes a homepage URL. Each such account
/// is also registered against the credential so the next sync picks it up;
/// a registration failure is logged and skipped, never fatal. Returns the
/// external URL of the written artifact. The completion direct message is
/// best-effort.
#[allow(clippy::too_many_arguments)]
pub async fn export_outline(
    db: &Database,
    provider: &ProviderClient,
    out_dir: &Path,
    artifact_base_url: &str,
    host_uri: &str,
    request_token: &str,
    verifier: &str,
) -> Result<String, ExportError> {
    let access = provider
        .exchange_access_token(request_token, verifier)
        .await?;
    let credential_id = db
        .upsert_credential(&access.handle, &access.access_token, &access.access_secret)
        .await
        .map_err(|e| ExportError::Store(e.to_string()))?;
    let auth = CredentialAuth {
        access_token: access.access_token.clone(),
        access_secret: access.access_secret.clone(),
    };

    let friends = provider.friends(&auth).await?;

    let mut builder = OutlineBuilder::new(
        format!("Accounts followed by {}", access.handle),
        Utc::now(),
    );
    let feed_host = host_uri.trim_end_matches('/');

    for friend in &friends {
        let homepage = match friend.homepage_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => continue,
        };

        builder.push_node(OutlineNode {
            text: friend.display_name.clone(),
            html_url: homepage.to_string(),
            xml_url: format!("{}/xml/feed-{}.xml", feed_host, friend.handle),
        });

        // Register so the next sync covers this account; a single bad row
        // must not sink the export.
        match db.resolve_or_create_account(&friend.handle).await {
            Ok(account) => {
                if let Err(error) = db.link_credential_account(credential_id, account.id).await {
                    tracing::warn!(handle = %friend.handle, %error, "Failed to link account to credential");
                }
            }
            Err(error) => {
                tracing::warn!(handle = %friend.handle, %error, "Failed to register followed account");
            }
        }
    }

    let xml = builder
        .render()
        .map_err(|e| ExportError::Render(e.to_string()))?;

    let path = out_dir
        .join("opml")
        .join(format!("{}.opml", access.handle));
    write_artifact(&path, xml.as_bytes()).map_err(|e| ExportError::Io(e.to_string()))?;

    let artifact_url = format!(
        "{}/opml/{}.opml",
        artifact_base_url.trim_end_matches('/'),
        access.handle
    );

    if let Err(error) = provider
        .send_direct_message(
            &auth,
            &access.handle,
            &format!("Your feed outline is ready: {}", artifact_url),
        )
        .await
    {
        tracing::warn!(%error, "Outline-ready direct message failed");
    }

    tracing::info!(
        handle = %access.handle,
        accounts = friends.len(),
        path = %path.display(),
        "Outline artifact exported"
    );
    Ok(artifact_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ProviderClient {
        ProviderClient::new(
            server.uri(),
            SecretString::from("ck"),
            SecretString::from("cs"),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_export_writes_outline_and_registers_accounts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "access_secret": "as",
                "handle": "dana"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/friends/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [
                    {"handle": "alice", "display_name": "Alice", "homepage_url": "https://alice.example"},
                    {"handle": "nolink", "display_name": "No Homepage"}
                ],
                "next_cursor": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/direct_messages/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let dir = std::env::temp_dir().join(format!("gleaner-export-{}", std::process::id()));

        let url = export_outline(
            &db,
            &client(&server),
            &dir,
            "https://artifacts.example",
            "https://feeds.example",
            "rt",
            "v",
        )
        .await
        .unwrap();

        assert_eq!(url, "https://artifacts.example/opml/dana.opml");

        let xml = std::fs::read_to_string(dir.join("opml").join("dana.opml")).unwrap();
        assert!(xml.contains("https://alice.example"));
        assert!(xml.contains("https://feeds.example/xml/feed-alice.xml"));
        assert!(!xml.contains("No Homepage"));

        // alice was registered against the new credential
        let credential = db.get_credential_by_handle("dana").await.unwrap().unwrap();
        let accounts = db.accounts_for_credential(credential.id).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].handle, "alice");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_failed_direct_message_is_not_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "access_secret": "as",
                "handle": "erin"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/friends/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [],
                "next_cursor": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/direct_messages/new"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let dir = std::env::temp_dir().join(format!("gleaner-export-dm-{}", std::process::id()));

        let url = export_outline(
            &db,
            &client(&server),
            &dir,
            "https://artifacts.example/",
            "https://feeds.example/",
            "rt",
            "v",
        )
        .await
        .unwrap();
        assert_eq!(url, "https://artifacts.example/opml/erin.opml");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
