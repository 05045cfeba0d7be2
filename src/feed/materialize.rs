use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::path::Path;
use thiserror::Error;

use crate::storage::Database;
use crate::util::strip_illegal_xml_chars;

use super::artifact::write_artifact;
use super::atom::{FeedBuilder, FeedEntry};

/// Links first shared within this window make it into the feed.
const FEED_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Database error: {0}")]
    Store(String),
    #[error("Feed serialization failed: {0}")]
    Render(String),
    #[error("Failed to write feed artifact: {0}")]
    Io(String),
}

/// Materialize the entry-feed artifact for one credential.
///
/// Selects links shared by the credential's followed accounts within the
/// recency window and atomically replaces
/// `<out_dir>/feeds/<credential_id>-feed.xml`. An unknown credential or
/// an empty follow graph is a no-op, not an error.
pub async fn render_feed(
    db: &Database,
    web_base: &str,
    out_dir: &Path,
    credential_id: i64,
) -> Result<(), RenderError> {
    let credential = match db
        .get_credential(credential_id)
        .await
        .map_err(|e| RenderError::Store(e.to_string()))?
    {
        Some(credential) => credential,
        None => {
            tracing::debug!(credential_id, "Feed render for unknown credential, skipping");
            return Ok(());
        }
    };

    let accounts = db
        .accounts_for_credential(credential_id)
        .await
        .map_err(|e| RenderError::Store(e.to_string()))?;
    if accounts.is_empty() {
        tracing::debug!(handle = %credential.handle, "No followed accounts, skipping feed render");
        return Ok(());
    }

    let cutoff = (Utc::now() - ChronoDuration::hours(FEED_WINDOW_HOURS)).timestamp();
    let links = db
        .links_shared_since(credential_id, cutoff)
        .await
        .map_err(|e| RenderError::Store(e.to_string()))?;

    let profile_url = format!("{}/{}", web_base.trim_end_matches('/'), credential.handle);
    let mut builder = FeedBuilder::new(
        &profile_url,
        &credential.handle,
        &profile_url,
        "Links shared by people you follow",
    );

    // links_shared_since returns newest-shared-first
    for link in &links {
        let quoted = strip_illegal_xml_chars(&link.quoted_text);
        let cleaned = strip_illegal_xml_chars(link.cleaned_text.as_deref().unwrap_or(""));
        let published = Utc
            .timestamp_opt(link.first_shared, 0)
            .single()
            .unwrap_or_else(Utc::now);

        builder.push_entry(FeedEntry {
            id: link.url.clone(),
            title: link.url.clone(),
            author: link.sharers.clone(),
            published,
            content_html: format!("Quote: {}<br/>{}", quoted, cleaned),
        });
    }

    let xml = builder
        .render()
        .map_err(|e| RenderError::Render(e.to_string()))?;

    let path = out_dir
        .join("feeds")
        .join(format!("{}-feed.xml", credential_id));
    write_artifact(&path, xml.as_bytes()).map_err(|e| RenderError::Io(e.to_string()))?;

    tracing::info!(
        handle = %credential.handle,
        entries = links.len(),
        path = %path.display(),
        "Feed artifact updated"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let credential_id = db.upsert_credential("me", "t", "s").await.unwrap();
        let account = db.resolve_or_create_account("carol").await.unwrap();
        db.link_credential_account(credential_id, account.id)
            .await
            .unwrap();
        (db, credential_id, account.id)
    }

    #[tokio::test]
    async fn test_unknown_credential_is_noop() {
        let db = Database::open(":memory:").await.unwrap();
        let dir = std::env::temp_dir().join("gleaner-render-noop");

        render_feed(&db, "https://example.social", &dir, 999)
            .await
            .unwrap();
        assert!(!dir.join("feeds").join("999-feed.xml").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_renders_recent_links_with_control_chars_stripped() {
        let (db, credential_id, account_id) = setup().await;
        let now = Utc::now().timestamp();

        let link_id = db
            .resolve_or_create_link("https://example.com/a", "quote\u{0}with\u{B}controls", now)
            .await
            .unwrap();
        db.add_link_sharer(link_id, account_id).await.unwrap();
        db.set_embed_content(link_id, "clean\u{1F}body").await.unwrap();

        let dir = std::env::temp_dir().join(format!("gleaner-render-{}", std::process::id()));
        render_feed(&db, "https://example.social", &dir, credential_id)
            .await
            .unwrap();

        let path = dir.join("feeds").join(format!("{}-feed.xml", credential_id));
        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("https://example.com/a"));
        assert!(xml.contains("Quote: quotewithcontrols"));
        assert!(xml.contains("cleanbody"));
        assert!(!xml.contains('\u{0}'));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_stale_links_excluded() {
        let (db, credential_id, account_id) = setup().await;
        let two_days_ago = Utc::now().timestamp() - 2 * 24 * 3600;

        let link_id = db
            .resolve_or_create_link("https://example.com/stale", "", two_days_ago)
            .await
            .unwrap();
        db.add_link_sharer(link_id, account_id).await.unwrap();

        let dir = std::env::temp_dir().join(format!("gleaner-render-stale-{}", std::process::id()));
        render_feed(&db, "https://example.social", &dir, credential_id)
            .await
            .unwrap();

        let path = dir.join("feeds").join(format!("{}-feed.xml", credential_id));
        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(!xml.contains("https://example.com/stale"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
