use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::jobs::Job;
use crate::provider::{CredentialAuth, ProviderClient, ProviderError, TimelineEntry};
use crate::storage::{Credential, Database, NewPost};
use crate::util::{normalize_link_url, status_url};

/// Credential units share no mutable state beyond SQLite, so a batch can
/// run several in flight; this bounds the fan-out.
const MAX_CONCURRENT_CREDENTIALS: usize = 4;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No credential with id {0}")]
    CredentialNotFound(i64),
    #[error("Database error: {0}")]
    Store(String),
}

/// Per-batch outcome report.
///
/// Skips carry the credential handle and a human-readable reason so the
/// caller can log them; a skipped credential never fails the batch.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub credentials_synced: usize,
    pub credentials_skipped: Vec<(String, String)>,
    pub posts_added: usize,
    pub links_discovered: usize,
}

/// Counters accumulated by one credential's sync unit.
#[derive(Debug, Default)]
struct UnitStats {
    posts_added: usize,
    links_discovered: usize,
}

/// Synchronize follow-graph timelines for one credential or all of them.
///
/// Each credential is an independent unit: a rejected access pair or a
/// provider failure mid-unit records a skip and moves on. Units run with
/// bounded concurrency across credentials; within a unit, accounts are
/// processed sequentially. New posts and links are deduped by URL,
/// checkpoints advance monotonically, and one Enrich job is submitted per
/// newly attached link. A completed unit submits RenderFeed and
/// RefreshPush jobs for its credential.
pub async fn sync_accounts(
    db: &Database,
    provider: &ProviderClient,
    web_base: &str,
    jobs: &mpsc::Sender<Job>,
    credential_id: Option<i64>,
) -> Result<SyncSummary, SyncError> {
    let credentials = match credential_id {
        Some(id) => {
            let credential = db
                .get_credential(id)
                .await
                .map_err(|e| SyncError::Store(e.to_string()))?
                .ok_or(SyncError::CredentialNotFound(id))?;
            vec![credential]
        }
        None => db
            .all_credentials()
            .await
            .map_err(|e| SyncError::Store(e.to_string()))?,
    };

    let outcomes: Vec<(Credential, Result<UnitStats, ProviderError>)> =
        stream::iter(credentials)
            .map(|credential| async move {
                let result = sync_credential(db, provider, web_base, jobs, &credential).await;
                (credential, result)
            })
            .buffer_unordered(MAX_CONCURRENT_CREDENTIALS)
            .collect()
            .await;

    let mut summary = SyncSummary::default();
    for (credential, result) in outcomes {
        match result {
            Ok(stats) => {
                summary.credentials_synced += 1;
                summary.posts_added += stats.posts_added;
                summary.links_discovered += stats.links_discovered;
                submit(jobs, Job::RenderFeed { credential_id: credential.id }).await;
                submit(jobs, Job::RefreshPush { credential_id: credential.id }).await;
            }
            Err(error) => {
                tracing::warn!(handle = %credential.handle, %error, "Credential sync skipped");
                summary
                    .credentials_skipped
                    .push((credential.handle, error.to_string()));
            }
        }
    }

    tracing::info!(
        synced = summary.credentials_synced,
        skipped = summary.credentials_skipped.len(),
        posts = summary.posts_added,
        links = summary.links_discovered,
        "Sync batch complete"
    );
    Ok(summary)
}

/// One credential's sync unit. Any `ProviderError` aborts the unit.
async fn sync_credential(
    db: &Database,
    provider: &ProviderClient,
    web_base: &str,
    jobs: &mpsc::Sender<Job>,
    credential: &Credential,
) -> Result<UnitStats, ProviderError> {
    let auth = CredentialAuth {
        access_token: credential.access_token.clone(),
        access_secret: credential.access_secret.clone(),
    };
    let mut stats = UnitStats::default();

    provider.verify_credentials(&auth).await?;

    for friend in provider.friends(&auth).await? {
        // Placeholder and bot rows come through with blank fields.
        if friend.handle.is_empty() || friend.display_name.is_empty() {
            continue;
        }

        let account = match db.resolve_or_create_account(&friend.handle).await {
            Ok(account) => account,
            Err(error) => {
                tracing::warn!(handle = %friend.handle, %error, "Failed to resolve account");
                continue;
            }
        };
        if let Err(error) = db.link_credential_account(credential.id, account.id).await {
            tracing::warn!(handle = %friend.handle, %error, "Failed to link account");
            continue;
        }

        let since = match db.latest_remote_id(account.id).await {
            Ok(since) => since,
            Err(error) => {
                tracing::warn!(handle = %friend.handle, %error, "Failed to read cursor");
                continue;
            }
        };

        let entries = provider
            .user_timeline(&auth, &friend.handle, since.as_deref())
            .await?;

        let own: Vec<&TimelineEntry> = entries
            .iter()
            .filter(|entry| entry.author.handle == friend.handle)
            .collect();

        // Fast path: nothing newer than the checkpoint.
        let newest = own
            .iter()
            .map(|entry| entry.created_at.timestamp())
            .max()
            .unwrap_or(i64::MIN);
        if newest <= account.last_updated {
            tracing::debug!(handle = %friend.handle, "Timeline unchanged, skipping");
            continue;
        }

        let mut checkpoint = account.last_updated;
        for entry in own {
            let created = entry.created_at.timestamp();
            checkpoint = checkpoint.max(created);

            let post_url = status_url(web_base, &friend.handle, &entry.id);
            let body = rewrite_truncated_share(entry);

            let inserted = match db
                .insert_post(
                    account.id,
                    credential.id,
                    &NewPost {
                        remote_id: entry.id.clone(),
                        body: body.clone(),
                        created_at: created,
                        url: post_url.clone(),
                    },
                )
                .await
            {
                Ok(inserted) => inserted,
                Err(error) => {
                    tracing::warn!(url = %post_url, %error, "Failed to store post");
                    continue;
                }
            };
            if !inserted {
                continue;
            }
            stats.posts_added += 1;

            for link in &entry.links {
                if is_self_referential(&link.expanded_url, &post_url, web_base) {
                    continue;
                }
                let url = match normalize_link_url(&link.expanded_url) {
                    Ok(url) => url,
                    Err(error) => {
                        tracing::debug!(url = %link.expanded_url, %error, "Dropping link");
                        continue;
                    }
                };

                let link_id = match db.resolve_or_create_link(&url, &body, created).await {
                    Ok(id) => id,
                    Err(error) => {
                        tracing::warn!(url = %url, %error, "Failed to store link");
                        continue;
                    }
                };
                if let Err(error) = db.add_link_sharer(link_id, account.id).await {
                    tracing::warn!(url = %url, %error, "Failed to attach sharer");
                    continue;
                }
                stats.links_discovered += 1;
                submit(jobs, Job::Enrich { link_id }).await;
            }
        }

        if let Err(error) = db.advance_checkpoint(account.id, checkpoint).await {
            tracing::warn!(handle = %friend.handle, %error, "Failed to advance checkpoint");
        }
    }

    Ok(stats)
}

/// A truncated share carries the original inline; persist the original
/// prefixed with its author instead of the cut-off text.
fn rewrite_truncated_share(entry: &TimelineEntry) -> String {
    if let Some(source) = &entry.shared_from {
        if entry.text.ends_with('\u{2026}') {
            return format!("{}: {}", source.author_handle, source.text);
        }
    }
    entry.text.clone()
}

/// Links back to the post itself (or its provider-internal permalink
/// form) carry no content worth enriching.
fn is_self_referential(link_url: &str, post_url: &str, web_base: &str) -> bool {
    if link_url == post_url {
        return true;
    }
    let internal_prefix = format!("{}/i/web/status/", web_base.trim_end_matches('/'));
    link_url.starts_with(&internal_prefix)
}

async fn submit(jobs: &mpsc::Sender<Job>, job: Job) {
    if let Err(error) = jobs.send(job).await {
        tracing::warn!(%error, "Job channel closed, dropping job");
    }
}
