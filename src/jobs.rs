use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::extract::Enricher;
use crate::feed::render_feed;
use crate::push::{refresh_push_targets, PushClient};
use crate::storage::Database;

/// Fire-and-forget work submitted by the sync pipeline.
///
/// Submission never waits for completion and never learns the outcome;
/// every job failure is logged by the worker and otherwise dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Fetch and store cleaned content for a newly discovered link.
    Enrich { link_id: i64 },
    /// Re-materialize a credential's feed artifact.
    RenderFeed { credential_id: i64 },
    /// Refresh the credential's push targets.
    RefreshPush { credential_id: i64 },
}

/// Everything the job worker needs to execute any job.
pub struct JobContext {
    pub db: Database,
    pub enricher: Enricher,
    pub push: PushClient,
    /// Provider web base, used as the feed's profile-URL prefix.
    pub web_base: String,
    pub out_dir: PathBuf,
    /// Hard bound on a single enrichment, subprocess included.
    pub enrich_timeout: Duration,
}

/// Consume jobs until the channel closes, then drain in-flight work.
///
/// Enrich jobs are spawned under a hard timeout so one slow extraction
/// never holds up feed renders or push refreshes behind it.
pub async fn run_worker(ctx: JobContext, mut jobs: mpsc::Receiver<Job>) {
    let mut inflight = JoinSet::new();

    while let Some(job) = jobs.recv().await {
        match job {
            Job::Enrich { link_id } => {
                let enricher = ctx.enricher.clone();
                let timeout = ctx.enrich_timeout;
                inflight.spawn(async move {
                    match tokio::time::timeout(timeout, enricher.enrich(link_id)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => {
                            tracing::warn!(link_id, %error, "Link enrichment failed");
                        }
                        Err(_) => {
                            tracing::warn!(link_id, "Link enrichment timed out");
                        }
                    }
                });
            }
            Job::RenderFeed { credential_id } => {
                if let Err(error) =
                    render_feed(&ctx.db, &ctx.web_base, &ctx.out_dir, credential_id).await
                {
                    tracing::error!(credential_id, %error, "Feed render failed");
                }
            }
            Job::RefreshPush { credential_id } => {
                refresh_push_targets(&ctx.db, &ctx.push, credential_id).await;
            }
        }

        // Reap finished enrichments as we go.
        while inflight.try_join_next().is_some() {}
    }

    while inflight.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderClient;
    use chrono::Utc;
    use secrecy::SecretString;

    fn context(db: Database, out_dir: PathBuf) -> JobContext {
        let provider = ProviderClient::new(
            "http://127.0.0.1:1",
            SecretString::from("ck"),
            SecretString::from("cs"),
            Duration::from_secs(1),
        );
        JobContext {
            db: db.clone(),
            enricher: Enricher::new(
                db,
                provider,
                PathBuf::from("/nonexistent"),
                "https://example.social",
            ),
            push: PushClient::new(
                "http://127.0.0.1:1",
                SecretString::from("pk"),
                Duration::from_secs(1),
            ),
            web_base: "https://example.social".to_string(),
            out_dir,
            enrich_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_worker_drains_and_exits_on_channel_close() {
        let db = Database::open(":memory:").await.unwrap();
        let credential_id = db.upsert_credential("me", "t", "s").await.unwrap();
        let account = db.resolve_or_create_account("carol").await.unwrap();
        db.link_credential_account(credential_id, account.id)
            .await
            .unwrap();
        let link_id = db
            .resolve_or_create_link("https://example.com/a", "q", Utc::now().timestamp())
            .await
            .unwrap();
        db.add_link_sharer(link_id, account.id).await.unwrap();

        let out_dir =
            std::env::temp_dir().join(format!("gleaner-jobs-{}", std::process::id()));
        let (tx, rx) = mpsc::channel(8);
        let worker = tokio::spawn(run_worker(context(db, out_dir.clone()), rx));

        // A failing enrich (unreachable extractor), a render, and a push
        // refresh with no targets: none of them may sink the worker.
        tx.send(Job::Enrich { link_id }).await.unwrap();
        tx.send(Job::RenderFeed { credential_id }).await.unwrap();
        tx.send(Job::RefreshPush { credential_id }).await.unwrap();
        drop(tx);

        worker.await.unwrap();

        assert!(out_dir
            .join("feeds")
            .join(format!("{}-feed.xml", credential_id))
            .exists());

        let _ = std::fs::remove_dir_all(&out_dir);
    }
}
