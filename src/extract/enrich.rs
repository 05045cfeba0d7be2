use std::path::PathBuf;
use thiserror::Error;

use crate::provider::ProviderClient;
use crate::storage::Database;

use super::readability::run_extractor;

/// Content-extraction failures. All of them are soft: the job worker
/// logs, the link stays unenriched, and no retry is scheduled.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to spawn extractor: {0}")]
    Spawn(std::io::Error),
    #[error("Extractor exited with code {0:?}")]
    ExtractorFailed(Option<i32>),
    #[error("Extractor produced no output")]
    EmptyOutput,
    #[error("Unparseable extractor output: {0}")]
    Malformed(String),
    #[error("Embed lookup failed: {0}")]
    Embed(#[from] crate::provider::ProviderError),
    #[error("Failed to store extracted content: {0}")]
    Store(String),
}

/// Enriches shared links with cleaned article content.
///
/// Two strategies: known social-post URLs go through the provider's embed
/// lookup; everything else runs the readability subprocess. The hard
/// per-job timeout is applied by the dispatch site, not here.
#[derive(Clone)]
pub struct Enricher {
    db: Database,
    provider: ProviderClient,
    extractor_command: PathBuf,
    /// URL prefix identifying posts on the provider itself.
    status_url_prefix: String,
}

impl Enricher {
    pub fn new(
        db: Database,
        provider: ProviderClient,
        extractor_command: PathBuf,
        provider_web_url: &str,
    ) -> Self {
        Self {
            db,
            provider,
            extractor_command,
            status_url_prefix: format!("{}/", provider_web_url.trim_end_matches('/')),
        }
    }

    /// Fetch and store cleaned content for one link.
    ///
    /// A missing link id and a failed embed lookup both leave the link
    /// unenriched without an error; extraction failures surface as
    /// `ExtractError` so the worker can log them.
    pub async fn enrich(&self, link_id: i64) -> Result<(), ExtractError> {
        let link = match self
            .db
            .get_link(link_id)
            .await
            .map_err(|e| ExtractError::Store(e.to_string()))?
        {
            Some(link) => link,
            None => {
                tracing::debug!(link_id, "Enrich requested for unknown link, skipping");
                return Ok(());
            }
        };

        if link.url.starts_with(&self.status_url_prefix) {
            match self.provider.oembed(&link.url).await? {
                Some(html) => {
                    self.db
                        .set_embed_content(link_id, &html)
                        .await
                        .map_err(|e| ExtractError::Store(e.to_string()))?;
                    tracing::debug!(link_id, url = %link.url, "Stored embed markup");
                }
                None => {
                    // Deleted or protected post; leave the link as-is.
                    tracing::debug!(link_id, url = %link.url, "Embed lookup empty, link left unenriched");
                }
            }
            return Ok(());
        }

        let extraction = run_extractor(&self.extractor_command, &link.url).await?;
        self.db
            .set_extracted_content(
                link_id,
                &extraction.content,
                extraction.title.trim(),
                &extraction.excerpt,
                &extraction.byline,
            )
            .await
            .map_err(|e| ExtractError::Store(e.to_string()))?;

        tracing::debug!(link_id, url = %link.url, title = %extraction.title.trim(), "Stored extracted content");
        Ok(())
    }
}
