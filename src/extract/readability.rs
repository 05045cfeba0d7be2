use serde::Deserialize;
use std::path::Path;

use super::enrich::ExtractError;

/// Structured output of the readability extraction subprocess.
///
/// The subprocess prints one JSON document on stdout: `title`, `content`
/// (cleaned HTML), `textContent` (plain text), and optional `excerpt` and
/// `byline`.
#[derive(Debug, Clone, Deserialize)]
pub struct Extraction {
    pub title: String,
    pub content: String,
    #[serde(rename = "textContent")]
    pub text_content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub byline: String,
}

/// Invoke the extraction subprocess with the URL as its argument.
///
/// Non-zero exit and empty stdout are expected-and-common outcomes
/// (paywalls, anti-bot pages); callers treat every error here as soft.
/// `kill_on_drop` guarantees the child dies when the enclosing job is
/// timed out and dropped.
pub async fn run_extractor(command: &Path, url: &str) -> Result<Extraction, ExtractError> {
    let output = tokio::process::Command::new(command)
        .arg(url)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(ExtractError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(
            url = %url,
            code = output.status.code(),
            stderr = %stderr.trim(),
            "Extractor exited non-zero"
        );
        return Err(ExtractError::ExtractorFailed(output.status.code()));
    }

    if output.stdout.is_empty() {
        return Err(ExtractError::EmptyOutput);
    }

    serde_json::from_slice(&output.stdout).map_err(|e| ExtractError::Malformed(e.to_string()))
}
