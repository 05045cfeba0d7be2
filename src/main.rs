use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

use gleaner::config::Config;
use gleaner::extract::Enricher;
use gleaner::feed::{export_outline, render_feed};
use gleaner::jobs::{run_worker, JobContext};
use gleaner::provider::ProviderClient;
use gleaner::push::{refresh_push_targets, PushClient};
use gleaner::storage::Database;
use gleaner::sync::sync_accounts;

/// Get the config directory path (~/.config/gleaner/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("gleaner"))
}

#[derive(Parser, Debug)]
#[command(name = "gleaner", about = "Syncs social timelines into deduped link feeds")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync follow-graph timelines for all credentials, or just one
    Sync {
        #[arg(long)]
        credential_id: Option<i64>,
    },
    /// Re-materialize the feed artifact for one credential
    RenderFeed { credential_id: i64 },
    /// Complete a token exchange and export the outline-of-feeds
    ExportOutline {
        request_token: String,
        verifier: String,
        /// Host under which per-account feed URLs are served;
        /// defaults to the artifact base URL
        #[arg(long)]
        host_uri: Option<String>,
    },
    /// Refresh push targets for one credential
    RefreshPush { credential_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config = Config::load(&config_dir.join("config.toml"))?;
    let out_dir = config.resolved_output_dir(&config_dir);

    let db_path = config_dir.join("gleaner.db");
    let db = Database::open(
        db_path
            .to_str()
            .context("Config directory path is not valid UTF-8")?,
    )
    .await
    .context("Failed to open database")?;

    let consumer_key = config
        .consumer_key
        .clone()
        .context("consumer_key not configured (config.toml or GLEANER_CONSUMER_KEY)")?;
    let consumer_secret = config
        .consumer_secret
        .clone()
        .context("consumer_secret not configured (config.toml or GLEANER_CONSUMER_SECRET)")?;
    let provider = ProviderClient::new(
        config.provider_api_url.clone(),
        SecretString::from(consumer_key),
        SecretString::from(consumer_secret),
        Duration::from_secs(config.provider_timeout_secs),
    );

    let push = PushClient::new(
        config.push_api_url.clone(),
        SecretString::from(config.push_api_key.clone().unwrap_or_default()),
        Duration::from_secs(config.provider_timeout_secs),
    );

    let enricher = Enricher::new(
        db.clone(),
        provider.clone(),
        config.extractor_command.clone(),
        &config.provider_web_url,
    );

    let (jobs_tx, jobs_rx) = mpsc::channel(256);
    let worker = tokio::spawn(run_worker(
        JobContext {
            db: db.clone(),
            enricher,
            push: push.clone(),
            web_base: config.provider_web_url.clone(),
            out_dir: out_dir.clone(),
            enrich_timeout: Duration::from_secs(config.enrich_timeout_secs),
        },
        jobs_rx,
    ));

    match args.command {
        Command::Sync { credential_id } => {
            let summary = sync_accounts(
                &db,
                &provider,
                &config.provider_web_url,
                &jobs_tx,
                credential_id,
            )
            .await?;
            println!(
                "Synced {} credential(s): {} new post(s), {} shared link(s)",
                summary.credentials_synced, summary.posts_added, summary.links_discovered
            );
            for (handle, reason) in &summary.credentials_skipped {
                println!("Skipped {}: {}", handle, reason);
            }
        }
        Command::RenderFeed { credential_id } => {
            render_feed(&db, &config.provider_web_url, &out_dir, credential_id).await?;
            println!(
                "Feed written to {}",
                out_dir
                    .join("feeds")
                    .join(format!("{}-feed.xml", credential_id))
                    .display()
            );
        }
        Command::ExportOutline {
            request_token,
            verifier,
            host_uri,
        } => {
            let host = host_uri.unwrap_or_else(|| config.artifact_base_url.clone());
            let url = export_outline(
                &db,
                &provider,
                &out_dir,
                &config.artifact_base_url,
                &host,
                &request_token,
                &verifier,
            )
            .await?;
            println!("{}", url);
        }
        Command::RefreshPush { credential_id } => {
            refresh_push_targets(&db, &push, credential_id).await;
        }
    }

    // Closing the channel lets the worker drain submitted jobs and exit.
    drop(jobs_tx);
    worker.await.context("Job worker panicked")?;

    Ok(())
}
