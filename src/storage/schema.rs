use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StoreError;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InstanceLocked` if another process has the
    /// database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `StoreError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY. Handles transient contention between
        // concurrent sync units automatically. Using pragma() ensures all
        // connections in the pool inherit the setting.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StoreError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // SQLite is single-writer; 5 connections covers concurrent sync units
        // plus enrichment jobs reading link rows.
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StoreError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            let error_string = e.to_string().to_lowercase();
            if error_string.contains("database is locked")
                || error_string.contains("database table is locked")
                || error_string.contains("sqlite_busy")
                || error_string.contains("sqlite_locked")
            {
                StoreError::InstanceLocked
            } else {
                StoreError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All schema changes are wrapped in a single transaction so a failure
    /// mid-migration leaves the database in its previous consistent state.
    /// Every statement uses `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    ///
    /// The UNIQUE constraints declared here are load-bearing: post URL,
    /// credential handle, account handle, link URL, and the two m2m pairs
    /// are the dedup keys that make concurrent resolve-or-create safe.
    async fn migrate(&self) -> Result<()> {
        // Enable foreign keys (must be outside transaction, per-connection setting)
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await?;

        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id INTEGER PRIMARY KEY,
                handle TEXT UNIQUE NOT NULL,
                access_token TEXT NOT NULL,
                access_secret TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                handle TEXT UNIQUE NOT NULL,
                last_updated INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credential_accounts (
                credential_id INTEGER NOT NULL REFERENCES credentials(id) ON DELETE CASCADE,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                UNIQUE(credential_id, account_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                credential_id INTEGER NOT NULL REFERENCES credentials(id),
                remote_id TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                url TEXT UNIQUE NOT NULL,
                seen INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY,
                url TEXT UNIQUE NOT NULL,
                quoted_text TEXT NOT NULL DEFAULT '',
                first_shared INTEGER NOT NULL,
                seen INTEGER NOT NULL DEFAULT 0,
                cleaned_text TEXT,
                title TEXT,
                excerpt TEXT,
                byline TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS link_sharers (
                link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                UNIQUE(link_id, account_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS push_targets (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                token TEXT UNIQUE NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                details TEXT
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Incremental-fetch cursor lookup: newest post per account
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_account_created ON posts(account_id, created_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // Feed materialization window scan
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_links_first_shared ON links(first_shared DESC)",
        )
        .execute(&mut *tx)
        .await?;

        // Sharer join in the feed query
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_link_sharers_account ON link_sharers(account_id)",
        )
        .execute(&mut *tx)
        .await?;

        // Active-target scan in the cache refresher
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_push_targets_account ON push_targets(account_id, active)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}
