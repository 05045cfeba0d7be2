use anyhow::Result;

use super::schema::Database;
use super::types::{NewPost, Post};

impl Database {
    /// Remote id of the newest stored post for an account, if any.
    ///
    /// This is the "since" cursor for incremental timeline fetches. The
    /// remote id is stored explicitly rather than derived from the post
    /// URL, so a provider URL-format change cannot break the cursor.
    pub async fn latest_remote_id(&self, account_id: i64) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT remote_id FROM posts
            WHERE account_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
        "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(remote_id,)| remote_id))
    }

    /// Insert a post unless one with the same URL already exists.
    ///
    /// Returns true if a row was inserted. The UNIQUE(url) constraint is
    /// the idempotency key: repeated syncs and concurrent units observing
    /// the same entry resolve to "already exists, skip".
    pub async fn insert_post(
        &self,
        account_id: i64,
        credential_id: i64,
        post: &NewPost,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO posts (account_id, credential_id, remote_id, body, created_at, url)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
        "#,
        )
        .bind(account_id)
        .bind(credential_id)
        .bind(&post.remote_id)
        .bind(&post.body)
        .bind(post.created_at)
        .bind(&post.url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All posts for an account, newest first.
    pub async fn posts_for_account(&self, account_id: i64) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, account_id, credential_id, remote_id, body, created_at, url, seen
            FROM posts
            WHERE account_id = ?
            ORDER BY created_at DESC, id DESC
        "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NewPost};

    fn post(remote_id: &str, created_at: i64) -> NewPost {
        NewPost {
            remote_id: remote_id.to_string(),
            body: format!("post {}", remote_id),
            created_at,
            url: format!("https://example.social/carol/status/{}", remote_id),
        }
    }

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let credential_id = db.upsert_credential("me", "t", "s").await.unwrap();
        let account = db.resolve_or_create_account("carol").await.unwrap();
        (db, credential_id, account.id)
    }

    #[tokio::test]
    async fn test_duplicate_url_not_inserted() {
        let (db, credential_id, account_id) = setup().await;

        assert!(db.insert_post(account_id, credential_id, &post("1", 100)).await.unwrap());
        assert!(!db.insert_post(account_id, credential_id, &post("1", 100)).await.unwrap());

        assert_eq!(db.posts_for_account(account_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_remote_id_tracks_newest() {
        let (db, credential_id, account_id) = setup().await;

        assert_eq!(db.latest_remote_id(account_id).await.unwrap(), None);

        db.insert_post(account_id, credential_id, &post("10", 100)).await.unwrap();
        db.insert_post(account_id, credential_id, &post("30", 300)).await.unwrap();
        db.insert_post(account_id, credential_id, &post("20", 200)).await.unwrap();

        assert_eq!(
            db.latest_remote_id(account_id).await.unwrap().as_deref(),
            Some("30")
        );
    }
}
