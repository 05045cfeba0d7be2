use anyhow::Result;

use super::schema::Database;
use super::types::{FeedLink, SharedLink};

impl Database {
    /// Resolve a shared link by URL, creating it on first sight.
    ///
    /// Dedup is strictly URL-keyed: the same URL shared with different
    /// quote text or at a different time accumulates sharers on the one
    /// existing row rather than creating a duplicate. Returns the row id.
    pub async fn resolve_or_create_link(
        &self,
        url: &str,
        quoted_text: &str,
        first_shared: i64,
    ) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO links (url, quoted_text, first_shared)
            VALUES (?, ?, ?)
            ON CONFLICT(url) DO NOTHING
        "#,
        )
        .bind(url)
        .bind(quoted_text)
        .bind(first_shared)
        .execute(&self.pool)
        .await?;

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM links WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    /// Record that an account shared a link (idempotent).
    pub async fn add_link_sharer(&self, link_id: i64, account_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO link_sharers (link_id, account_id)
            VALUES (?, ?)
            ON CONFLICT(link_id, account_id) DO NOTHING
        "#,
        )
        .bind(link_id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_link(&self, id: i64) -> Result<Option<SharedLink>> {
        let link = sqlx::query_as::<_, SharedLink>(
            r#"
            SELECT id, url, quoted_text, first_shared, seen,
                   cleaned_text, title, excerpt, byline
            FROM links
            WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    pub async fn get_link_by_url(&self, url: &str) -> Result<Option<SharedLink>> {
        let link = sqlx::query_as::<_, SharedLink>(
            r#"
            SELECT id, url, quoted_text, first_shared, seen,
                   cleaned_text, title, excerpt, byline
            FROM links
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    /// Store oEmbed markup as the link's cleaned content.
    pub async fn set_embed_content(&self, link_id: i64, html: &str) -> Result<()> {
        sqlx::query("UPDATE links SET cleaned_text = ? WHERE id = ?")
            .bind(html)
            .bind(link_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Store the readability extractor's output on the link.
    pub async fn set_extracted_content(
        &self,
        link_id: i64,
        cleaned_text: &str,
        title: &str,
        excerpt: &str,
        byline: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE links
            SET cleaned_text = ?, title = ?, excerpt = ?, byline = ?
            WHERE id = ?
        "#,
        )
        .bind(cleaned_text)
        .bind(title)
        .bind(excerpt)
        .bind(byline)
        .bind(link_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Links first shared since `since` by any account the credential
    /// follows, newest first, with sharer handles comma-joined.
    ///
    /// Feeds the materializer; the window cutoff is the caller's policy.
    pub async fn links_shared_since(
        &self,
        credential_id: i64,
        since: i64,
    ) -> Result<Vec<FeedLink>> {
        let links = sqlx::query_as::<_, FeedLink>(
            r#"
            SELECT l.url, l.quoted_text, l.first_shared, l.cleaned_text,
                   GROUP_CONCAT(a.handle, ', ') AS sharers
            FROM links l
            JOIN link_sharers ls ON ls.link_id = l.id
            JOIN accounts a ON a.id = ls.account_id
            WHERE l.first_shared >= ?
              AND ls.account_id IN (
                  SELECT account_id FROM credential_accounts WHERE credential_id = ?
              )
            GROUP BY l.id
            ORDER BY l.first_shared DESC, l.id DESC
        "#,
        )
        .bind(since)
        .bind(credential_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    /// Number of accounts recorded as sharers of a link.
    pub async fn sharer_count(&self, link_id: i64) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM link_sharers WHERE link_id = ?")
                .bind(link_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    #[tokio::test]
    async fn test_url_dedup_accumulates_sharers() {
        let db = Database::open(":memory:").await.unwrap();
        let a = db.resolve_or_create_account("a").await.unwrap();
        let b = db.resolve_or_create_account("b").await.unwrap();

        let id1 = db
            .resolve_or_create_link("https://example.com/x", "quote one", 100)
            .await
            .unwrap();
        let id2 = db
            .resolve_or_create_link("https://example.com/x", "different quote", 200)
            .await
            .unwrap();
        assert_eq!(id1, id2);

        db.add_link_sharer(id1, a.id).await.unwrap();
        db.add_link_sharer(id1, b.id).await.unwrap();
        db.add_link_sharer(id1, b.id).await.unwrap();
        assert_eq!(db.sharer_count(id1).await.unwrap(), 2);

        // First-shared time and quote text stay from the first sighting
        let link = db.get_link(id1).await.unwrap().unwrap();
        assert_eq!(link.first_shared, 100);
        assert_eq!(link.quoted_text, "quote one");
    }

    #[tokio::test]
    async fn test_window_query_scopes_to_credential() {
        let db = Database::open(":memory:").await.unwrap();
        let credential_id = db.upsert_credential("me", "t", "s").await.unwrap();
        let followed = db.resolve_or_create_account("followed").await.unwrap();
        let stranger = db.resolve_or_create_account("stranger").await.unwrap();
        db.link_credential_account(credential_id, followed.id)
            .await
            .unwrap();

        let in_window = db
            .resolve_or_create_link("https://example.com/in", "", 1_000)
            .await
            .unwrap();
        db.add_link_sharer(in_window, followed.id).await.unwrap();

        let too_old = db
            .resolve_or_create_link("https://example.com/old", "", 10)
            .await
            .unwrap();
        db.add_link_sharer(too_old, followed.id).await.unwrap();

        let not_followed = db
            .resolve_or_create_link("https://example.com/other", "", 1_000)
            .await
            .unwrap();
        db.add_link_sharer(not_followed, stranger.id).await.unwrap();

        let links = db.links_shared_since(credential_id, 500).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://example.com/in");
        assert_eq!(links[0].sharers, "followed");
    }
}
