use anyhow::Result;

use super::schema::Database;
use super::types::Credential;

impl Database {
    /// Create or refresh a credential, returning its id.
    ///
    /// The handle is globally unique; repeated exchanges for the same
    /// identity refresh the stored access pair in place.
    pub async fn upsert_credential(
        &self,
        handle: &str,
        access_token: &str,
        access_secret: &str,
    ) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO credentials (handle, access_token, access_secret)
            VALUES (?, ?, ?)
            ON CONFLICT(handle) DO UPDATE SET
                access_token = excluded.access_token,
                access_secret = excluded.access_secret
            RETURNING id
        "#,
        )
        .bind(handle)
        .bind(access_token)
        .bind(access_secret)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get_credential(&self, id: i64) -> Result<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT id, handle, access_token, access_secret FROM credentials WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    pub async fn get_credential_by_handle(&self, handle: &str) -> Result<Option<Credential>> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT id, handle, access_token, access_secret FROM credentials WHERE handle = ?",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    /// All credentials, in stable id order (batch sync iterates this).
    pub async fn all_credentials(&self) -> Result<Vec<Credential>> {
        let credentials = sqlx::query_as::<_, Credential>(
            "SELECT id, handle, access_token, access_secret FROM credentials ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(credentials)
    }
}
