use anyhow::Result;

use super::schema::Database;
use super::types::PushTarget;

impl Database {
    /// Register a push target for an account (idempotent on token).
    pub async fn register_push_target(&self, account_id: i64, token: &str) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO push_targets (account_id, token)
            VALUES (?, ?)
            ON CONFLICT(token) DO NOTHING
        "#,
        )
        .bind(account_id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM push_targets WHERE token = ?")
            .bind(token)
            .fetch_one(&self.pool)
            .await?;

        Ok(id)
    }

    /// Active push targets across all accounts the credential follows.
    pub async fn active_targets_for_credential(
        &self,
        credential_id: i64,
    ) -> Result<Vec<PushTarget>> {
        let targets = sqlx::query_as::<_, PushTarget>(
            r#"
            SELECT p.id, p.account_id, p.token, p.active, p.details
            FROM push_targets p
            JOIN credential_accounts ca ON ca.account_id = p.account_id
            WHERE ca.credential_id = ? AND p.active = 1
            ORDER BY p.id
        "#,
        )
        .bind(credential_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(targets)
    }

    /// Cache the push provider's metadata blob for a target.
    pub async fn set_target_details(&self, target_id: i64, details: &str) -> Result<()> {
        sqlx::query("UPDATE push_targets SET details = ? WHERE id = ?")
            .bind(details)
            .bind(target_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Mark a target inactive. Targets are deactivated, never deleted.
    pub async fn deactivate_target(&self, target_id: i64) -> Result<()> {
        sqlx::query("UPDATE push_targets SET active = 0 WHERE id = ?")
            .bind(target_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_push_target(&self, target_id: i64) -> Result<Option<PushTarget>> {
        let target = sqlx::query_as::<_, PushTarget>(
            "SELECT id, account_id, token, active, details FROM push_targets WHERE id = ?",
        )
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(target)
    }
}
