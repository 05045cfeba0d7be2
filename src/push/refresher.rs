use crate::storage::Database;

use super::client::{PushClient, TargetStatus};

/// Re-validate every active push target tied to a credential's followed
/// accounts and nudge the valid ones.
///
/// Expired registrations are marked inactive (never deleted). Every
/// failure here is soft: lookup errors skip the target, send failures are
/// logged, and nothing propagates to the caller.
pub async fn refresh_push_targets(db: &Database, push: &PushClient, credential_id: i64) {
    let credential = match db.get_credential(credential_id).await {
        Ok(Some(credential)) => credential,
        Ok(None) => {
            tracing::debug!(credential_id, "Push refresh for unknown credential, skipping");
            return;
        }
        Err(e) => {
            tracing::warn!(credential_id, error = %e, "Failed to load credential for push refresh");
            return;
        }
    };

    let targets = match db.active_targets_for_credential(credential_id).await {
        Ok(targets) => targets,
        Err(e) => {
            tracing::warn!(credential_id, error = %e, "Failed to load push targets");
            return;
        }
    };

    for target in targets {
        match push.lookup_target(&target.token).await {
            Ok(TargetStatus::Expired) => {
                tracing::info!(target_id = target.id, "Push registration expired, deactivating");
                if let Err(e) = db.deactivate_target(target.id).await {
                    tracing::warn!(target_id = target.id, error = %e, "Failed to deactivate push target");
                }
            }
            Ok(TargetStatus::Valid { details }) => {
                if let Err(e) = db.set_target_details(target.id, &details).await {
                    tracing::warn!(target_id = target.id, error = %e, "Failed to cache push target details");
                }

                let data = serde_json::json!({
                    "Title": "Updated your timeline.",
                    "credential": credential.handle,
                });
                if let Err(e) = push.send_data_message(&target.token, &data).await {
                    // Expected for stale-but-registered devices; the next
                    // refresh cycle tries again.
                    tracing::warn!(
                        target_id = target.id,
                        handle = %credential.handle,
                        error = %e,
                        "Failed to push timeline update"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(target_id = target.id, error = %e, "Push target lookup failed, skipping");
            }
        }
    }
}
