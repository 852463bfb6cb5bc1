use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Append one row to `audit_logs`. Callers treat this as best-effort: every
/// call site wraps the result in an `if let Err` and logs a warning instead of
/// failing the request, so a broken audit table never blocks a mutation.
///
/// `user_id` is None for anonymous actors, `resource` is usually the id of the
/// row touched, and `metadata` carries action-specific detail as jsonb.
pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, now())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}
