//! Append-only audit log.

use chrono::{DateTime, Utc};
use local_market_core::order::Actor;
use sqlx::PgConnection;

use super::RepositoryError;

/// One audit entry to append.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub actor: &'a Actor,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub action: String,
    pub payload: serde_json::Value,
}

/// Append an audit entry inside the transaction of the audited change.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record(
    conn: &mut PgConnection,
    entry: &AuditEntry<'_>,
    at: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO audit_logs (actor_type, actor_id, entity_type, entity_id, action, payload,
             created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.actor.kind)
    .bind(&entry.actor.id)
    .bind(entry.entity_type)
    .bind(&entry.entity_id)
    .bind(&entry.action)
    .bind(&entry.payload)
    .bind(at)
    .execute(conn)
    .await?;
    Ok(())
}
