use sqlx::SqliteConnection;

use crate::{db_types::NewAuditEvent, traits::ReconciliationError};

pub async fn append(event: NewAuditEvent, conn: &mut SqliteConnection) -> Result<(), ReconciliationError> {
    sqlx::query(
        r#"
            INSERT INTO audit_log (actor_id, action, resource_type, resource_id, details, ip, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7);
        "#,
    )
    .bind(event.actor_id)
    .bind(event.action)
    .bind(event.resource_type)
    .bind(event.resource_id)
    .bind(event.details.to_string())
    .bind(event.ip)
    .bind(event.user_agent)
    .execute(conn)
    .await?;
    Ok(())
}
