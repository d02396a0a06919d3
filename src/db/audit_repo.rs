// src/db/audit_repo.rs

use serde_json::Value;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::audit::AuditEntry};

const DEFAULT_LIST_LIMIT: i64 = 200;

#[derive(Clone, Default)]
pub struct AuditRepository;

impl AuditRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        action: &str,
        object_type: &str,
        object_id: Option<Uuid>,
        details: Option<&Value>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO audit_log (tenant_id, actor_id, action, object_type, object_id, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(tenant_id)
        .bind(actor_id)
        .bind(action)
        .bind(object_type)
        .bind(object_id)
        .bind(details)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        object_type: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<AuditEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT * FROM audit_log
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR object_type = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(object_type)
        .bind(limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }
}
