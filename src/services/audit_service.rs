// src/services/audit_service.rs

use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::AuditRepository,
    models::audit::{AuditEntry, AuditFilter},
};

// Registo de auditoria "dispara e esquece": falhas vão para o log, nunca para o cliente.
#[derive(Clone)]
pub struct AuditService {
    repo: AuditRepository,
    pool: PgPool,
}

// Um evento de auditoria, montado pelos serviços depois de cada alteração
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub action: &'static str,
    pub object_type: &'static str,
    pub object_id: Option<Uuid>,
    pub details: Option<Value>,
}

impl AuditRecord {
    pub fn new(tenant_id: Uuid, actor_id: Uuid, action: &'static str, object_type: &'static str) -> Self {
        Self {
            tenant_id,
            actor_id,
            action,
            object_type,
            object_id: None,
            details: None,
        }
    }

    pub fn object(mut self, object_id: Uuid) -> Self {
        self.object_id = Some(object_id);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl AuditService {
    pub fn new(repo: AuditRepository, pool: PgPool) -> Self {
        Self { repo, pool }
    }

    /// Grava em segundo plano, fora da transação do pedido.
    pub fn record(&self, record: AuditRecord) {
        let repo = self.repo.clone();
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let result = repo
                .insert(
                    &pool,
                    record.tenant_id,
                    record.actor_id,
                    record.action,
                    record.object_type,
                    record.object_id,
                    record.details.as_ref(),
                )
                .await;

            if let Err(e) = result {
                tracing::warn!(
                    "⚠️ Falha ao gravar auditoria {} {:?}: {}",
                    record.action,
                    record.object_id,
                    e
                );
            }
        });
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .list(executor, tenant_id, filter.object_type.as_deref(), filter.limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_builder_fills_optional_parts() {
        let tenant = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let object = Uuid::new_v4();

        let record = AuditRecord::new(tenant, actor, "CLOSE_SESSION", "cash_session")
            .object(object)
            .details(json!({ "closingFloat": "160.00" }));

        assert_eq!(record.object_id, Some(object));
        assert_eq!(record.details.unwrap()["closingFloat"], "160.00");
        assert_eq!(record.action, "CLOSE_SESSION");
    }
}
