// src/services/pricing_service.rs

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CatalogRepository,
    models::catalog::Price,
    services::audit_service::{AuditRecord, AuditService},
};

#[derive(Clone)]
pub struct PricingService {
    repo: CatalogRepository,
    audit: AuditService,
}

impl PricingService {
    pub fn new(repo: CatalogRepository, audit: AuditService) -> Self {
        Self { repo, audit }
    }

    /// Preço em vigor para (artigo, entidade). Sem cache nem preço de recurso.
    pub async fn lookup<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        procedure_id: Uuid,
        entity_id: Uuid,
    ) -> Result<Price, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_price(executor, tenant_id, procedure_id, entity_id)
            .await?
            .ok_or(AppError::PriceNotDefined {
                procedure_id,
                entity_id,
            })
    }

    pub async fn upsert_price<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        procedure_id: Uuid,
        entity_id: Uuid,
        entity_price: Decimal,
        patient_price: Decimal,
    ) -> Result<Price, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let price = self
            .repo
            .upsert_price(executor, tenant_id, procedure_id, entity_id, entity_price, patient_price)
            .await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "UPSERT_PRICE", "price")
                .object(procedure_id)
                .details(json!({
                    "entityId": entity_id,
                    "entityPrice": entity_price,
                    "patientPrice": patient_price,
                })),
        );

        Ok(price)
    }

    pub async fn list_prices<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        entity_id: Option<Uuid>,
    ) -> Result<Vec<Price>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_prices(executor, tenant_id, entity_id).await
    }

    pub async fn update_price<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        procedure_id: Uuid,
        entity_id: Uuid,
        entity_price: Option<Decimal>,
        patient_price: Option<Decimal>,
    ) -> Result<Price, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let price = self
            .repo
            .update_price(executor, tenant_id, procedure_id, entity_id, entity_price, patient_price)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Preço".into()))?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "UPDATE_PRICE", "price")
                .object(procedure_id)
                .details(json!({
                    "entityId": entity_id,
                    "entityPrice": price.entity_price,
                    "patientPrice": price.patient_price,
                })),
        );

        Ok(price)
    }

    pub async fn delete_price<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        procedure_id: Uuid,
        entity_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let deleted = self
            .repo
            .delete_price(executor, tenant_id, procedure_id, entity_id)
            .await?;

        if !deleted {
            return Err(AppError::ResourceNotFound("Preço".into()));
        }

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "DELETE_PRICE", "price")
                .object(procedure_id)
                .details(json!({ "entityId": entity_id })),
        );

        Ok(())
    }
}
