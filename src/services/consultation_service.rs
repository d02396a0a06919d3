// src/services/consultation_service.rs

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{consultation_repo::NewConsultationItem, ConsultationRepository},
    models::consultation::{
        Consultation, ConsultationDetail, ConsultationFilter, ConsultationItem, ConsultationStatus,
    },
    services::{
        audit_service::{AuditRecord, AuditService},
        catalog_service::CatalogService,
        events::{DomainEvent, EventDispatcher},
        pricing_service::PricingService,
    },
};

/// Hora de fim a gravar: concluir fecha a consulta se ainda estiver aberta.
fn ended_at_for(
    status: ConsultationStatus,
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (status, current) {
        (ConsultationStatus::Completed, None) => Some(now),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ConsultationService {
    repo: ConsultationRepository,
    catalog: CatalogService,
    pricing: PricingService,
    events: EventDispatcher,
    audit: AuditService,
}

impl ConsultationService {
    pub fn new(
        repo: ConsultationRepository,
        catalog: CatalogService,
        pricing: PricingService,
        events: EventDispatcher,
        audit: AuditService,
    ) -> Self {
        Self {
            repo,
            catalog,
            pricing,
            events,
            audit,
        }
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        patient_id: Uuid,
        entity_id: Uuid,
        doctor_id: Option<Uuid>,
        notes: Option<&str>,
    ) -> Result<Consultation, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.catalog.get_patient(&mut *tx, tenant_id, patient_id).await?;
        self.catalog.get_entity(&mut *tx, tenant_id, entity_id).await?;

        let consultation = self
            .repo
            .create(&mut *tx, tenant_id, patient_id, entity_id, doctor_id, notes)
            .await?;

        // Derivação do plano de tratamento, na mesma transação
        self.events
            .dispatch(
                &mut *tx,
                DomainEvent::ConsultationCreated {
                    tenant_id,
                    consultation_id: consultation.id,
                    patient_id,
                },
            )
            .await?;

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "CREATE_CONSULTATION", "consultation")
                .object(consultation.id)
                .details(json!({ "patientId": patient_id })),
        );

        Ok(consultation)
    }

    pub async fn get<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        consultation_id: Uuid,
    ) -> Result<ConsultationDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let header = self
            .repo
            .find(&mut *conn, tenant_id, consultation_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Consulta".into()))?;
        let items = self.repo.list_items(&mut *conn, tenant_id, consultation_id).await?;

        Ok(ConsultationDetail { header, items })
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &ConsultationFilter,
    ) -> Result<Vec<Consultation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list(executor, tenant_id, filter).await
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        consultation_id: Uuid,
        status: Option<ConsultationStatus>,
        notes: Option<&str>,
    ) -> Result<Consultation, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let current = self
            .repo
            .find(&mut *tx, tenant_id, consultation_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Consulta".into()))?;

        let status = status.unwrap_or(current.status);
        let ended_at = ended_at_for(status, current.ended_at, Utc::now());

        let updated = self
            .repo
            .update(&mut *tx, tenant_id, consultation_id, status, notes, ended_at)
            .await?;

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "UPDATE_CONSULTATION", "consultation")
                .object(consultation_id)
                .details(json!({ "from": current.status, "to": updated.status })),
        );

        Ok(updated)
    }

    pub async fn add_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        consultation_id: Uuid,
        procedure_id: Uuid,
        quantity: i32,
        tooth_number: Option<i16>,
        faces: Option<Vec<String>>,
    ) -> Result<ConsultationItem, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let consultation = self
            .repo
            .find(&mut *tx, tenant_id, consultation_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Consulta".into()))?;
        if !consultation.status.accepts_procedures() {
            return Err(AppError::ConsultationNotActive(
                consultation.status.as_str().to_string(),
            ));
        }

        let procedure = self.catalog.get_procedure(&mut *tx, tenant_id, procedure_id).await?;
        let position = procedure.resolve_position(tooth_number, faces)?;

        // Preço-paciente em vigor para a entidade da consulta
        let price = self
            .pricing
            .lookup(&mut *tx, tenant_id, procedure_id, consultation.entity_id)
            .await?;

        let item = self
            .repo
            .insert_item(
                &mut *tx,
                tenant_id,
                consultation_id,
                &NewConsultationItem {
                    procedure_id,
                    plan_item_id: None,
                    quantity,
                    unit_price: price.patient_price,
                    tooth_number: position.tooth_number,
                    faces: position.faces.as_deref(),
                },
            )
            .await?;

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "ADD_CONSULTATION_ITEM", "consultation")
                .object(consultation_id)
                .details(json!({ "itemId": item.id, "procedureId": procedure_id })),
        );

        Ok(item)
    }

    pub async fn remove_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let item = self
            .repo
            .find_item(&mut *tx, tenant_id, item_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Item da consulta".into()))?;

        let consultation = self
            .repo
            .find(&mut *tx, tenant_id, item.consultation_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Consulta".into()))?;
        if consultation.status == ConsultationStatus::Completed {
            return Err(AppError::ConsultationCompleted);
        }

        self.repo.delete_item(&mut *tx, tenant_id, item_id).await?;
        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "REMOVE_CONSULTATION_ITEM", "consultation")
                .object(item.consultation_id)
                .details(json!({ "itemId": item_id })),
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn completing_sets_the_end_time_once() {
        let now = Utc::now();
        assert_eq!(ended_at_for(ConsultationStatus::Completed, None, now), Some(now));

        let earlier = now - Duration::hours(1);
        assert_eq!(ended_at_for(ConsultationStatus::Completed, Some(earlier), now), None);
    }

    #[test]
    fn other_statuses_leave_the_end_time_alone() {
        let now = Utc::now();
        for status in [
            ConsultationStatus::Started,
            ConsultationStatus::InProgress,
            ConsultationStatus::Cancelled,
            ConsultationStatus::NoShow,
        ] {
            assert_eq!(ended_at_for(status, None, now), None);
        }
    }

    #[test]
    fn only_running_consultations_take_procedures() {
        assert!(ConsultationStatus::Started.accepts_procedures());
        assert!(ConsultationStatus::InProgress.accepts_procedures());
        assert!(!ConsultationStatus::Completed.accepts_procedures());
        assert!(!ConsultationStatus::NoShow.accepts_procedures());
    }
}
