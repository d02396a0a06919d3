// src/services/catalog_service.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CatalogRepository,
    models::catalog::{PayerEntity, Patient, Procedure},
    services::audit_service::{AuditRecord, AuditService},
};

// Dados de um novo artigo
pub struct NewProcedure<'a> {
    pub code: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub requires_tooth: bool,
    pub requires_faces: bool,
    pub face_count: Option<i16>,
}

#[derive(Clone)]
pub struct CatalogService {
    repo: CatalogRepository,
    audit: AuditService,
}

impl CatalogService {
    pub fn new(repo: CatalogRepository, audit: AuditService) -> Self {
        Self { repo, audit }
    }

    // --- PACIENTES ---

    pub async fn create_patient<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        name: &str,
        tax_number: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Patient, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let patient = self
            .repo
            .create_patient(executor, tenant_id, name, tax_number, email, phone)
            .await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "CREATE_PATIENT", "patient").object(patient.id),
        );

        Ok(patient)
    }

    pub async fn list_patients<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Patient>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_patients(executor, tenant_id).await
    }

    pub async fn get_patient<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Patient, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_patient(executor, tenant_id, patient_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Paciente".into()))
    }

    // --- ENTIDADES ---

    pub async fn create_entity<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        slug: &str,
        name: &str,
    ) -> Result<PayerEntity, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entity = self.repo.create_entity(executor, tenant_id, slug, name).await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "CREATE_ENTITY", "payer_entity").object(entity.id),
        );

        Ok(entity)
    }

    pub async fn list_entities<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<PayerEntity>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_entities(executor, tenant_id).await
    }

    pub async fn get_entity<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        entity_id: Uuid,
    ) -> Result<PayerEntity, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_entity(executor, tenant_id, entity_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Entidade".into()))
    }

    // --- ARTIGOS ---

    pub async fn create_procedure<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        data: NewProcedure<'_>,
    ) -> Result<Procedure, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let procedure = self
            .repo
            .create_procedure(
                executor,
                tenant_id,
                data.code,
                data.description,
                data.category,
                data.requires_tooth,
                data.requires_faces,
                data.face_count,
            )
            .await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "CREATE_PROCEDURE", "procedure").object(procedure.id),
        );

        Ok(procedure)
    }

    pub async fn list_procedures<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Procedure>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list_procedures(executor, tenant_id).await
    }

    pub async fn get_procedure<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        procedure_id: Uuid,
    ) -> Result<Procedure, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_procedure(executor, tenant_id, procedure_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Artigo".into()))
    }
}
