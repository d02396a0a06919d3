// Dados mínimos de uma clínica para os testes com base de dados (`#[sqlx::test]`).

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::AuditRepository, services::audit_service::AuditService};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Clinic {
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    pub patient_id: Uuid,
    pub entity_id: Uuid,
    pub procedure_id: Uuid,
}

pub(crate) fn audit(pool: &PgPool) -> AuditService {
    AuditService::new(AuditRepository::new(), pool.clone())
}

/// Paciente, entidade particular e um artigo com preço de 35.00 ao paciente.
pub(crate) async fn seed_clinic(pool: &PgPool) -> Clinic {
    let tenant_id = Uuid::new_v4();

    let patient_id: Uuid =
        sqlx::query_scalar("INSERT INTO patients (tenant_id, name) VALUES ($1, 'Ana Lopes') RETURNING id")
            .bind(tenant_id)
            .fetch_one(pool)
            .await
            .unwrap();

    let entity_id: Uuid = sqlx::query_scalar(
        "INSERT INTO payer_entities (tenant_id, slug, name) VALUES ($1, 'particular', 'Particular') RETURNING id",
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let procedure_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO procedures (tenant_id, code, description, category, requires_tooth)
        VALUES ($1, 'R201', 'Restauração a compósito', 'Dentisteria', TRUE)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query(
        r#"
        INSERT INTO prices (tenant_id, procedure_id, entity_id, entity_price, patient_price)
        VALUES ($1, $2, $3, 0, 35.00)
        "#,
    )
    .bind(tenant_id)
    .bind(procedure_id)
    .bind(entity_id)
    .execute(pool)
    .await
    .unwrap();

    Clinic {
        tenant_id,
        actor_id: Uuid::new_v4(),
        patient_id,
        entity_id,
        procedure_id,
    }
}

/// Consulta iniciada com um procedimento ao preço indicado.
pub(crate) async fn seed_consultation(pool: &PgPool, clinic: &Clinic, unit_price: Decimal) -> Uuid {
    let consultation_id: Uuid = sqlx::query_scalar(
        "INSERT INTO consultations (tenant_id, patient_id, entity_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(clinic.tenant_id)
    .bind(clinic.patient_id)
    .bind(clinic.entity_id)
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query(
        r#"
        INSERT INTO consultation_items (tenant_id, consultation_id, procedure_id, quantity, unit_price, total)
        VALUES ($1, $2, $3, 1, $4, $4)
        "#,
    )
    .bind(clinic.tenant_id)
    .bind(consultation_id)
    .bind(clinic.procedure_id)
    .bind(unit_price)
    .execute(pool)
    .await
    .unwrap();

    consultation_id
}

/// Orçamento aprovado com um item no dente 36; devolve o id do item.
pub(crate) async fn seed_approved_budget(pool: &PgPool, clinic: &Clinic) -> Uuid {
    let budget_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO budgets (tenant_id, patient_id, entity_id, status, patient_total)
        VALUES ($1, $2, $3, 'APPROVED', 35.00)
        RETURNING id
        "#,
    )
    .bind(clinic.tenant_id)
    .bind(clinic.patient_id)
    .bind(clinic.entity_id)
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query_scalar(
        r#"
        INSERT INTO budget_items (
            tenant_id, budget_id, procedure_id,
            entity_price, patient_price, entity_subtotal, patient_subtotal, tooth_number
        )
        VALUES ($1, $2, $3, 0, 35.00, 0, 35.00, 36)
        RETURNING id
        "#,
    )
    .bind(clinic.tenant_id)
    .bind(budget_id)
    .bind(clinic.procedure_id)
    .fetch_one(pool)
    .await
    .unwrap()
}
