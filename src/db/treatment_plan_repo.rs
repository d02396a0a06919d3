// src/db/treatment_plan_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::treatment_plan::{NewPlanItem, PlanItem, PlanItemStatus, TreatmentPlan},
};

#[derive(Clone, Default)]
pub struct TreatmentPlanRepository;

impl TreatmentPlanRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_in_progress<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<TreatmentPlan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, TreatmentPlan>(
            r#"
            SELECT * FROM treatment_plans
            WHERE tenant_id = $1 AND patient_id = $2 AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(tenant_id)
        .bind(patient_id)
        .fetch_optional(executor)
        .await?;

        Ok(plan)
    }

    pub async fn find_plan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<TreatmentPlan>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, TreatmentPlan>(
            "SELECT * FROM treatment_plans WHERE id = $1 AND tenant_id = $2",
        )
        .bind(plan_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(plan)
    }

    pub async fn create_plan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<TreatmentPlan, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // O índice parcial garante um só plano em curso por paciente
        sqlx::query_as::<_, TreatmentPlan>(
            r#"
            INSERT INTO treatment_plans (tenant_id, patient_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(patient_id)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, "Plano de tratamento em curso"))
    }

    pub async fn complete_plan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        plan_id: Uuid,
    ) -> Result<TreatmentPlan, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let plan = sqlx::query_as::<_, TreatmentPlan>(
            r#"
            UPDATE treatment_plans
            SET status = 'COMPLETED', completed_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(plan_id)
        .bind(tenant_id)
        .fetch_one(executor)
        .await?;

        Ok(plan)
    }

    // =========================================================================
    //  ITENS DO PLANO
    // =========================================================================

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        plan_id: Uuid,
        item: &NewPlanItem,
    ) -> Result<PlanItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // UNIQUE(budget_item_id): cada item de orçamento alimenta no máximo um item de plano
        sqlx::query_as::<_, PlanItem>(
            r#"
            INSERT INTO plan_items (
                tenant_id, plan_id, budget_item_id, procedure_id,
                planned_quantity, tooth_number, faces
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(plan_id)
        .bind(item.budget_item_id)
        .bind(item.procedure_id)
        .bind(item.planned_quantity)
        .bind(item.tooth_number)
        .bind(item.faces.as_deref())
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, "Item de orçamento já planeado"))
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Vec<PlanItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, PlanItem>(
            r#"
            SELECT * FROM plan_items
            WHERE tenant_id = $1 AND plan_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(plan_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn lock_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<PlanItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, PlanItem>(
            "SELECT * FROM plan_items WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(item_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(item)
    }

    /// Fecha o item. Concluir também conta uma execução.
    pub async fn close_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        item_id: Uuid,
        status: PlanItemStatus,
    ) -> Result<PlanItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, PlanItem>(
            r#"
            UPDATE plan_items
            SET status = $3,
                executed_quantity = executed_quantity
                    + CASE WHEN $3 = 'COMPLETED'::plan_item_status THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(tenant_id)
        .bind(status)
        .fetch_one(executor)
        .await?;

        Ok(item)
    }
}
