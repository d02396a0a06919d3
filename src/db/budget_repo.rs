// src/db/budget_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        budget::{Budget, BudgetFilter, BudgetItem, BudgetStatus, BudgetTotals},
        catalog::Price,
        treatment_plan::ApprovedBudgetItem,
    },
};

const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Clone, Default)]
pub struct BudgetRepository;

impl BudgetRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  CABEÇALHO
    // =========================================================================

    pub async fn create_budget<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
        entity_id: Uuid,
        budget_date: NaiveDate,
        notes: Option<&str>,
    ) -> Result<Budget, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Nasce em rascunho, sem itens e com totais a zero
        let budget = sqlx::query_as::<_, Budget>(
            r#"
            INSERT INTO budgets (tenant_id, patient_id, entity_id, budget_date, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(patient_id)
        .bind(entity_id)
        .bind(budget_date)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(budget)
    }

    pub async fn find_budget<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
    ) -> Result<Option<Budget>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let budget = sqlx::query_as::<_, Budget>(
            "SELECT * FROM budgets WHERE id = $1 AND tenant_id = $2",
        )
        .bind(budget_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(budget)
    }

    /// Igual a `find_budget`, mas bloqueia a linha até ao fim da transação.
    pub async fn lock_budget<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
    ) -> Result<Option<Budget>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let budget = sqlx::query_as::<_, Budget>(
            "SELECT * FROM budgets WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(budget_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(budget)
    }

    pub async fn list_budgets<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &BudgetFilter,
    ) -> Result<Vec<Budget>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let budgets = sqlx::query_as::<_, Budget>(
            r#"
            SELECT * FROM budgets
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR patient_id = $2)
              AND ($3::uuid IS NULL OR entity_id = $3)
              AND ($4::budget_status IS NULL OR status = $4)
              AND ($5::date IS NULL OR budget_date >= $5)
              AND ($6::date IS NULL OR budget_date <= $6)
            ORDER BY budget_date DESC, created_at DESC
            LIMIT $7
            "#,
        )
        .bind(tenant_id)
        .bind(filter.patient_id)
        .bind(filter.entity_id)
        .bind(filter.status)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .fetch_all(executor)
        .await?;

        Ok(budgets)
    }

    /// Nome do paciente e da entidade, para o detalhe.
    pub async fn header_names<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
    ) -> Result<(String, String), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let names = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT p.name, e.name
            FROM budgets b
            JOIN patients p ON p.id = b.patient_id
            JOIN payer_entities e ON e.id = b.entity_id
            WHERE b.id = $1 AND b.tenant_id = $2
            "#,
        )
        .bind(budget_id)
        .bind(tenant_id)
        .fetch_one(executor)
        .await?;

        Ok(names)
    }

    pub async fn update_header<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
        entity_id: Uuid,
        budget_date: NaiveDate,
        notes: Option<&str>,
    ) -> Result<Budget, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let budget = sqlx::query_as::<_, Budget>(
            r#"
            UPDATE budgets
            SET entity_id = $3, budget_date = $4, notes = $5, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(budget_id)
        .bind(tenant_id)
        .bind(entity_id)
        .bind(budget_date)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(budget)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
        status: BudgetStatus,
    ) -> Result<Budget, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let budget = sqlx::query_as::<_, Budget>(
            r#"
            UPDATE budgets SET status = $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(budget_id)
        .bind(tenant_id)
        .bind(status)
        .fetch_one(executor)
        .await?;

        Ok(budget)
    }

    pub async fn save_totals<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
        totals: BudgetTotals,
    ) -> Result<Budget, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let budget = sqlx::query_as::<_, Budget>(
            r#"
            UPDATE budgets
            SET entity_total = $3, patient_total = $4, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(budget_id)
        .bind(tenant_id)
        .bind(totals.entity_total)
        .bind(totals.patient_total)
        .fetch_one(executor)
        .await?;

        Ok(budget)
    }

    /// Orçamento aprovado mais recente do paciente.
    pub async fn latest_approved<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<Budget>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let budget = sqlx::query_as::<_, Budget>(
            r#"
            SELECT * FROM budgets
            WHERE tenant_id = $1 AND patient_id = $2 AND status = 'APPROVED'
            ORDER BY budget_date DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(patient_id)
        .fetch_optional(executor)
        .await?;

        Ok(budget)
    }

    // =========================================================================
    //  ITENS
    // =========================================================================

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
    ) -> Result<Vec<BudgetItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, BudgetItem>(
            r#"
            SELECT * FROM budget_items
            WHERE tenant_id = $1 AND budget_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(budget_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
        price: &Price,
        tooth_number: Option<i16>,
        faces: Option<&[String]>,
    ) -> Result<BudgetItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Quantidade fixa 1: os subtotais são os preços tal como estão na tabela
        let item = sqlx::query_as::<_, BudgetItem>(
            r#"
            INSERT INTO budget_items (
                tenant_id, budget_id, procedure_id, quantity,
                entity_price, patient_price, entity_subtotal, patient_subtotal,
                tooth_number, faces
            )
            VALUES ($1, $2, $3, 1, $4, $5, $4, $5, $6, $7)
            RETURNING id, tenant_id, budget_id, procedure_id, quantity,
                      entity_price, patient_price, entity_subtotal, patient_subtotal,
                      tooth_number, faces
            "#,
        )
        .bind(tenant_id)
        .bind(budget_id)
        .bind(price.procedure_id)
        .bind(price.entity_price)
        .bind(price.patient_price)
        .bind(tooth_number)
        .bind(faces)
        .fetch_one(executor)
        .await?;

        Ok(item)
    }

    /// Remove o item só se pertencer ao orçamento indicado.
    pub async fn delete_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
        item_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "DELETE FROM budget_items WHERE id = $1 AND budget_id = $2 AND tenant_id = $3",
        )
        .bind(item_id)
        .bind(budget_id)
        .bind(tenant_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_items<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        budget_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM budget_items WHERE tenant_id = $1 AND budget_id = $2",
        )
        .bind(tenant_id)
        .bind(budget_id)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Itens de todos os orçamentos aprovados do paciente, marcando os já usados num plano.
    pub async fn approved_items_for_patient<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Vec<ApprovedBudgetItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, ApprovedBudgetItem>(
            r#"
            SELECT
                b.id AS budget_id,
                bi.id AS budget_item_id,
                bi.procedure_id,
                bi.quantity,
                bi.tooth_number,
                bi.faces,
                EXISTS (
                    SELECT 1 FROM plan_items pi WHERE pi.budget_item_id = bi.id
                ) AS consumed
            FROM budgets b
            JOIN budget_items bi ON bi.budget_id = b.id
            WHERE b.tenant_id = $1 AND b.patient_id = $2 AND b.status = 'APPROVED'
            ORDER BY b.budget_date ASC, bi.created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(patient_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }
}
