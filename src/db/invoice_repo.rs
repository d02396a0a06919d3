// src/db/invoice_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::invoice::{
        Installment, InstallmentStatus, Invoice, InvoiceFilter, InvoiceItem, InvoiceKind,
        InvoicePayment, InvoiceStatus, NewInvoiceItem, PaymentMethod,
    },
};

const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Clone, Default)]
pub struct InvoiceRepository;

impl InvoiceRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  FATURAS
    // =========================================================================

    pub async fn find<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE id = $1 AND tenant_id = $2",
        )
        .bind(invoice_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    /// Bloqueia a fatura: todos os caminhos de pagamento passam por aqui.
    pub async fn lock<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(invoice_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    pub async fn find_by_consultation<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        consultation_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE tenant_id = $1 AND consultation_id = $2",
        )
        .bind(tenant_id)
        .bind(consultation_id)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    pub async fn find_active_by_plan<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE tenant_id = $1 AND plan_id = $2 AND status <> 'CANCELLED'
            "#,
        )
        .bind(tenant_id)
        .bind(plan_id)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    /// `None` quando a origem já tem fatura (índices `uq_invoices_consultation`
    /// e `uq_invoices_active_plan`); o INSERT espera pela transação concorrente.
    pub async fn create<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
        kind: InvoiceKind,
        consultation_id: Option<Uuid>,
        plan_id: Option<Uuid>,
        total: Decimal,
    ) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (tenant_id, patient_id, kind, consultation_id, plan_id, total)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(patient_id)
        .bind(kind)
        .bind(consultation_id)
        .bind(plan_id)
        .bind(total)
        .fetch_optional(executor)
        .await?;

        Ok(invoice)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT * FROM invoices
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR patient_id = $2)
              AND ($3::invoice_kind IS NULL OR kind = $3)
              AND ($4::invoice_status IS NULL OR status = $4)
            ORDER BY issued_at DESC
            LIMIT $5
            "#,
        )
        .bind(tenant_id)
        .bind(filter.patient_id)
        .bind(filter.kind)
        .bind(filter.status)
        .bind(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .fetch_all(executor)
        .await?;

        Ok(invoices)
    }

    pub async fn patient_name<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        patient_id: Uuid,
    ) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let name: String = sqlx::query_scalar(
            "SELECT name FROM patients WHERE id = $1 AND tenant_id = $2",
        )
        .bind(patient_id)
        .bind(tenant_id)
        .fetch_one(executor)
        .await?;

        Ok(name)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(tenant_id)
        .bind(status)
        .fetch_one(executor)
        .await?;

        Ok(invoice)
    }

    pub async fn add_to_total<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
        amount: Decimal,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET total = total + $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(tenant_id)
        .bind(amount)
        .fetch_one(executor)
        .await?;

        Ok(invoice)
    }

    // =========================================================================
    //  ITENS
    // =========================================================================

    /// Projeção 1:1 dos itens da consulta.
    pub async fn consultation_lines<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        consultation_id: Uuid,
    ) -> Result<Vec<NewInvoiceItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lines = sqlx::query_as::<_, NewInvoiceItem>(
            r#"
            SELECT
                'CONSULTATION_ITEM'::invoice_item_origin AS origin,
                ci.id AS consultation_item_id,
                NULL::uuid AS plan_item_id,
                ci.procedure_id,
                p.description,
                ci.quantity,
                ci.unit_price,
                ci.total
            FROM consultation_items ci
            JOIN procedures p ON p.id = ci.procedure_id
            WHERE ci.tenant_id = $1 AND ci.consultation_id = $2
            ORDER BY ci.created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(consultation_id)
        .fetch_all(executor)
        .await?;

        Ok(lines)
    }

    /// Itens do plano, ao preço-paciente congelado no item de orçamento de origem.
    pub async fn plan_lines<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Vec<NewInvoiceItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lines = sqlx::query_as::<_, NewInvoiceItem>(
            r#"
            SELECT
                'PLAN_ITEM'::invoice_item_origin AS origin,
                NULL::uuid AS consultation_item_id,
                pi.id AS plan_item_id,
                pi.procedure_id,
                p.description,
                pi.planned_quantity AS quantity,
                bi.patient_price AS unit_price,
                bi.patient_price * pi.planned_quantity AS total
            FROM plan_items pi
            JOIN budget_items bi ON bi.id = pi.budget_item_id
            JOIN procedures p ON p.id = pi.procedure_id
            WHERE pi.tenant_id = $1 AND pi.plan_id = $2
            ORDER BY pi.created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(plan_id)
        .fetch_all(executor)
        .await?;

        Ok(lines)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
        line: &NewInvoiceItem,
    ) -> Result<InvoiceItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (
                tenant_id, invoice_id, origin, consultation_item_id, plan_item_id,
                procedure_id, description, quantity, unit_price, total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(line.origin)
        .bind(line.consultation_item_id)
        .bind(line.plan_item_id)
        .bind(line.procedure_id)
        .bind(line.description.as_deref())
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.total)
        .fetch_one(executor)
        .await?;

        Ok(item)
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT * FROM invoice_items
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    // =========================================================================
    //  PARCELAS
    // =========================================================================

    pub async fn count_installments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM installments WHERE tenant_id = $1 AND invoice_id = $2",
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    pub async fn insert_installment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
        number: i32,
        planned_amount: Decimal,
        due_date: NaiveDate,
    ) -> Result<Installment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Installment>(
            r#"
            INSERT INTO installments (tenant_id, invoice_id, number, planned_amount, due_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(number)
        .bind(planned_amount)
        .bind(due_date)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, "Número de parcela"))
    }

    pub async fn list_installments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Installment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let installments = sqlx::query_as::<_, Installment>(
            r#"
            SELECT * FROM installments
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY number ASC
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;

        Ok(installments)
    }

    pub async fn find_installment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        installment_id: Uuid,
    ) -> Result<Option<Installment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let installment = sqlx::query_as::<_, Installment>(
            "SELECT * FROM installments WHERE id = $1 AND tenant_id = $2",
        )
        .bind(installment_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(installment)
    }

    pub async fn record_installment_payment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        installment_id: Uuid,
        paid_amount: Decimal,
        paid_at: DateTime<Utc>,
        method: PaymentMethod,
        status: InstallmentStatus,
        notes: Option<&str>,
    ) -> Result<Installment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let installment = sqlx::query_as::<_, Installment>(
            r#"
            UPDATE installments
            SET paid_amount = $3, paid_at = $4, method = $5, status = $6,
                notes = COALESCE($7, notes), updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(installment_id)
        .bind(tenant_id)
        .bind(paid_amount)
        .bind(paid_at)
        .bind(method)
        .bind(status)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(installment)
    }

    pub async fn sum_installments_paid<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(paid_amount), 0)
            FROM installments WHERE tenant_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_one(executor)
        .await?;

        Ok(total)
    }

    // =========================================================================
    //  PAGAMENTOS DIRETOS
    // =========================================================================

    pub async fn count_payments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoice_payments WHERE tenant_id = $1 AND invoice_id = $2",
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    pub async fn insert_payment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
        paid_at: DateTime<Utc>,
        notes: Option<&str>,
        operator_id: Uuid,
    ) -> Result<InvoicePayment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payment = sqlx::query_as::<_, InvoicePayment>(
            r#"
            INSERT INTO invoice_payments (
                tenant_id, invoice_id, amount, method, paid_at, notes, operator_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .bind(amount)
        .bind(method)
        .bind(paid_at)
        .bind(notes)
        .bind(operator_id)
        .fetch_one(executor)
        .await?;

        Ok(payment)
    }

    pub async fn list_payments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoicePayment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payments = sqlx::query_as::<_, InvoicePayment>(
            r#"
            SELECT * FROM invoice_payments
            WHERE tenant_id = $1 AND invoice_id = $2
            ORDER BY paid_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;

        Ok(payments)
    }

    pub async fn sum_payments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM invoice_payments WHERE tenant_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(invoice_id)
        .fetch_one(executor)
        .await?;

        Ok(total)
    }
}
