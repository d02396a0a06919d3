// src/db/cash_register_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        cash_register::{
            CashSession, CashierPayment, PaymentHistoryEntry, PendingInstallment, PendingInvoice,
        },
        invoice::PaymentMethod,
    },
};

#[derive(Clone, Default)]
pub struct CashRegisterRepository;

// Alvo de um pagamento de caixa: fatura OU parcela
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Invoice(Uuid),
    Installment(Uuid),
}

impl CashRegisterRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  SESSÕES
    // =========================================================================

    pub async fn find_open<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Option<CashSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            "SELECT * FROM cash_sessions WHERE tenant_id = $1 AND status = 'OPEN'",
        )
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(session)
    }

    pub async fn open<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        operator_id: Uuid,
        opening_float: Decimal,
    ) -> Result<CashSession, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Índice parcial: no máximo uma sessão OPEN por clínica
        sqlx::query_as::<_, CashSession>(
            r#"
            INSERT INTO cash_sessions (tenant_id, operator_id, opening_float)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(operator_id)
        .bind(opening_float)
        .fetch_one(executor)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => AppError::SessionAlreadyOpen,
            _ => AppError::DatabaseError(e),
        })
    }

    pub async fn find<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<CashSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            "SELECT * FROM cash_sessions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(session_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(session)
    }

    /// Bloqueia a sessão até ao fim da transação (pagamento vs. fecho).
    pub async fn lock<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<CashSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            "SELECT * FROM cash_sessions WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(session_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;

        Ok(session)
    }

    pub async fn close<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        session_id: Uuid,
        closing_float: Decimal,
    ) -> Result<CashSession, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            r#"
            UPDATE cash_sessions
            SET status = 'CLOSED', closing_float = $3, closed_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(tenant_id)
        .bind(closing_float)
        .fetch_one(executor)
        .await?;

        Ok(session)
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    pub async fn insert_payment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        session_id: Uuid,
        target: PaymentTarget,
        amount: Decimal,
        method: PaymentMethod,
        operator_id: Uuid,
        paid_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<CashierPayment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (invoice_id, installment_id) = match target {
            PaymentTarget::Invoice(id) => (Some(id), None),
            PaymentTarget::Installment(id) => (None, Some(id)),
        };

        let payment = sqlx::query_as::<_, CashierPayment>(
            r#"
            INSERT INTO cashier_payments (
                tenant_id, session_id, invoice_id, installment_id,
                amount, method, operator_id, paid_at, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(session_id)
        .bind(invoice_id)
        .bind(installment_id)
        .bind(amount)
        .bind(method)
        .bind(operator_id)
        .bind(paid_at)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(payment)
    }

    /// Histórico da sessão com o nome do paciente (via fatura ou via parcela).
    pub async fn payment_history<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<Vec<PaymentHistoryEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let history = sqlx::query_as::<_, PaymentHistoryEntry>(
            r#"
            SELECT
                cp.id, cp.amount, cp.method, cp.paid_at,
                p.name AS patient_name,
                cp.invoice_id, cp.installment_id
            FROM cashier_payments cp
            LEFT JOIN installments i ON i.id = cp.installment_id
            LEFT JOIN invoices f ON f.id = COALESCE(cp.invoice_id, i.invoice_id)
            LEFT JOIN patients p ON p.id = f.patient_id
            WHERE cp.tenant_id = $1 AND cp.session_id = $2
            ORDER BY cp.paid_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(session_id)
        .fetch_all(executor)
        .await?;

        Ok(history)
    }

    // =========================================================================
    //  PENDENTES
    // =========================================================================

    /// Faturas por pagar sem plano de parcelas (essas aparecem parcela a parcela).
    pub async fn pending_invoices<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<PendingInvoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, PendingInvoice>(
            r#"
            SELECT
                f.id AS invoice_id,
                f.patient_id,
                p.name AS patient_name,
                f.status,
                f.total,
                COALESCE(paid.amount, 0) AS paid,
                f.total - COALESCE(paid.amount, 0) AS pending,
                f.issued_at
            FROM invoices f
            JOIN patients p ON p.id = f.patient_id
            LEFT JOIN LATERAL (
                SELECT SUM(ip.amount) AS amount
                FROM invoice_payments ip WHERE ip.invoice_id = f.id
            ) paid ON TRUE
            WHERE f.tenant_id = $1
              AND f.status IN ('PENDING', 'PARTIAL')
              AND NOT EXISTS (SELECT 1 FROM installments i WHERE i.invoice_id = f.id)
            ORDER BY f.issued_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(invoices)
    }

    pub async fn pending_installments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<PendingInstallment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let installments = sqlx::query_as::<_, PendingInstallment>(
            r#"
            SELECT
                i.id AS installment_id,
                i.invoice_id,
                i.number,
                p.name AS patient_name,
                i.planned_amount,
                i.paid_amount,
                i.planned_amount - i.paid_amount AS pending,
                i.due_date
            FROM installments i
            JOIN invoices f ON f.id = i.invoice_id
            JOIN patients p ON p.id = f.patient_id
            WHERE i.tenant_id = $1
              AND i.status <> 'PAID'
              AND f.status <> 'CANCELLED'
            ORDER BY i.due_date ASC, i.number ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;

        Ok(installments)
    }
}
