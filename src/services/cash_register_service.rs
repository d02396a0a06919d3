// src/services/cash_register_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{cash_register_repo::PaymentTarget, CashRegisterRepository},
    models::cash_register::{
        CashSession, CashSessionSummary, CashierPayment, PaymentSummary, PendingReceivables,
    },
    services::{
        audit_service::{AuditRecord, AuditService},
        invoice_service::{InstallmentAmount, InvoiceService, PaymentInput},
    },
};

/// Exatamente um dos alvos tem de vir preenchido.
pub fn resolve_target(
    invoice_id: Option<Uuid>,
    installment_id: Option<Uuid>,
) -> Result<PaymentTarget, AppError> {
    match (invoice_id, installment_id) {
        (Some(id), None) => Ok(PaymentTarget::Invoice(id)),
        (None, Some(id)) => Ok(PaymentTarget::Installment(id)),
        _ => Err(AppError::PaymentTargetAmbiguous),
    }
}

// Erros de infraestrutura a meio do registo chegam ao cliente como falha genérica.
fn registration_error(err: AppError) -> AppError {
    match err {
        AppError::DatabaseError(e) => AppError::PaymentRegistrationFailed(e.to_string()),
        AppError::InternalServerError(e) => AppError::PaymentRegistrationFailed(e.to_string()),
        other => other,
    }
}

#[derive(Clone)]
pub struct CashRegisterService {
    repo: CashRegisterRepository,
    invoices: InvoiceService,
    audit: AuditService,
}

impl CashRegisterService {
    pub fn new(repo: CashRegisterRepository, invoices: InvoiceService, audit: AuditService) -> Self {
        Self {
            repo,
            invoices,
            audit,
        }
    }

    async fn summarize(
        &self,
        conn: &mut PgConnection,
        session: CashSession,
    ) -> Result<CashSessionSummary, AppError> {
        let history = self
            .repo
            .payment_history(&mut *conn, session.tenant_id, session.id)
            .await?;
        Ok(CashSessionSummary::new(session, PaymentSummary::from_history(history)))
    }

    pub async fn open<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        operator_id: Uuid,
        opening_float: Decimal,
    ) -> Result<CashSession, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        // O índice parcial apanha a corrida; a verificação dá o erro cedo
        if self.repo.find_open(&mut *tx, tenant_id).await?.is_some() {
            return Err(AppError::SessionAlreadyOpen);
        }

        let session = self.repo.open(&mut *tx, tenant_id, operator_id, opening_float).await?;
        tx.commit().await?;

        tracing::info!(
            "💰 Caixa {} aberto por {} com fundo {}",
            session.id,
            operator_id,
            opening_float
        );

        self.audit.record(
            AuditRecord::new(tenant_id, operator_id, "OPEN_CASH_SESSION", "cash_session")
                .object(session.id)
                .details(json!({ "openingFloat": opening_float })),
        );

        Ok(session)
    }

    pub async fn register_payment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        operator_id: Uuid,
        session_id: Uuid,
        invoice_id: Option<Uuid>,
        installment_id: Option<Uuid>,
        payment: PaymentInput,
    ) -> Result<CashierPayment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let target = resolve_target(invoice_id, installment_id)?;

        let mut tx = executor.begin().await.map_err(AppError::from).map_err(registration_error)?;

        self.repo
            .lock(&mut *tx, tenant_id, session_id)
            .await?
            .ok_or(AppError::SessionNotOpen)?
            .ensure_open()?;

        let paid_at = payment.paid_at.unwrap_or_else(Utc::now);
        let payment = PaymentInput {
            paid_at: Some(paid_at),
            ..payment
        };

        match target {
            PaymentTarget::Installment(id) => {
                self.invoices
                    .settle_installment(
                        &mut *tx,
                        tenant_id,
                        id,
                        InstallmentAmount::Add(payment.amount),
                        &payment,
                    )
                    .await
                    .map_err(registration_error)?;
            }
            PaymentTarget::Invoice(id) => {
                self.invoices
                    .settle_direct(&mut *tx, tenant_id, id, operator_id, &payment)
                    .await
                    .map_err(registration_error)?;
            }
        }

        let created = self
            .repo
            .insert_payment(
                &mut *tx,
                tenant_id,
                session_id,
                target,
                payment.amount,
                payment.method,
                operator_id,
                paid_at,
                payment.notes.as_deref(),
            )
            .await
            .map_err(registration_error)?;

        tx.commit().await.map_err(AppError::from).map_err(registration_error)?;

        tracing::info!(
            "💳 Pagamento {} de {} ({}) registado no caixa {}",
            created.id,
            created.amount,
            created.method.as_str(),
            session_id
        );

        self.audit.record(
            AuditRecord::new(tenant_id, operator_id, "REGISTER_PAYMENT", "cash_session")
                .object(session_id)
                .details(json!({
                    "paymentId": created.id,
                    "invoiceId": created.invoice_id,
                    "installmentId": created.installment_id,
                    "amount": created.amount,
                    "method": created.method,
                })),
        );

        Ok(created)
    }

    pub async fn close<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        operator_id: Uuid,
        session_id: Uuid,
        closing_float: Decimal,
    ) -> Result<CashSessionSummary, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        self.repo
            .lock(&mut *tx, tenant_id, session_id)
            .await?
            .ok_or(AppError::SessionNotOpen)?
            .ensure_open()?;

        let session = self.repo.close(&mut *tx, tenant_id, session_id, closing_float).await?;
        let summary = self.summarize(&mut *tx, session).await?;

        tx.commit().await?;

        tracing::info!(
            "🔒 Caixa {} fechado: esperado {}, contado {}, diferença {:?}",
            session_id,
            summary.expected_closing,
            closing_float,
            summary.difference
        );

        self.audit.record(
            AuditRecord::new(tenant_id, operator_id, "CLOSE_CASH_SESSION", "cash_session")
                .object(session_id)
                .details(json!({
                    "closingFloat": closing_float,
                    "difference": summary.difference,
                })),
        );

        Ok(summary)
    }

    /// A sessão aberta da clínica, com histórico e totais por método.
    pub async fn fetch_open<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<CashSessionSummary, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let session = self
            .repo
            .find_open(&mut *conn, tenant_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Sessão de caixa aberta".into()))?;

        self.summarize(&mut *conn, session).await
    }

    pub async fn summary<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<CashSessionSummary, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let session = self
            .repo
            .find(&mut *conn, tenant_id, session_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Sessão de caixa".into()))?;

        self.summarize(&mut *conn, session).await
    }

    pub async fn pending<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<PendingReceivables, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        self.repo
            .find(&mut *conn, tenant_id, session_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Sessão de caixa".into()))?;

        let invoices = self.repo.pending_invoices(&mut *conn, tenant_id).await?;
        let installments = self.repo.pending_installments(&mut *conn, tenant_id).await?;

        Ok(PendingReceivables {
            invoices,
            installments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_needs_exactly_one_target() {
        let id = Uuid::new_v4();
        assert_eq!(resolve_target(Some(id), None).unwrap(), PaymentTarget::Invoice(id));
        assert_eq!(resolve_target(None, Some(id)).unwrap(), PaymentTarget::Installment(id));
        assert!(matches!(resolve_target(None, None), Err(AppError::PaymentTargetAmbiguous)));
        assert!(matches!(
            resolve_target(Some(id), Some(Uuid::new_v4())),
            Err(AppError::PaymentTargetAmbiguous)
        ));
    }

    #[test]
    fn infrastructure_failures_become_generic() {
        let err = registration_error(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        assert!(matches!(err, AppError::PaymentRegistrationFailed(_)));

        let err = registration_error(AppError::InvoiceAlreadyPaid);
        assert!(matches!(err, AppError::InvoiceAlreadyPaid));
    }

    // ---
    // Com base de dados
    // ---

    use crate::{
        common::test_fixtures::audit,
        db::{
            BudgetRepository, ConsultationRepository, InvoiceRepository, TreatmentPlanRepository,
        },
        models::cash_register::CashSessionStatus,
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;
    use std::str::FromStr;

    fn service(pool: &PgPool) -> CashRegisterService {
        let invoices = InvoiceService::new(
            InvoiceRepository::new(),
            ConsultationRepository::new(),
            TreatmentPlanRepository::new(),
            BudgetRepository::new(),
            CashRegisterRepository::new(),
            audit(pool),
        );
        CashRegisterService::new(CashRegisterRepository::new(), invoices, audit(pool))
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn second_open_session_is_a_conflict(pool: PgPool) {
        let service = service(&pool);
        let tenant_id = Uuid::new_v4();
        let mut conn = pool.acquire().await.unwrap();

        let session = service
            .open(&mut *conn, tenant_id, Uuid::new_v4(), Decimal::from_str("100.00").unwrap())
            .await
            .unwrap();
        assert_eq!(session.status, CashSessionStatus::Open);

        let err = service
            .open(&mut *conn, tenant_id, Uuid::new_v4(), Decimal::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionAlreadyOpen));
        assert_eq!(err.status(), StatusCode::CONFLICT);

        // Outra clínica abre o seu próprio caixa
        assert!(service.open(&mut *conn, Uuid::new_v4(), Uuid::new_v4(), Decimal::ZERO).await.is_ok());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn open_session_index_rejects_a_second_row(pool: PgPool) {
        let repo = CashRegisterRepository::new();
        let tenant_id = Uuid::new_v4();

        repo.open(&pool, tenant_id, Uuid::new_v4(), Decimal::ZERO).await.unwrap();
        let err = repo.open(&pool, tenant_id, Uuid::new_v4(), Decimal::ZERO).await.unwrap_err();
        assert!(matches!(err, AppError::SessionAlreadyOpen));
    }
}
