// src/services/invoice_service.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        cash_register_repo::PaymentTarget, BudgetRepository, CashRegisterRepository,
        ConsultationRepository, InvoiceRepository, TreatmentPlanRepository,
    },
    models::invoice::{
        Installment, InstallmentDraft, InstallmentStatus, Invoice, InvoiceDetail, InvoiceFilter,
        InvoiceItem, InvoiceItemOrigin, InvoiceKind, InvoicePayment, InvoiceStatus, NewInvoiceItem,
        PaymentMethod,
    },
    services::audit_service::{AuditRecord, AuditService},
};

// Como o valor pago entra na parcela
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallmentAmount {
    /// Substitui o valor pago (pagamento direto da parcela).
    Replace(Decimal),
    /// Soma ao que já estava pago (pagamento pelo caixa).
    Add(Decimal),
}

impl InstallmentAmount {
    pub fn resolve(self, already_paid: Decimal) -> Decimal {
        match self {
            InstallmentAmount::Replace(amount) => amount,
            InstallmentAmount::Add(amount) => already_paid + amount,
        }
    }
}

// Dados comuns a qualquer pagamento
#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

// Item manual acrescentado a uma fatura
#[derive(Debug, Clone)]
pub struct ManualItem {
    pub origin: InvoiceItemOrigin,
    pub origin_item_id: Option<Uuid>,
    pub procedure_id: Option<Uuid>,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Confere a origem pedida e devolve o id da consulta/plano.
pub fn check_origin(
    kind: InvoiceKind,
    consultation_id: Option<Uuid>,
    plan_id: Option<Uuid>,
) -> Result<Uuid, AppError> {
    match (kind, consultation_id, plan_id) {
        (InvoiceKind::Consultation, Some(id), None) => Ok(id),
        (InvoiceKind::Plan, None, Some(id)) => Ok(id),
        (InvoiceKind::Consultation, None, _) => Err(AppError::InvoiceOriginMismatch(
            "fatura de consulta exige consultationId".into(),
        )),
        (InvoiceKind::Consultation, Some(_), Some(_)) => Err(AppError::InvoiceOriginMismatch(
            "fatura de consulta não aceita planId".into(),
        )),
        (InvoiceKind::Plan, _, None) => Err(AppError::InvoiceOriginMismatch(
            "fatura de plano exige planId".into(),
        )),
        (InvoiceKind::Plan, Some(_), Some(_)) => Err(AppError::InvoiceOriginMismatch(
            "fatura de plano não aceita consultationId".into(),
        )),
    }
}

pub fn sum_lines(lines: &[NewInvoiceItem]) -> Decimal {
    lines.iter().map(|line| line.total).sum()
}

/// Regras para definir parcelas numa fatura (com a linha já bloqueada).
pub fn check_installment_plan(
    invoice: &Invoice,
    drafts: &[InstallmentDraft],
    existing_installments: i64,
    existing_payments: i64,
) -> Result<(), AppError> {
    if invoice.kind != InvoiceKind::Plan {
        return Err(AppError::InvoiceNotPlan);
    }
    if invoice.status == InvoiceStatus::Cancelled {
        return Err(AppError::InvoiceCancelled);
    }
    if existing_installments > 0 {
        return Err(AppError::InstallmentsAlreadyDefined);
    }
    if existing_payments > 0 {
        return Err(AppError::InvoiceHasPayments);
    }

    // NUMERIC(12,2) arredondaria cada parcela e a soma gravada deixaria de bater com o total
    if let Some(bad) = drafts
        .iter()
        .find(|d| d.planned_amount <= Decimal::ZERO || d.planned_amount.normalize().scale() > 2)
    {
        return Err(AppError::InvalidInstallmentAmount {
            number: bad.number,
            amount: bad.planned_amount,
        });
    }

    // Igualdade decimal exata, sem tolerância
    let actual: Decimal = drafts.iter().map(|d| d.planned_amount).sum();
    if actual != invoice.total {
        return Err(AppError::InstallmentSumMismatch {
            expected: invoice.total,
            actual,
        });
    }
    Ok(())
}

/// Regras do pagamento direto (sem parcelas).
pub fn check_direct_payment(invoice: &Invoice, installment_count: i64) -> Result<(), AppError> {
    match invoice.status {
        InvoiceStatus::Cancelled => return Err(AppError::InvoiceCancelled),
        InvoiceStatus::Paid => return Err(AppError::InvoiceAlreadyPaid),
        _ => {}
    }
    if installment_count > 0 {
        return Err(AppError::InvoiceHasInstallments);
    }
    Ok(())
}

#[derive(Clone)]
pub struct InvoiceService {
    repo: InvoiceRepository,
    consultation_repo: ConsultationRepository,
    plan_repo: TreatmentPlanRepository,
    budget_repo: BudgetRepository,
    cash_repo: CashRegisterRepository,
    audit: AuditService,
}

impl InvoiceService {
    pub fn new(
        repo: InvoiceRepository,
        consultation_repo: ConsultationRepository,
        plan_repo: TreatmentPlanRepository,
        budget_repo: BudgetRepository,
        cash_repo: CashRegisterRepository,
        audit: AuditService,
    ) -> Self {
        Self {
            repo,
            consultation_repo,
            plan_repo,
            budget_repo,
            cash_repo,
            audit,
        }
    }

    async fn locked_invoice(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Invoice, AppError> {
        self.repo
            .lock(conn, tenant_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Fatura".into()))
    }

    /// Sessão de caixa bloqueada e aberta.
    async fn open_session(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        session_id: Uuid,
    ) -> Result<(), AppError> {
        self.cash_repo
            .lock(conn, tenant_id, session_id)
            .await?
            .ok_or(AppError::SessionNotOpen)?
            .ensure_open()?;
        Ok(())
    }

    // Estado da fatura recalculado a partir do total pago (idempotente)
    async fn refresh_status(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        invoice: &Invoice,
    ) -> Result<Invoice, AppError> {
        let paid = self.paid_total(&mut *conn, tenant_id, invoice.id).await?;
        let status = InvoiceStatus::from_paid(paid, invoice.total);
        self.repo.set_status(&mut *conn, tenant_id, invoice.id, status).await
    }

    // Fatura que já cobre a origem: a da consulta, ou a ativa do plano
    async fn existing_invoice(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        kind: InvoiceKind,
        origin_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        match kind {
            InvoiceKind::Consultation => self.repo.find_by_consultation(conn, tenant_id, origin_id).await,
            InvoiceKind::Plan => self.repo.find_active_by_plan(conn, tenant_id, origin_id).await,
        }
    }

    async fn paid_total(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Decimal, AppError> {
        let installments = self.repo.sum_installments_paid(&mut *conn, tenant_id, invoice_id).await?;
        let direct = self.repo.sum_payments(&mut *conn, tenant_id, invoice_id).await?;
        Ok(installments + direct)
    }

    // =========================================================================
    //  GERAÇÃO
    // =========================================================================

    pub async fn create_invoice<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        patient_id: Uuid,
        kind: InvoiceKind,
        consultation_id: Option<Uuid>,
        plan_id: Option<Uuid>,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let origin_id = check_origin(kind, consultation_id, plan_id)?;
        let mut tx = executor.begin().await?;

        let lines = match kind {
            InvoiceKind::Consultation => {
                let consultation = self
                    .consultation_repo
                    .find(&mut *tx, tenant_id, origin_id)
                    .await?
                    .ok_or_else(|| AppError::ResourceNotFound("Consulta".into()))?;
                if consultation.patient_id != patient_id {
                    return Err(AppError::PatientMismatch("Consulta".into()));
                }

                // Uma fatura por consulta, seja qual for o estado
                if let Some(existing) = self.existing_invoice(&mut *tx, tenant_id, kind, origin_id).await? {
                    return Ok(existing);
                }

                self.repo.consultation_lines(&mut *tx, tenant_id, origin_id).await?
            }
            InvoiceKind::Plan => {
                let plan = self
                    .plan_repo
                    .find_plan(&mut *tx, tenant_id, origin_id)
                    .await?
                    .ok_or_else(|| AppError::ResourceNotFound("Plano de tratamento".into()))?;
                if plan.patient_id != patient_id {
                    return Err(AppError::PatientMismatch("Plano de tratamento".into()));
                }

                if let Some(existing) = self.existing_invoice(&mut *tx, tenant_id, kind, origin_id).await? {
                    return Ok(existing);
                }

                self.budget_repo
                    .latest_approved(&mut *tx, tenant_id, patient_id)
                    .await?
                    .ok_or_else(|| AppError::ResourceNotFound("Orçamento aprovado".into()))?;

                self.repo.plan_lines(&mut *tx, tenant_id, origin_id).await?
            }
        };

        let total = sum_lines(&lines);
        let created = self
            .repo
            .create(&mut *tx, tenant_id, patient_id, kind, consultation_id, plan_id, total)
            .await?;
        let Some(invoice) = created else {
            // Um pedido concorrente emitiu a fatura depois da verificação acima
            tracing::debug!("Fatura de {:?} {} emitida em paralelo", kind, origin_id);
            return self
                .existing_invoice(&mut *tx, tenant_id, kind, origin_id)
                .await?
                .ok_or_else(|| AppError::UniqueConstraintViolation("Fatura".into()));
        };

        for line in &lines {
            self.repo.insert_item(&mut *tx, tenant_id, invoice.id, line).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "🧾 Fatura {} ({:?}) emitida: {} itens, total {}",
            invoice.id,
            kind,
            lines.len(),
            total
        );

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "CREATE_INVOICE", "invoice")
                .object(invoice.id)
                .details(json!({ "kind": kind, "originId": origin_id, "total": total })),
        );

        Ok(invoice)
    }

    pub async fn add_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        invoice_id: Uuid,
        item: ManualItem,
    ) -> Result<InvoiceItem, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let invoice = self.locked_invoice(&mut *tx, tenant_id, invoice_id).await?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(AppError::InvoiceCancelled);
        }
        if !item.origin.matches(invoice.kind) {
            return Err(AppError::ItemOriginMismatch);
        }

        let (consultation_item_id, plan_item_id) = match item.origin {
            InvoiceItemOrigin::ConsultationItem => (item.origin_item_id, None),
            InvoiceItemOrigin::PlanItem => (None, item.origin_item_id),
        };
        let line = NewInvoiceItem {
            origin: item.origin,
            consultation_item_id,
            plan_item_id,
            procedure_id: item.procedure_id,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.unit_price * Decimal::from(item.quantity),
        };

        let created = self.repo.insert_item(&mut *tx, tenant_id, invoice_id, &line).await?;
        let invoice = self.repo.add_to_total(&mut *tx, tenant_id, invoice_id, line.total).await?;
        self.refresh_status(&mut *tx, tenant_id, &invoice).await?;

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "ADD_INVOICE_ITEM", "invoice")
                .object(invoice_id)
                .details(json!({ "itemId": created.id, "total": line.total })),
        );

        Ok(created)
    }

    pub async fn cancel<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let invoice = self.locked_invoice(&mut *tx, tenant_id, invoice_id).await?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(AppError::InvoiceCancelled);
        }
        if self.paid_total(&mut *tx, tenant_id, invoice_id).await? > Decimal::ZERO {
            return Err(AppError::InvoiceHasPayments);
        }

        let cancelled = self
            .repo
            .set_status(&mut *tx, tenant_id, invoice_id, InvoiceStatus::Cancelled)
            .await?;
        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "CANCEL_INVOICE", "invoice").object(invoice_id),
        );

        Ok(cancelled)
    }

    // =========================================================================
    //  PARCELAS
    // =========================================================================

    pub async fn generate_installments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        actor_id: Uuid,
        invoice_id: Uuid,
        drafts: &[InstallmentDraft],
    ) -> Result<Vec<Installment>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let invoice = self.locked_invoice(&mut *tx, tenant_id, invoice_id).await?;
        let existing_installments = self.repo.count_installments(&mut *tx, tenant_id, invoice_id).await?;
        let existing_payments = self.repo.count_payments(&mut *tx, tenant_id, invoice_id).await?;
        check_installment_plan(&invoice, drafts, existing_installments, existing_payments)?;

        let mut installments = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let installment = self
                .repo
                .insert_installment(
                    &mut *tx,
                    tenant_id,
                    invoice_id,
                    draft.number,
                    draft.planned_amount,
                    draft.due_date,
                )
                .await?;
            installments.push(installment);
        }

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, actor_id, "GENERATE_INSTALLMENTS", "invoice")
                .object(invoice_id)
                .details(json!({ "count": installments.len() })),
        );

        Ok(installments)
    }

    /// Aplica um pagamento a uma parcela e propaga o estado à fatura.
    /// Corre na conexão/transação do chamador.
    pub async fn settle_installment(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        installment_id: Uuid,
        amount: InstallmentAmount,
        payment: &PaymentInput,
    ) -> Result<Installment, AppError> {
        let installment = self
            .repo
            .find_installment(&mut *conn, tenant_id, installment_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Parcela".into()))?;

        let invoice = self.locked_invoice(&mut *conn, tenant_id, installment.invoice_id).await?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(AppError::InvoiceCancelled);
        }

        let paid_amount = amount.resolve(installment.paid_amount);
        let status = InstallmentStatus::from_amounts(paid_amount, installment.planned_amount);

        let updated = self
            .repo
            .record_installment_payment(
                &mut *conn,
                tenant_id,
                installment_id,
                paid_amount,
                payment.paid_at.unwrap_or_else(Utc::now),
                payment.method,
                status,
                payment.notes.as_deref(),
            )
            .await?;

        self.refresh_status(&mut *conn, tenant_id, &invoice).await?;
        Ok(updated)
    }

    /// Pagamento direto de uma fatura sem parcelas, na transação do chamador.
    pub async fn settle_direct(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        invoice_id: Uuid,
        operator_id: Uuid,
        payment: &PaymentInput,
    ) -> Result<InvoicePayment, AppError> {
        let invoice = self.locked_invoice(&mut *conn, tenant_id, invoice_id).await?;
        let installment_count = self.repo.count_installments(&mut *conn, tenant_id, invoice_id).await?;
        check_direct_payment(&invoice, installment_count)?;

        let created = self
            .repo
            .insert_payment(
                &mut *conn,
                tenant_id,
                invoice_id,
                payment.amount,
                payment.method,
                payment.paid_at.unwrap_or_else(Utc::now),
                payment.notes.as_deref(),
                operator_id,
            )
            .await?;

        self.refresh_status(&mut *conn, tenant_id, &invoice).await?;
        Ok(created)
    }

    pub async fn pay_installment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        operator_id: Uuid,
        installment_id: Uuid,
        payment: PaymentInput,
        session_id: Option<Uuid>,
    ) -> Result<Installment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        if let Some(session_id) = session_id {
            self.open_session(&mut *tx, tenant_id, session_id).await?;
        }

        let installment = self
            .settle_installment(
                &mut *tx,
                tenant_id,
                installment_id,
                InstallmentAmount::Replace(payment.amount),
                &payment,
            )
            .await?;

        // Espelho no caixa
        if let Some(session_id) = session_id {
            self.cash_repo
                .insert_payment(
                    &mut *tx,
                    tenant_id,
                    session_id,
                    PaymentTarget::Installment(installment_id),
                    payment.amount,
                    payment.method,
                    operator_id,
                    installment.paid_at.unwrap_or_else(Utc::now),
                    payment.notes.as_deref(),
                )
                .await?;
        }

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, operator_id, "PAY_INSTALLMENT", "installment")
                .object(installment_id)
                .details(json!({
                    "amount": payment.amount,
                    "method": payment.method,
                    "sessionId": session_id,
                })),
        );

        Ok(installment)
    }

    pub async fn pay_invoice_direct<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        operator_id: Uuid,
        invoice_id: Uuid,
        payment: PaymentInput,
        session_id: Option<Uuid>,
    ) -> Result<InvoicePayment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        if let Some(session_id) = session_id {
            self.open_session(&mut *tx, tenant_id, session_id).await?;
        }

        let created = self
            .settle_direct(&mut *tx, tenant_id, invoice_id, operator_id, &payment)
            .await?;

        if let Some(session_id) = session_id {
            self.cash_repo
                .insert_payment(
                    &mut *tx,
                    tenant_id,
                    session_id,
                    PaymentTarget::Invoice(invoice_id),
                    payment.amount,
                    payment.method,
                    operator_id,
                    created.paid_at,
                    payment.notes.as_deref(),
                )
                .await?;
        }

        tx.commit().await?;

        self.audit.record(
            AuditRecord::new(tenant_id, operator_id, "PAY_INVOICE", "invoice")
                .object(invoice_id)
                .details(json!({
                    "amount": payment.amount,
                    "method": payment.method,
                    "sessionId": session_id,
                })),
        );

        Ok(created)
    }

    // =========================================================================
    //  CONSULTA
    // =========================================================================

    pub async fn list<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo.list(executor, tenant_id, filter).await
    }

    pub async fn details<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let header = self
            .repo
            .find(&mut *conn, tenant_id, invoice_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Fatura".into()))?;
        let patient_name = self.repo.patient_name(&mut *conn, tenant_id, header.patient_id).await?;
        let items = self.repo.list_items(&mut *conn, tenant_id, invoice_id).await?;
        let installments = self.repo.list_installments(&mut *conn, tenant_id, invoice_id).await?;
        let payments = self.repo.list_payments(&mut *conn, tenant_id, invoice_id).await?;

        let paid_total = installments.iter().map(|i| i.paid_amount).sum::<Decimal>()
            + payments.iter().map(|p| p.amount).sum::<Decimal>();

        Ok(InvoiceDetail {
            header,
            patient_name,
            items,
            installments,
            payments,
            paid_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn money(v: &str) -> Decimal {
        Decimal::from_str(v).unwrap()
    }

    fn invoice(kind: InvoiceKind, total: &str, status: InvoiceStatus) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            kind,
            consultation_id: None,
            plan_id: None,
            total: money(total),
            status,
            issued_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn drafts(amounts: &[&str]) -> Vec<InstallmentDraft> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| InstallmentDraft {
                number: i as i32 + 1,
                planned_amount: money(amount),
                due_date: NaiveDate::from_ymd_opt(2025, 4 + i as u32, 1).unwrap(),
            })
            .collect()
    }

    #[test]
    fn origin_must_match_kind() {
        let id = Uuid::new_v4();
        assert_eq!(check_origin(InvoiceKind::Consultation, Some(id), None).unwrap(), id);
        assert_eq!(check_origin(InvoiceKind::Plan, None, Some(id)).unwrap(), id);

        for (kind, consultation, plan) in [
            (InvoiceKind::Consultation, None, None),
            (InvoiceKind::Consultation, Some(id), Some(id)),
            (InvoiceKind::Consultation, None, Some(id)),
            (InvoiceKind::Plan, None, None),
            (InvoiceKind::Plan, Some(id), Some(id)),
            (InvoiceKind::Plan, Some(id), None),
        ] {
            assert!(matches!(
                check_origin(kind, consultation, plan),
                Err(AppError::InvoiceOriginMismatch(_))
            ));
        }
    }

    #[test]
    fn invoice_total_is_the_sum_of_its_lines() {
        let line = |total: &str| NewInvoiceItem {
            origin: InvoiceItemOrigin::ConsultationItem,
            consultation_item_id: Some(Uuid::new_v4()),
            plan_item_id: None,
            procedure_id: None,
            description: None,
            quantity: 1,
            unit_price: money(total),
            total: money(total),
        };
        assert_eq!(sum_lines(&[line("15.00"), line("35.50")]), money("50.50"));
        assert_eq!(sum_lines(&[]), Decimal::ZERO);
    }

    #[test]
    fn installments_must_be_positive_whole_cents() {
        let inv = invoice(InvoiceKind::Plan, "150.00", InvoiceStatus::Pending);

        // A soma bate, mas há uma parcela negativa
        match check_installment_plan(&inv, &drafts(&["200.00", "-50.00"]), 0, 0) {
            Err(AppError::InvalidInstallmentAmount { number, amount }) => {
                assert_eq!(number, 2);
                assert_eq!(amount, money("-50.00"));
            }
            other => panic!("esperava InvalidInstallmentAmount, veio {other:?}"),
        }

        // A soma bate ao milésimo, mas gravado em cêntimos daria 149.99
        match check_installment_plan(&inv, &drafts(&["50.004", "50.003", "49.993"]), 0, 0) {
            Err(AppError::InvalidInstallmentAmount { number, .. }) => assert_eq!(number, 1),
            other => panic!("esperava InvalidInstallmentAmount, veio {other:?}"),
        }

        assert!(matches!(
            check_installment_plan(&inv, &drafts(&["150.00", "0"]), 0, 0),
            Err(AppError::InvalidInstallmentAmount { number: 2, .. })
        ));
        assert!(check_installment_plan(&inv, &drafts(&["75.000", "75"]), 0, 0).is_ok());
    }

    #[test]
    fn installments_must_add_up_to_the_total() {
        let inv = invoice(InvoiceKind::Plan, "150.00", InvoiceStatus::Pending);
        assert!(check_installment_plan(&inv, &drafts(&["50", "50", "50"]), 0, 0).is_ok());

        match check_installment_plan(&inv, &drafts(&["50", "50", "49.99"]), 0, 0) {
            Err(AppError::InstallmentSumMismatch { expected, actual }) => {
                assert_eq!(expected, money("150.00"));
                assert_eq!(actual, money("149.99"));
            }
            other => panic!("esperava InstallmentSumMismatch, veio {other:?}"),
        }
    }

    #[test]
    fn installments_only_on_fresh_plan_invoices() {
        let consultation = invoice(InvoiceKind::Consultation, "150.00", InvoiceStatus::Pending);
        assert!(matches!(
            check_installment_plan(&consultation, &drafts(&["150"]), 0, 0),
            Err(AppError::InvoiceNotPlan)
        ));

        let plan = invoice(InvoiceKind::Plan, "150.00", InvoiceStatus::Pending);
        assert!(matches!(
            check_installment_plan(&plan, &drafts(&["150"]), 3, 0),
            Err(AppError::InstallmentsAlreadyDefined)
        ));
        assert!(matches!(
            check_installment_plan(&plan, &drafts(&["150"]), 0, 1),
            Err(AppError::InvoiceHasPayments)
        ));

        let cancelled = invoice(InvoiceKind::Plan, "150.00", InvoiceStatus::Cancelled);
        assert!(matches!(
            check_installment_plan(&cancelled, &drafts(&["150"]), 0, 0),
            Err(AppError::InvoiceCancelled)
        ));
    }

    #[test]
    fn direct_payment_rules() {
        let pending = invoice(InvoiceKind::Consultation, "80.00", InvoiceStatus::Pending);
        assert!(check_direct_payment(&pending, 0).is_ok());
        assert!(matches!(
            check_direct_payment(&pending, 2),
            Err(AppError::InvoiceHasInstallments)
        ));

        let paid = invoice(InvoiceKind::Consultation, "80.00", InvoiceStatus::Paid);
        assert!(matches!(check_direct_payment(&paid, 0), Err(AppError::InvoiceAlreadyPaid)));

        let cancelled = invoice(InvoiceKind::Consultation, "80.00", InvoiceStatus::Cancelled);
        assert!(matches!(check_direct_payment(&cancelled, 0), Err(AppError::InvoiceCancelled)));
    }

    #[test]
    fn installment_payment_replaces_but_cashier_accumulates() {
        let already = money("20.00");
        assert_eq!(InstallmentAmount::Replace(money("50.00")).resolve(already), money("50.00"));
        assert_eq!(InstallmentAmount::Add(money("30.00")).resolve(already), money("50.00"));
    }

    #[test]
    fn paying_three_installments_of_fifty() {
        // 150.00 em [50, 50, 50]: duas pagas => PARTIAL; a terceira => PAID
        let total = money("150.00");
        let planned = money("50.00");
        let mut paid = Decimal::ZERO;

        for _ in 0..2 {
            let amount = InstallmentAmount::Replace(planned).resolve(Decimal::ZERO);
            assert_eq!(InstallmentStatus::from_amounts(amount, planned), InstallmentStatus::Paid);
            paid += amount;
        }
        assert_eq!(InvoiceStatus::from_paid(paid, total), InvoiceStatus::Partial);

        paid += planned;
        assert_eq!(InvoiceStatus::from_paid(paid, total), InvoiceStatus::Paid);
    }

    // ---
    // Com base de dados
    // ---

    use crate::common::test_fixtures::{audit, seed_clinic, seed_consultation, Clinic};
    use sqlx::PgPool;
    use std::time::Duration;

    fn service(pool: &PgPool) -> InvoiceService {
        InvoiceService::new(
            InvoiceRepository::new(),
            ConsultationRepository::new(),
            TreatmentPlanRepository::new(),
            BudgetRepository::new(),
            CashRegisterRepository::new(),
            audit(pool),
        )
    }

    async fn issue(service: &InvoiceService, pool: &PgPool, clinic: &Clinic, consultation_id: Uuid) -> Invoice {
        let mut conn = pool.acquire().await.unwrap();
        service
            .create_invoice(
                &mut *conn,
                clinic.tenant_id,
                clinic.actor_id,
                clinic.patient_id,
                InvoiceKind::Consultation,
                Some(consultation_id),
                None,
            )
            .await
            .unwrap()
    }

    async fn invoices_for(pool: &PgPool, consultation_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE consultation_id = $1")
            .bind(consultation_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn consultation_invoice_is_issued_once(pool: PgPool) {
        let clinic = seed_clinic(&pool).await;
        let consultation_id = seed_consultation(&pool, &clinic, money("35.00")).await;
        let service = service(&pool);

        let first = issue(&service, &pool, &clinic, consultation_id).await;
        assert_eq!(first.total, money("35.00"));
        assert_eq!(first.status, InvoiceStatus::Pending);

        let second = issue(&service, &pool, &clinic, consultation_id).await;
        assert_eq!(second.id, first.id);
        assert_eq!(invoices_for(&pool, consultation_id).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_insert_is_skipped(pool: PgPool) {
        let clinic = seed_clinic(&pool).await;
        let consultation_id = seed_consultation(&pool, &clinic, money("35.00")).await;
        let repo = InvoiceRepository::new();

        for expected_new in [true, false] {
            let created = repo
                .create(
                    &pool,
                    clinic.tenant_id,
                    clinic.patient_id,
                    InvoiceKind::Consultation,
                    Some(consultation_id),
                    None,
                    money("35.00"),
                )
                .await
                .unwrap();
            assert_eq!(created.is_some(), expected_new);
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_issue_returns_the_committed_invoice(pool: PgPool) {
        let clinic = seed_clinic(&pool).await;
        let consultation_id = seed_consultation(&pool, &clinic, money("35.00")).await;
        let service = service(&pool);

        // A primeira emissão fica por confirmar enquanto a segunda avança
        let mut tx = pool.begin().await.unwrap();
        let winner = InvoiceRepository::new()
            .create(
                &mut *tx,
                clinic.tenant_id,
                clinic.patient_id,
                InvoiceKind::Consultation,
                Some(consultation_id),
                None,
                money("35.00"),
            )
            .await
            .unwrap()
            .unwrap();

        let (issued, ()) = tokio::join!(issue(&service, &pool, &clinic, consultation_id), async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            tx.commit().await.unwrap();
        });

        assert_eq!(issued.id, winner.id);
        assert_eq!(invoices_for(&pool, consultation_id).await, 1);
    }
}
