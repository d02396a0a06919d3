// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Users ---
        handlers::auth::get_me,

        // --- Catalog ---
        handlers::catalog::create_procedure,
        handlers::catalog::list_procedures,
        handlers::catalog::create_entity,
        handlers::catalog::list_entities,
        handlers::catalog::create_patient,
        handlers::catalog::list_patients,

        // --- Pricing ---
        handlers::prices::upsert_price,
        handlers::prices::list_prices,
        handlers::prices::get_price,
        handlers::prices::update_price,
        handlers::prices::delete_price,

        // --- Budgets ---
        handlers::budgets::create_budget,
        handlers::budgets::list_budgets,
        handlers::budgets::get_budget,
        handlers::budgets::update_budget,
        handlers::budgets::add_budget_item,
        handlers::budgets::remove_budget_item,
        handlers::budgets::set_budget_status,

        // --- Consultations ---
        handlers::consultations::create_consultation,
        handlers::consultations::list_consultations,
        handlers::consultations::get_consultation,
        handlers::consultations::update_consultation,
        handlers::consultations::add_consultation_item,
        handlers::consultations::remove_consultation_item,

        // --- Treatment Plans ---
        handlers::plans::get_active_plan,
        handlers::plans::get_plan,
        handlers::plans::start_plan_item,
        handlers::plans::cancel_plan_item,

        // --- Invoices ---
        handlers::invoices::create_invoice,
        handlers::invoices::list_invoices,
        handlers::invoices::get_invoice,
        handlers::invoices::add_invoice_item,
        handlers::invoices::cancel_invoice,
        handlers::invoices::generate_installments,
        handlers::invoices::pay_installment,
        handlers::invoices::pay_invoice_direct,

        // --- Cash Register ---
        handlers::cash_register::open_session,
        handlers::cash_register::get_open_session,
        handlers::cash_register::get_session,
        handlers::cash_register::get_pending,
        handlers::cash_register::register_payment,
        handlers::cash_register::close_session,

        // --- Audit ---
        handlers::audit::list_audit,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::Principal,

            // --- Catalog ---
            models::catalog::Patient,
            models::catalog::PayerEntity,
            models::catalog::Procedure,
            models::catalog::Price,
            handlers::catalog::CreateProcedurePayload,
            handlers::catalog::CreateEntityPayload,
            handlers::catalog::CreatePatientPayload,
            handlers::prices::UpsertPricePayload,
            handlers::prices::UpdatePricePayload,

            // --- Budgets ---
            models::budget::BudgetStatus,
            models::budget::Budget,
            models::budget::BudgetItem,
            models::budget::BudgetDetail,
            handlers::budgets::CreateBudgetPayload,
            handlers::budgets::UpdateBudgetPayload,
            handlers::budgets::AddBudgetItemPayload,
            handlers::budgets::SetBudgetStatusPayload,

            // --- Consultations ---
            models::consultation::ConsultationStatus,
            models::consultation::Consultation,
            models::consultation::ConsultationItem,
            models::consultation::ConsultationDetail,
            handlers::consultations::CreateConsultationPayload,
            handlers::consultations::UpdateConsultationPayload,
            handlers::consultations::AddConsultationItemPayload,

            // --- Treatment Plans ---
            models::treatment_plan::PlanStatus,
            models::treatment_plan::PlanItemStatus,
            models::treatment_plan::TreatmentPlan,
            models::treatment_plan::PlanItem,
            models::treatment_plan::TreatmentPlanDetail,
            handlers::plans::StartPlanItemPayload,

            // --- Invoices ---
            models::invoice::InvoiceKind,
            models::invoice::InvoiceStatus,
            models::invoice::InvoiceItemOrigin,
            models::invoice::InstallmentStatus,
            models::invoice::PaymentMethod,
            models::invoice::Invoice,
            models::invoice::InvoiceItem,
            models::invoice::Installment,
            models::invoice::InvoicePayment,
            models::invoice::InvoiceDetail,
            models::invoice::InstallmentDraft,
            handlers::invoices::CreateInvoicePayload,
            handlers::invoices::AddInvoiceItemPayload,
            handlers::invoices::GenerateInstallmentsPayload,
            handlers::invoices::PaymentPayload,

            // --- Cash Register ---
            models::cash_register::CashSessionStatus,
            models::cash_register::CashSession,
            models::cash_register::CashierPayment,
            models::cash_register::PaymentHistoryEntry,
            models::cash_register::MethodTotals,
            models::cash_register::PaymentSummary,
            models::cash_register::CashSessionSummary,
            models::cash_register::PendingInvoice,
            models::cash_register::PendingInstallment,
            models::cash_register::PendingReceivables,
            handlers::cash_register::OpenSessionPayload,
            handlers::cash_register::RegisterPaymentPayload,
            handlers::cash_register::CloseSessionPayload,

            // --- Audit ---
            models::audit::AuditEntry,
        )
    ),
    tags(
        (name = "Users", description = "Dados do Utilizador autenticado"),
        (name = "Catalog", description = "Artigos, Entidades e Pacientes"),
        (name = "Pricing", description = "Tabela de Preços por Entidade"),
        (name = "Budgets", description = "Orçamentos"),
        (name = "Consultations", description = "Consultas e Procedimentos executados"),
        (name = "Treatment Plans", description = "Planos de Tratamento"),
        (name = "Invoices", description = "Faturas, Parcelas e Pagamentos"),
        (name = "Cash Register", description = "Sessões de Caixa e Reconciliação"),
        (name = "Audit", description = "Registo de Auditoria")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_billing_routes_with_bearer_scheme() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/faturas/parcelas/{installment_id}/pagamento"));
        assert!(doc.paths.paths.contains_key("/api/caixa/sessions/{session_id}/close"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}
