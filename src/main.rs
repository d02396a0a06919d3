//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::{auth_guard, tenant_guard};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new().await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rota do utilizador (só exige token)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let catalog_routes = Router::new()
        .route("/procedures"
               ,post(handlers::catalog::create_procedure)
               .get(handlers::catalog::list_procedures)
        )
        .route("/entities"
               ,post(handlers::catalog::create_entity)
               .get(handlers::catalog::list_entities)
        )
        .route("/patients"
               ,post(handlers::catalog::create_patient)
               .get(handlers::catalog::list_patients)
        );

    let price_routes = Router::new()
        .route("/"
               ,put(handlers::prices::upsert_price)
               .get(handlers::prices::list_prices)
        )
        .route("/{procedure_id}/{entity_id}"
               ,get(handlers::prices::get_price)
               .put(handlers::prices::update_price)
               .delete(handlers::prices::delete_price)
        );

    let budget_routes = Router::new()
        .route("/"
               ,post(handlers::budgets::create_budget)
               .get(handlers::budgets::list_budgets)
        )
        .route("/{budget_id}"
               ,get(handlers::budgets::get_budget)
               .put(handlers::budgets::update_budget)
        )
        .route("/{budget_id}/itens", post(handlers::budgets::add_budget_item))
        .route("/{budget_id}/itens/{item_id}", delete(handlers::budgets::remove_budget_item))
        .route("/{budget_id}/estado", put(handlers::budgets::set_budget_status));

    let consultation_routes = Router::new()
        .route("/"
               ,post(handlers::consultations::create_consultation)
               .get(handlers::consultations::list_consultations)
        )
        .route("/{consultation_id}"
               ,get(handlers::consultations::get_consultation)
               .put(handlers::consultations::update_consultation)
        )
        .route("/{consultation_id}/itens", post(handlers::consultations::add_consultation_item))
        .route("/itens/{item_id}", delete(handlers::consultations::remove_consultation_item));

    let plan_routes = Router::new()
        .route("/paciente/{patient_id}", get(handlers::plans::get_active_plan))
        .route("/{plan_id}", get(handlers::plans::get_plan))
        .route("/itens/{item_id}/iniciar", post(handlers::plans::start_plan_item))
        .route("/itens/{item_id}/cancelar", post(handlers::plans::cancel_plan_item));

    let invoice_routes = Router::new()
        .route("/"
               ,post(handlers::invoices::create_invoice)
               .get(handlers::invoices::list_invoices)
        )
        .route("/{invoice_id}", get(handlers::invoices::get_invoice))
        .route("/{invoice_id}/itens", post(handlers::invoices::add_invoice_item))
        .route("/{invoice_id}/cancelar", post(handlers::invoices::cancel_invoice))
        .route("/{invoice_id}/parcelas", post(handlers::invoices::generate_installments))
        .route("/{invoice_id}/pagamento-direto", post(handlers::invoices::pay_invoice_direct))
        .route("/parcelas/{installment_id}/pagamento", post(handlers::invoices::pay_installment));

    let cash_routes = Router::new()
        .route("/sessions"
               ,post(handlers::cash_register::open_session)
               .get(handlers::cash_register::get_open_session)
        )
        .route("/sessions/{session_id}", get(handlers::cash_register::get_session))
        .route("/sessions/{session_id}/pending", get(handlers::cash_register::get_pending))
        .route("/sessions/{session_id}/payments", post(handlers::cash_register::register_payment))
        .route("/sessions/{session_id}/close", post(handlers::cash_register::close_session));

    // Tudo o que é da clínica passa pelo Auth + Tenancy
    let clinic_routes = Router::new()
        .nest("/catalog", catalog_routes)
        .nest("/precos", price_routes)
        .nest("/orcamentos", budget_routes)
        .nest("/consultas", consultation_routes)
        .nest("/planos", plan_routes)
        .nest("/faturas", invoice_routes)
        .nest("/caixa", cash_routes)
        .route("/auditoria", get(handlers::audit::list_audit))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            tenant_guard,
        ));

    let server_addr = app_state.config.server_addr.clone();

    let api_routes = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(user_routes)
        .merge(clinic_routes);

    // Combina tudo no router principal
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&server_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
