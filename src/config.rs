// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, sync::Arc, time::Duration};

use crate::{
    common::i18n::I18nStore,
    db::{
        AuditRepository, BudgetRepository, CashRegisterRepository, CatalogRepository,
        ConsultationRepository, InvoiceRepository, TreatmentPlanRepository,
    },
    services::{
        audit_service::AuditService, auth::AuthService, budget_service::BudgetService,
        cash_register_service::CashRegisterService, catalog_service::CatalogService,
        consultation_service::ConsultationService, events::EventDispatcher,
        invoice_service::InvoiceService, pricing_service::PricingService,
        treatment_plan_service::TreatmentPlanService,
    },
};

const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
}

impl Config {
    /// Lê a configuração do ambiente (o `.env` já deve estar carregado).
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string());

        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS inválido: {raw}"))?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };
        let acquire_secs = match env::var("DB_ACQUIRE_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("DB_ACQUIRE_TIMEOUT_SECS inválido: {raw}"))?,
            Err(_) => DEFAULT_ACQUIRE_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            server_addr,
            db_max_connections,
            db_acquire_timeout: Duration::from_secs(acquire_secs),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Config,
    pub i18n_store: Arc<I18nStore>,

    pub auth_service: AuthService,
    pub audit_service: AuditService,
    pub catalog_service: CatalogService,
    pub pricing_service: PricingService,
    pub budget_service: BudgetService,
    pub treatment_plan_service: TreatmentPlanService,
    pub consultation_service: ConsultationService,
    pub invoice_service: InvoiceService,
    pub cash_register_service: CashRegisterService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = Config::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let audit_service = AuditService::new(AuditRepository::new(), db_pool.clone());
        let auth_service = AuthService::new(config.jwt_secret.clone());

        let catalog_service = CatalogService::new(CatalogRepository::new(), audit_service.clone());
        let pricing_service = PricingService::new(CatalogRepository::new(), audit_service.clone());

        let budget_service = BudgetService::new(
            BudgetRepository::new(),
            catalog_service.clone(),
            pricing_service.clone(),
            audit_service.clone(),
        );

        let treatment_plan_service = TreatmentPlanService::new(
            TreatmentPlanRepository::new(),
            BudgetRepository::new(),
            ConsultationRepository::new(),
            pricing_service.clone(),
            audit_service.clone(),
        );

        let consultation_service = ConsultationService::new(
            ConsultationRepository::new(),
            catalog_service.clone(),
            pricing_service.clone(),
            EventDispatcher::new(treatment_plan_service.clone()),
            audit_service.clone(),
        );

        let invoice_service = InvoiceService::new(
            InvoiceRepository::new(),
            ConsultationRepository::new(),
            TreatmentPlanRepository::new(),
            BudgetRepository::new(),
            CashRegisterRepository::new(),
            audit_service.clone(),
        );

        let cash_register_service = CashRegisterService::new(
            CashRegisterRepository::new(),
            invoice_service.clone(),
            audit_service.clone(),
        );

        Ok(Self {
            db_pool,
            config,
            i18n_store: Arc::new(I18nStore::default()),
            auth_service,
            audit_service,
            catalog_service,
            pricing_service,
            budget_service,
            treatment_plan_service,
            consultation_service,
            invoice_service,
            cash_register_service,
        })
    }
}
