pub mod audit_repo;
pub use audit_repo::AuditRepository;
pub mod budget_repo;
pub use budget_repo::BudgetRepository;
pub mod cash_register_repo;
pub use cash_register_repo::CashRegisterRepository;
pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod consultation_repo;
pub use consultation_repo::ConsultationRepository;
pub mod invoice_repo;
pub use invoice_repo::InvoiceRepository;
pub mod treatment_plan_repo;
pub use treatment_plan_repo::TreatmentPlanRepository;
