pub mod audit_service;
pub mod auth;
pub mod budget_service;
pub mod cash_register_service;
pub mod catalog_service;
pub mod consultation_service;
pub mod events;
pub mod invoice_service;
pub mod pricing_service;
pub mod treatment_plan_service;
