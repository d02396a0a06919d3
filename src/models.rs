pub mod audit;
pub mod auth;
pub mod budget;
pub mod cash_register;
pub mod catalog;
pub mod consultation;
pub mod invoice;
pub mod treatment_plan;
