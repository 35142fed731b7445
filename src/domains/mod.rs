pub mod budget;
pub mod core;
pub mod expenditure;
pub mod field;
pub mod grant;
pub mod period;
pub mod project;
pub mod reconciliation;
