pub mod types;
pub mod repository;
pub mod service;

pub use types::{
    BudgetField, BudgetFieldResponse, BudgetFieldRow, NewBudgetField, ProjectFieldMapping,
};
pub use repository::{BudgetFieldRepository, SqliteBudgetFieldRepository};
pub use service::{BudgetFieldService, BudgetFieldServiceImpl};
