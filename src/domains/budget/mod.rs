pub mod types;
pub mod repository;
pub mod service;

pub use types::{BudgetEntry, BudgetEntryRow, BudgetTable, BudgetTableRow, NewBudgetEntry};
pub use repository::{BudgetRepository, SqliteBudgetRepository};
pub use service::{BudgetService, BudgetServiceImpl};
