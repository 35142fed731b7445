pub mod types;
pub mod repository;
pub mod service;

pub use types::{
    group_by_period, group_by_year, BulkExpenditureRow, BulkExpenditureSubmission,
    ExpenditureEntry, ExpenditureEntryResponse, ExpenditureEntryRow, NewExpenditureEntry,
    PeriodGroup, YearGroup,
};
pub use repository::{ExpenditureRepository, SqliteExpenditureRepository};
pub use service::{ExpenditureService, ExpenditureServiceImpl};
