pub mod format;
pub mod types;
pub mod service;

pub use format::{format_amount, format_balance};
pub use types::{
    grand_totals, period_columns, periodwise_cells, summarize_fields,
    BudgetVsExpenditureSummary, FieldFinanceSummary, FieldGrantTotal, PeriodColumn,
    PeriodwiseReport, PeriodwiseRow, SummaryTotals,
};
pub use service::{ReconciliationService, ReconciliationServiceImpl};
