use crate::domains::budget::types::BudgetEntry;
use crate::domains::expenditure::types::ExpenditureEntry;
use crate::domains::grant::types::GrantEntry;
use crate::domains::period::{PeriodKey, ReportingPeriodType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// A mapped field with its lifetime grant total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldGrantTotal {
    pub field_id: Uuid,
    pub field_name: String,
    pub is_custom: bool,
    pub total_received: f64,
}

/// One summary row: every lifetime total for a field, plus the balance
///
/// A negative balance is a reported over-spend state, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFinanceSummary {
    pub field_id: Uuid,
    pub field_name: String,
    pub total_budget: f64,
    pub total_grant: f64,
    pub total_expenditure: f64,
    pub balance: f64,
}

/// Column/row sums across the fields actually displayed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryTotals {
    pub total_budget: f64,
    pub total_grant: f64,
    pub total_expenditure: f64,
    pub balance: f64,
}

/// Budget-vs-expenditure view for a (possibly paginated) set of fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetVsExpenditureSummary {
    pub project_id: Uuid,
    pub rows: Vec<FieldFinanceSummary>,
    /// Sums of the rows above - the displayed set, not the global one.
    pub totals: SummaryTotals,
}

/// One column of the period-wise report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodColumn {
    pub year_index: i32,
    pub period_type: ReportingPeriodType,
    pub period_number: u32,
    pub label: String,
}

/// One field's expenditure across the report's period columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodwiseRow {
    pub field_id: Uuid,
    pub field_name: String,
    pub cells: Vec<f64>,
    pub row_total: f64,
}

/// Field-by-period expenditure matrix with row and column totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodwiseReport {
    pub project_id: Uuid,
    pub period_type: ReportingPeriodType,
    pub columns: Vec<PeriodColumn>,
    pub rows: Vec<PeriodwiseRow>,
    pub column_totals: Vec<f64>,
    pub grand_total: f64,
}

/// Lifetime totals per field, recomputed from raw ledger rows every time.
///
/// The `fields` slice fixes both the row set and the row order; ledger
/// rows for fields outside it are ignored, which is what lets a paginated
/// view sum only what it displays.
pub fn summarize_fields(
    fields: &[(Uuid, String)],
    budget: &[BudgetEntry],
    grants: &[GrantEntry],
    expenditure: &[ExpenditureEntry],
) -> Vec<FieldFinanceSummary> {
    let mut budget_totals: HashMap<Uuid, f64> = HashMap::new();
    for entry in budget {
        *budget_totals.entry(entry.field_id).or_default() += entry.amount;
    }
    let mut grant_totals: HashMap<Uuid, f64> = HashMap::new();
    for entry in grants {
        *grant_totals.entry(entry.field_id).or_default() += entry.amount;
    }
    let mut expenditure_totals: HashMap<Uuid, f64> = HashMap::new();
    for entry in expenditure {
        *expenditure_totals.entry(entry.field_id).or_default() += entry.amount;
    }

    fields
        .iter()
        .map(|(field_id, field_name)| {
            let total_budget = budget_totals.get(field_id).copied().unwrap_or(0.0);
            let total_grant = grant_totals.get(field_id).copied().unwrap_or(0.0);
            let total_expenditure = expenditure_totals.get(field_id).copied().unwrap_or(0.0);
            FieldFinanceSummary {
                field_id: *field_id,
                field_name: field_name.clone(),
                total_budget,
                total_grant,
                total_expenditure,
                balance: total_budget - total_expenditure,
            }
        })
        .collect()
}

/// Sum exactly the given rows into a grand-total row.
pub fn grand_totals(rows: &[FieldFinanceSummary]) -> SummaryTotals {
    let mut totals = SummaryTotals::default();
    for row in rows {
        totals.total_budget += row.total_budget;
        totals.total_grant += row.total_grant;
        totals.total_expenditure += row.total_expenditure;
        totals.balance += row.balance;
    }
    totals
}

/// The ordered period keys present in a set of entries for one scheme.
pub fn period_columns(
    entries: &[ExpenditureEntry],
    period_type: ReportingPeriodType,
) -> Vec<PeriodKey> {
    let keys: BTreeSet<PeriodKey> = entries
        .iter()
        .filter(|e| e.period_type == period_type)
        .map(|e| e.period_key())
        .collect();
    keys.into_iter().collect()
}

/// Per-field expenditure cells for the given period columns.
pub fn periodwise_cells(
    fields: &[(Uuid, String)],
    columns: &[PeriodKey],
    entries: &[ExpenditureEntry],
) -> Vec<PeriodwiseRow> {
    let mut cell_totals: HashMap<(Uuid, PeriodKey), f64> = HashMap::new();
    for entry in entries {
        *cell_totals
            .entry((entry.field_id, entry.period_key()))
            .or_default() += entry.amount;
    }

    fields
        .iter()
        .map(|(field_id, field_name)| {
            let cells: Vec<f64> = columns
                .iter()
                .map(|key| cell_totals.get(&(*field_id, *key)).copied().unwrap_or(0.0))
                .collect();
            let row_total = cells.iter().sum();
            PeriodwiseRow {
                field_id: *field_id,
                field_name: field_name.clone(),
                cells,
                row_total,
            }
        })
        .collect()
}
