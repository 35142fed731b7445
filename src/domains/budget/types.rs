use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::validation::{common, Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// BudgetEntry entity - allocation for one field in one project year
///
/// At most one entry exists per (project, field, year); re-saving replaces
/// the amount rather than accumulating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetEntry {
    pub id: Uuid,
    pub project_id: Uuid,
    pub field_id: Uuid,
    pub year_index: u32,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewBudgetEntry DTO - one (field, year, amount) cell of the budget table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudgetEntry {
    pub field_id: Uuid,
    pub year_index: u32,
    pub amount: f64,
}

impl Validate for NewBudgetEntry {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("field_id", Some(self.field_id))
            .not_nil()
            .validate()?;

        ValidationBuilder::new("year_index", Some(self.year_index))
            .min(1)
            .validate()?;

        common::validate_non_negative_amount(self.amount, "amount")?;

        Ok(())
    }
}

/// BudgetEntryRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct BudgetEntryRow {
    pub id: String,
    pub project_id: String,
    pub field_id: String,
    pub year_index: i64,
    pub amount: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl BudgetEntryRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<BudgetEntry> {
        let parse_uuid = |s: &str, field_name: &str| {
            Uuid::parse_str(s).map_err(|_| {
                DomainError::Validation(ValidationError::format(
                    field_name,
                    &format!("Invalid UUID format: {}", s),
                ))
            })
        };
        let parse_datetime = |s: &str, field_name: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| {
                    DomainError::Validation(ValidationError::format(
                        field_name,
                        &format!("Invalid RFC3339 format: {}", s),
                    ))
                })
        };

        Ok(BudgetEntry {
            id: parse_uuid(&self.id, "id")?,
            project_id: parse_uuid(&self.project_id, "project_id")?,
            field_id: parse_uuid(&self.field_id, "field_id")?,
            year_index: self.year_index.max(0) as u32,
            amount: self.amount,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

/// One row of the year-wise budget table for a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetTableRow {
    pub field_id: Uuid,
    pub field_name: String,
    /// Amount per project year, index 0 = year 1; None where no entry exists.
    pub yearly_amounts: Vec<Option<f64>>,
    pub field_total: f64,
}

/// The full budget table: rows per mapped field plus column totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetTable {
    pub project_id: Uuid,
    pub duration_years: u32,
    pub rows: Vec<BudgetTableRow>,
    pub year_totals: Vec<f64>,
    pub grand_total: f64,
}
