use crate::domains::period::{PeriodKey, ReportingPeriodType};
use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::validation::{common, Validate, ValidationBuilder};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// ExpenditureEntry entity - one spend event against a field and period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenditureEntry {
    pub id: Uuid,
    pub project_id: Uuid,
    pub field_id: Uuid,
    pub year_index: i32,
    pub period_type: ReportingPeriodType,
    pub period_number: u32,
    pub amount: f64,
    pub expenditure_date: NaiveDate,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExpenditureEntry {
    pub fn period_key(&self) -> PeriodKey {
        PeriodKey {
            year_index: self.year_index,
            period_type: self.period_type,
            period_number: self.period_number,
        }
    }
}

/// NewExpenditureEntry DTO - used for single submissions and as the
/// normalized form of bulk rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpenditureEntry {
    pub field_id: Uuid,
    pub year_index: i32,
    pub period_type: ReportingPeriodType,
    pub period_number: u32,
    pub amount: f64,
    pub expenditure_date: String,
    pub remarks: Option<String>,
}

impl NewExpenditureEntry {
    pub fn parsed_date(&self) -> DomainResult<NaiveDate> {
        NaiveDate::parse_from_str(&self.expenditure_date, "%Y-%m-%d").map_err(|_| {
            DomainError::Validation(ValidationError::format(
                "expenditure_date",
                "Invalid date format. Expected YYYY-MM-DD",
            ))
        })
    }
}

impl Validate for NewExpenditureEntry {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("field_id", Some(self.field_id))
            .not_nil()
            .validate()?;

        ValidationBuilder::new("period_number", Some(self.period_number))
            .min(1)
            .validate()?;

        common::validate_date_format(&self.expenditure_date, "expenditure_date")?;

        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(DomainError::Validation(ValidationError::invalid_value(
                "amount",
                "must be a positive amount",
            )));
        }

        Ok(())
    }
}

/// One row of a bulk expenditure form: a blank or zero amount means the
/// row was left empty and is skipped, not stored as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkExpenditureRow {
    pub field_id: Uuid,
    pub amount: Option<f64>,
    pub remarks: Option<String>,
}

impl BulkExpenditureRow {
    pub fn is_blank(&self) -> bool {
        match self.amount {
            None => true,
            Some(a) => a == 0.0,
        }
    }
}

/// BulkExpenditureSubmission DTO - one period and date shared by rows
/// across several fields, submitted together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkExpenditureSubmission {
    pub year_index: i32,
    pub period_type: ReportingPeriodType,
    pub period_number: u32,
    pub expenditure_date: String,
    pub rows: Vec<BulkExpenditureRow>,
}

impl BulkExpenditureSubmission {
    /// Normalize the filled-in rows to single-entry DTOs. The mapping set
    /// is validated at submission time, not form-construction time.
    pub fn filled_rows(&self) -> Vec<NewExpenditureEntry> {
        self.rows
            .iter()
            .filter(|row| !row.is_blank())
            .map(|row| NewExpenditureEntry {
                field_id: row.field_id,
                year_index: self.year_index,
                period_type: self.period_type,
                period_number: self.period_number,
                amount: row.amount.unwrap_or(0.0),
                expenditure_date: self.expenditure_date.clone(),
                remarks: row.remarks.clone(),
            })
            .collect()
    }
}

impl Validate for BulkExpenditureSubmission {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("period_number", Some(self.period_number))
            .min(1)
            .validate()?;

        common::validate_date_format(&self.expenditure_date, "expenditure_date")?;

        if self.rows.is_empty() {
            return Err(DomainError::Validation(ValidationError::required("rows")));
        }

        if self.filled_rows().is_empty() {
            return Err(DomainError::Validation(ValidationError::invalid_value(
                "rows",
                "at least one row must carry an amount",
            )));
        }

        Ok(())
    }
}

/// ExpenditureEntryRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct ExpenditureEntryRow {
    pub id: String,
    pub project_id: String,
    pub field_id: String,
    pub year_index: i64,
    pub period_type: String,
    pub period_number: i64,
    pub amount: f64,
    pub expenditure_date: String,
    pub remarks: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ExpenditureEntryRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<ExpenditureEntry> {
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

        let period_type = ReportingPeriodType::from_str(&self.period_type).ok_or_else(|| {
            DomainError::Validation(ValidationError::invalid_value(
                "period_type",
                &format!("unknown period type: {}", self.period_type),
            ))
        })?;

        Ok(ExpenditureEntry {
            id: parse_uuid(&self.id, "id")?,
            project_id: parse_uuid(&self.project_id, "project_id")?,
            field_id: parse_uuid(&self.field_id, "field_id")?,
            year_index: self.year_index as i32,
            period_type,
            period_number: self.period_number.max(0) as u32,
            amount: self.amount,
            expenditure_date: NaiveDate::parse_from_str(&self.expenditure_date, "%Y-%m-%d")
                .map_err(|_| {
                    DomainError::Validation(ValidationError::format(
                        "expenditure_date",
                        &format!("Invalid date format: {}", self.expenditure_date),
                    ))
                })?,
            remarks: self.remarks,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

/// ExpenditureEntryResponse DTO - used for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenditureEntryResponse {
    pub id: Uuid,
    pub field_id: Uuid,
    pub field_name: Option<String>,
    pub year_index: i32,
    pub period_type: ReportingPeriodType,
    pub period_number: u32,
    pub amount: f64,
    pub expenditure_date: String,
    pub remarks: Option<String>,
    pub created_at: String,
}

impl From<ExpenditureEntry> for ExpenditureEntryResponse {
    fn from(entry: ExpenditureEntry) -> Self {
        Self {
            id: entry.id,
            field_id: entry.field_id,
            field_name: None,
            year_index: entry.year_index,
            period_type: entry.period_type,
            period_number: entry.period_number,
            amount: entry.amount,
            expenditure_date: entry.expenditure_date.format("%Y-%m-%d").to_string(),
            remarks: entry.remarks,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

impl ExpenditureEntryResponse {
    pub fn with_field_name(mut self, name: String) -> Self {
        self.field_name = Some(name);
        self
    }
}

/// Entries of one period, in canonical column order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodGroup {
    pub year_index: i32,
    pub period_type: ReportingPeriodType,
    pub period_number: u32,
    pub entries: Vec<ExpenditureEntry>,
}

/// Entries of one year, ascending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearGroup {
    pub year_index: i32,
    pub entries: Vec<ExpenditureEntry>,
}

/// Group entries by their composite period key, in the canonical column
/// order: year, then period type code, then period number. The ordered
/// tuple key replaces any string-concatenation grouping scheme, so the
/// order is total with no parsing involved.
pub fn group_by_period(entries: Vec<ExpenditureEntry>) -> Vec<PeriodGroup> {
    let mut groups: BTreeMap<PeriodKey, Vec<ExpenditureEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.period_key()).or_default().push(entry);
    }

    groups
        .into_iter()
        .map(|(key, entries)| PeriodGroup {
            year_index: key.year_index,
            period_type: key.period_type,
            period_number: key.period_number,
            entries,
        })
        .collect()
}

/// Group entries by year, ascending.
pub fn group_by_year(entries: Vec<ExpenditureEntry>) -> Vec<YearGroup> {
    let mut groups: BTreeMap<i32, Vec<ExpenditureEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.year_index).or_default().push(entry);
    }

    groups
        .into_iter()
        .map(|(year_index, entries)| YearGroup { year_index, entries })
        .collect()
}
