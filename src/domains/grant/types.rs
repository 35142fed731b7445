use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::validation::{common, Validate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// GrantEntry entity - one allocation of a grant receipt to a field
///
/// Entries accumulate and are never edited in place; a correction is a new
/// dated entry, which keeps the receipt history auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantEntry {
    pub id: Uuid,
    pub project_id: Uuid,
    pub field_id: Uuid,
    pub received_date: NaiveDate,
    pub amount: f64,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of a receipt's fan-out across fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantAllocation {
    pub field_id: Uuid,
    pub amount: f64,
}

/// NewGrantReceipt DTO - a single receipt allocated to one or more fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGrantReceipt {
    pub received_date: String,
    pub allocations: Vec<GrantAllocation>,
    pub remarks: Option<String>,
}

impl NewGrantReceipt {
    pub fn parsed_received_date(&self) -> DomainResult<NaiveDate> {
        NaiveDate::parse_from_str(&self.received_date, "%Y-%m-%d").map_err(|_| {
            DomainError::Validation(ValidationError::format(
                "received_date",
                "Invalid date format. Expected YYYY-MM-DD",
            ))
        })
    }

    /// Allocation rows that actually carry an amount. Zero rows come from
    /// blank form cells and are skipped, not stored.
    pub fn non_zero_allocations(&self) -> Vec<&GrantAllocation> {
        self.allocations.iter().filter(|a| a.amount > 0.0).collect()
    }
}

impl Validate for NewGrantReceipt {
    fn validate(&self) -> DomainResult<()> {
        common::validate_date_format(&self.received_date, "received_date")?;

        if self.allocations.is_empty() {
            return Err(DomainError::Validation(ValidationError::required(
                "allocations",
            )));
        }

        for allocation in &self.allocations {
            common::validate_non_negative_amount(allocation.amount, "amount")?;
        }

        // A receipt must allocate something
        if self.non_zero_allocations().is_empty() {
            return Err(DomainError::Validation(ValidationError::invalid_value(
                "allocations",
                "at least one allocation must be greater than zero",
            )));
        }

        Ok(())
    }
}

/// GrantEntryRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct GrantEntryRow {
    pub id: String,
    pub project_id: String,
    pub field_id: String,
    pub received_date: String,
    pub amount: f64,
    pub remarks: Option<String>,
    pub created_at: String,
}

impl GrantEntryRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<GrantEntry> {
        let parse_uuid = |s: &str, field_name: &str| {
            Uuid::parse_str(s).map_err(|_| {
                DomainError::Validation(ValidationError::format(
                    field_name,
                    &format!("Invalid UUID format: {}", s),
                ))
            })
        };

        Ok(GrantEntry {
            id: parse_uuid(&self.id, "id")?,
            project_id: parse_uuid(&self.project_id, "project_id")?,
            field_id: parse_uuid(&self.field_id, "field_id")?,
            received_date: NaiveDate::parse_from_str(&self.received_date, "%Y-%m-%d").map_err(
                |_| {
                    DomainError::Validation(ValidationError::format(
                        "received_date",
                        &format!("Invalid date format: {}", self.received_date),
                    ))
                },
            )?,
            amount: self.amount,
            remarks: self.remarks,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| {
                    DomainError::Validation(ValidationError::format(
                        "created_at",
                        &format!("Invalid RFC3339 format: {}", self.created_at),
                    ))
                })?,
        })
    }
}

/// GrantEntryResponse DTO - used for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantEntryResponse {
    pub id: Uuid,
    pub field_id: Uuid,
    pub field_name: Option<String>,
    pub received_date: String,
    pub amount: f64,
    pub remarks: Option<String>,
    pub created_at: String,
}

impl From<GrantEntry> for GrantEntryResponse {
    fn from(entry: GrantEntry) -> Self {
        Self {
            id: entry.id,
            field_id: entry.field_id,
            field_name: None,
            received_date: entry.received_date.format("%Y-%m-%d").to_string(),
            amount: entry.amount,
            remarks: entry.remarks,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

impl GrantEntryResponse {
    /// Add the mapped field's display name
    pub fn with_field_name(mut self, name: String) -> Self {
        self.field_name = Some(name);
        self
    }
}
