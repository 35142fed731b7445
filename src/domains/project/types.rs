use crate::domains::period::{PeriodRef, ReportingPeriodType};
use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::validation::{common, Validate, ValidationBuilder};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Longest supported project duration in years.
pub const MAX_DURATION_YEARS: u32 = 10;

/// Project entity - a funded multi-year project
///
/// The start date is immutable after creation; every derived period number
/// depends on it, so the update DTO simply has no start date field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub duration_years: u32,
    pub total_value: f64,
    pub funding_agency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Last day of the project: start + duration years - 1 day.
    pub fn end_date(&self) -> NaiveDate {
        self.start_date
            .checked_add_months(Months::new(self.duration_years * 12))
            .and_then(|d| d.checked_sub_days(Days::new(1)))
            .unwrap_or(self.start_date)
    }

    /// Calendar year in which the project's first financial year starts.
    pub fn first_financial_year(&self) -> i32 {
        if self.start_date.month() >= 4 {
            self.start_date.year()
        } else {
            self.start_date.year() - 1
        }
    }
}

/// NewProject DTO - used when creating a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub start_date: String,
    pub duration_years: u32,
    pub total_value: f64,
    pub funding_agency: Option<String>,
}

impl NewProject {
    pub fn parsed_start_date(&self) -> DomainResult<NaiveDate> {
        NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d").map_err(|_| {
            DomainError::Validation(ValidationError::format(
                "start_date",
                "Invalid date format. Expected YYYY-MM-DD",
            ))
        })
    }
}

impl Validate for NewProject {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .not_blank()
            .max_length(255)
            .validate()?;

        common::validate_date_format(&self.start_date, "start_date")?;

        ValidationBuilder::new("duration_years", Some(self.duration_years))
            .range(1, MAX_DURATION_YEARS)
            .validate()?;

        common::validate_non_negative_amount(self.total_value, "total_value")?;

        Ok(())
    }
}

/// UpdateProject DTO - the start date is deliberately absent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub duration_years: Option<u32>,
    pub total_value: Option<f64>,
    pub funding_agency: Option<String>,
}

impl Validate for UpdateProject {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ValidationBuilder::new("name", Some(name.clone()))
                .not_blank()
                .max_length(255)
                .validate()?;
        }

        if let Some(duration) = self.duration_years {
            ValidationBuilder::new("duration_years", Some(duration))
                .range(1, MAX_DURATION_YEARS)
                .validate()?;
        }

        if let Some(total_value) = self.total_value {
            common::validate_non_negative_amount(total_value, "total_value")?;
        }

        Ok(())
    }
}

/// ProjectRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub duration_years: i64,
    pub total_value: f64,
    pub funding_agency: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProjectRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<Project> {
        let id = Uuid::parse_str(&self.id).map_err(|_| {
            DomainError::Validation(ValidationError::format(
                "id",
                &format!("Invalid UUID format: {}", self.id),
            ))
        })?;
        let start_date = NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d").map_err(|_| {
            DomainError::Validation(ValidationError::format(
                "start_date",
                &format!("Invalid date format: {}", self.start_date),
            ))
        })?;
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

        Ok(Project {
            id,
            name: self.name,
            start_date,
            duration_years: self.duration_years.max(0) as u32,
            total_value: self.total_value,
            funding_agency: self.funding_agency,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

/// ProjectResponse DTO - used for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub duration_years: u32,
    pub total_value: f64,
    pub funding_agency: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        let end_date = project.end_date();
        Self {
            id: project.id,
            name: project.name,
            start_date: project.start_date.format("%Y-%m-%d").to_string(),
            end_date: end_date.format("%Y-%m-%d").to_string(),
            duration_years: project.duration_years,
            total_value: project.total_value,
            funding_agency: project.funding_agency,
            created_at: project.created_at.to_rfc3339(),
            updated_at: project.updated_at.to_rfc3339(),
        }
    }
}

/// The reporting period a project is currently in, for form pre-selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentPeriodResponse {
    pub period_type: ReportingPeriodType,
    pub year_index: i32,
    pub period_number: u32,
    pub label: String,
    pub window_start: String,
    pub window_end: String,
}

impl CurrentPeriodResponse {
    pub fn new(
        period_type: ReportingPeriodType,
        period: PeriodRef,
        label: String,
        window: (NaiveDate, NaiveDate),
    ) -> Self {
        Self {
            period_type,
            year_index: period.year_index,
            period_number: period.period_number,
            label,
            window_start: window.0.format("%Y-%m-%d").to_string(),
            window_end: window.1.format("%Y-%m-%d").to_string(),
        }
    }
}
