//! Reporting period calculator.
//!
//! Pure calendar math shared by the expenditure ledger and the reporting
//! views: mapping a date to a (year, period) pair for either period scheme,
//! and the inverse (period to calendar window, period to display label).
//!
//! Financial years run April through March. Project quarters are counted
//! from the project's own start date, so their windows depend on nothing
//! but the start date and the quarter number.

pub mod clock;

pub use clock::{Clock, FixedClock, SystemClock};

use crate::errors::{DomainError, DomainResult, ValidationError};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reporting period scheme for expenditure entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReportingPeriodType {
    /// Fixed April-March financial year, quarters Q1 (Apr-Jun) .. Q4 (Jan-Mar).
    FinancialYear,
    /// Quarter counted from the project's start date.
    ProjectQuarter,
}

impl ReportingPeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingPeriodType::FinancialYear => "fy",
            ReportingPeriodType::ProjectQuarter => "pq",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fy" => Some(ReportingPeriodType::FinancialYear),
            "pq" => Some(ReportingPeriodType::ProjectQuarter),
            _ => None,
        }
    }
}

impl fmt::Display for ReportingPeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A (year, period) pair identifying one reporting period.
///
/// For `FinancialYear` the year is the calendar year the fiscal year starts
/// in; for `ProjectQuarter` it is the calendar year the quarter's project
/// year started in. `period_number` is 1-based and never 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodRef {
    pub year_index: i32,
    pub period_number: u32,
}

/// Total composite key for ordering period-wise report columns.
///
/// Ordering is (year, period type code lexical, period number). A project
/// uses one period type consistently, but the comparator stays total so
/// mixed data still sorts deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub year_index: i32,
    pub period_type: ReportingPeriodType,
    pub period_number: u32,
}

/// Upper bound on project-quarter numbers for a project duration.
pub fn max_project_quarters(duration_years: u32) -> u32 {
    // ceil(duration_years * 12 / 3)
    (duration_years * 12).div_ceil(3)
}

/// Derive the reporting period containing `today`.
///
/// Dates before the project start clamp to the project's first period;
/// the result never carries a zero or negative period number.
pub fn derive_current_period(
    period_type: ReportingPeriodType,
    start_date: NaiveDate,
    duration_years: u32,
    today: NaiveDate,
) -> PeriodRef {
    match period_type {
        ReportingPeriodType::FinancialYear => {
            let effective = if today < start_date { start_date } else { today };
            let month = effective.month();
            let year_index = if month >= 4 {
                effective.year()
            } else {
                effective.year() - 1
            };
            let period_number = match month {
                4..=6 => 1,
                7..=9 => 2,
                10..=12 => 3,
                _ => 4,
            };
            PeriodRef { year_index, period_number }
        }
        ReportingPeriodType::ProjectQuarter => {
            let months_elapsed = (today.year() - start_date.year()) * 12
                + (today.month() as i32 - start_date.month() as i32);
            // Clamp to the project lifetime so the derived pair always names
            // a real quarter: never before the first, never past the last.
            let last_quarter_offset = ((max_project_quarters(duration_years) - 1) * 3) as i32;
            let months_elapsed = months_elapsed.clamp(0, last_quarter_offset);
            let period_number = (months_elapsed / 3) as u32 + 1;
            let year_index = start_date.year() + months_elapsed / 12;
            PeriodRef { year_index, period_number }
        }
    }
}

/// Inclusive calendar window of a period.
///
/// Fails with a validation error if the (year, period) pair is not
/// well-formed: zero period numbers, fiscal quarters above 4, or a
/// project-quarter year that disagrees with the quarter number.
pub fn period_date_range(
    period_type: ReportingPeriodType,
    year_index: i32,
    period_number: u32,
    start_date: NaiveDate,
) -> DomainResult<(NaiveDate, NaiveDate)> {
    if period_number == 0 {
        return Err(DomainError::Validation(ValidationError::invalid_value(
            "period_number",
            "must be 1 or greater",
        )));
    }

    match period_type {
        ReportingPeriodType::FinancialYear => {
            if period_number > 4 {
                return Err(DomainError::Validation(ValidationError::range(
                    "period_number", 1, 4,
                )));
            }
            let (from, to) = match period_number {
                1 => (date(year_index, 4, 1), date(year_index, 6, 30)),
                2 => (date(year_index, 7, 1), date(year_index, 9, 30)),
                3 => (date(year_index, 10, 1), date(year_index, 12, 31)),
                _ => (date(year_index + 1, 1, 1), date(year_index + 1, 3, 31)),
            };
            Ok((from?, to?))
        }
        ReportingPeriodType::ProjectQuarter => {
            let offset = (period_number - 1) * 3;
            let implied_year = start_date.year() + (offset as i32) / 12;
            if year_index != implied_year {
                return Err(DomainError::Validation(ValidationError::invalid_value(
                    "year_index",
                    &format!("project quarter {} falls in year {}", period_number, implied_year),
                )));
            }
            let from = start_date
                .checked_add_months(Months::new(offset))
                .ok_or_else(|| DomainError::Internal("period window out of range".into()))?;
            let to = start_date
                .checked_add_months(Months::new(offset + 3))
                .and_then(|d| d.checked_sub_days(Days::new(1)))
                .ok_or_else(|| DomainError::Internal("period window out of range".into()))?;
            Ok((from, to))
        }
    }
}

/// True if `d` falls inside the period's calendar window.
pub fn period_contains(
    period_type: ReportingPeriodType,
    year_index: i32,
    period_number: u32,
    start_date: NaiveDate,
    d: NaiveDate,
) -> DomainResult<bool> {
    let (from, to) = period_date_range(period_type, year_index, period_number, start_date)?;
    Ok(d >= from && d <= to)
}

/// Human label for a period, e.g. "FY 2024-25 Q2 (Jul-Sep)" or
/// "PQ 6 (Jul 2024–Sep 2024)".
pub fn period_label(
    period_type: ReportingPeriodType,
    year_index: i32,
    period_number: u32,
    start_date: NaiveDate,
) -> DomainResult<String> {
    match period_type {
        ReportingPeriodType::FinancialYear => {
            let months = match period_number {
                1 => "Apr-Jun",
                2 => "Jul-Sep",
                3 => "Oct-Dec",
                4 => "Jan-Mar",
                _ => {
                    return Err(DomainError::Validation(ValidationError::range(
                        "period_number", 1, 4,
                    )))
                }
            };
            Ok(format!(
                "FY {}-{:02} Q{} ({})",
                year_index,
                (year_index + 1).rem_euclid(100),
                period_number,
                months
            ))
        }
        ReportingPeriodType::ProjectQuarter => {
            let (from, to) =
                period_date_range(period_type, year_index, period_number, start_date)?;
            Ok(format!(
                "PQ {} ({}–{})",
                period_number,
                from.format("%b %Y"),
                to.format("%b %Y")
            ))
        }
    }
}

/// Label derived from a `PeriodRef` pair.
pub fn period_ref_label(
    period_type: ReportingPeriodType,
    period: PeriodRef,
    start_date: NaiveDate,
) -> DomainResult<String> {
    period_label(period_type, period.year_index, period.period_number, start_date)
}

fn date(year: i32, month: u32, day: u32) -> DomainResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DomainError::Internal(format!("invalid date {}-{}-{}", year, month, day)))
}
