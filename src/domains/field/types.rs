use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// BudgetField entity - a named expenditure category
///
/// Default fields are seeded once and shared across all projects; custom
/// fields belong to the project that created them via the mapping table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetField {
    pub id: Uuid,
    pub name: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewBudgetField DTO - used when creating a custom field for a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudgetField {
    pub name: String,
}

impl Validate for NewBudgetField {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .not_blank()
            .max_length(120)
            .validate()
    }
}

/// BudgetFieldRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct BudgetFieldRow {
    pub id: String,
    pub name: String,
    pub is_default: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl BudgetFieldRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<BudgetField> {
        let id = Uuid::parse_str(&self.id).map_err(|_| {
            DomainError::Validation(ValidationError::format(
                "id",
                &format!("Invalid UUID format: {}", self.id),
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

        Ok(BudgetField {
            id,
            name: self.name,
            is_default: self.is_default != 0,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

/// A field as seen from one project: mapping state included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetFieldResponse {
    pub id: Uuid,
    pub name: String,
    pub is_default: bool,
    pub is_custom: bool,
    pub is_mapped: bool,
}

impl BudgetFieldResponse {
    pub fn from_field(field: BudgetField, is_custom: bool, is_mapped: bool) -> Self {
        Self {
            id: field.id,
            name: field.name,
            is_default: field.is_default,
            is_custom,
            is_mapped,
        }
    }
}

/// One (project, field) mapping row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFieldMapping {
    pub id: Uuid,
    pub project_id: Uuid,
    pub field_id: Uuid,
    pub is_custom: bool,
    pub created_at: DateTime<Utc>,
}

/// ProjectFieldMappingRow - SQLite row representation
#[derive(Debug, Clone, FromRow)]
pub struct ProjectFieldMappingRow {
    pub id: String,
    pub project_id: String,
    pub field_id: String,
    pub is_custom: i64,
    pub created_at: String,
}

impl ProjectFieldMappingRow {
    pub fn into_entity(self) -> DomainResult<ProjectFieldMapping> {
        let parse_uuid = |s: &str, field_name: &str| {
            Uuid::parse_str(s).map_err(|_| {
                DomainError::Validation(ValidationError::format(
                    field_name,
                    &format!("Invalid UUID format: {}", s),
                ))
            })
        };

        Ok(ProjectFieldMapping {
            id: parse_uuid(&self.id, "id")?,
            project_id: parse_uuid(&self.project_id, "project_id")?,
            field_id: parse_uuid(&self.field_id, "field_id")?,
            is_custom: self.is_custom != 0,
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
