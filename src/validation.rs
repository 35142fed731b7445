use crate::errors::{DomainError, DomainResult, ValidationError};
use chrono::NaiveDate;
use sqlx::{query_scalar, SqlitePool};
use uuid::Uuid;

/// A trait that entities should implement for validation.
pub trait Validate {
    /// Validates the entity and returns an error if validation fails.
    fn validate(&self) -> DomainResult<()>;
}

/// Struct for configuring validations in a fluent style
#[derive(Default)]
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

/// Generic validation implementations
impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self
    where T: Default + PartialEq {
        if self.value.is_none() || self.value == Some(T::default()) {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    /// Complete validation and return result
    pub fn validate(self) -> DomainResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            // Return the first error for simplicity
            Err(DomainError::Validation(self.errors[0].clone()))
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    pub fn min_length(mut self, min: usize) -> Self {
        if let Some(value) = &self.value {
            if value.len() < min {
                self.errors.push(ValidationError::min_length(&self.field_name, min));
            }
        }
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        if let Some(value) = &self.value {
            if value.len() > max {
                self.errors.push(ValidationError::max_length(&self.field_name, max));
            }
        }
        self
    }

    pub fn not_blank(mut self) -> Self {
        if let Some(value) = &self.value {
            if value.trim().is_empty() {
                self.errors.push(ValidationError::required(&self.field_name));
            }
        }
        self
    }
}

/// Numeric validations
impl<T> ValidationBuilder<T>
where T: PartialOrd + Clone + std::fmt::Display
{
    pub fn min(mut self, min: T) -> Self {
        if let Some(value) = &self.value {
            if value < &min {
                self.errors.push(ValidationError::range(
                    &self.field_name,
                    min.to_string(),
                    "maximum".to_string()
                ));
            }
        }
        self
    }

    pub fn range(mut self, min: T, max: T) -> Self {
        if let Some(value) = &self.value {
            if value < &min || value > &max {
                self.errors.push(ValidationError::range(
                    &self.field_name,
                    min.to_string(),
                    max.to_string()
                ));
            }
        }
        self
    }
}

/// UUID validation helpers
impl ValidationBuilder<Uuid> {
    pub fn not_nil(mut self) -> Self {
        if let Some(value) = &self.value {
            if *value == Uuid::nil() {
                self.errors.push(ValidationError::invalid_value(
                    &self.field_name,
                    "cannot be a nil UUID"
                ));
            }
        }
        self
    }
}

/// Validation utility for checking entity exists in the database
pub async fn validate_entity_exists(
    pool: &SqlitePool,
    table: &str,
    id: &Uuid,
    field_name: &str,
) -> DomainResult<()> {
    let query = format!("SELECT COUNT(*) FROM {} WHERE id = ?", table);

    let count: i64 = query_scalar(&query)
        .bind(id.to_string())
        .fetch_one(pool)
        .await
        .map_err(|e| DomainError::Database(e.into()))?;

    if count == 0 {
        return Err(DomainError::Validation(
            ValidationError::relationship(&format!("{} does not exist", field_name))
        ));
    }

    Ok(())
}

/// Common validation utilities for frequently validated inputs
pub mod common {
    use super::*;

    pub async fn validate_project_exists(
        pool: &SqlitePool,
        project_id: &Uuid,
        field_name: &str,
    ) -> DomainResult<()> {
        validate_entity_exists(pool, "projects", project_id, field_name).await
    }

    /// Ledger writes require the (project, field) pair to be mapped first.
    pub async fn validate_field_mapped(
        pool: &SqlitePool,
        project_id: &Uuid,
        field_id: &Uuid,
    ) -> DomainResult<()> {
        let count: i64 = query_scalar(
            "SELECT COUNT(*) FROM project_field_mappings WHERE project_id = ? AND field_id = ?",
        )
        .bind(project_id.to_string())
        .bind(field_id.to_string())
        .fetch_one(pool)
        .await
        .map_err(|e| DomainError::Database(e.into()))?;

        if count == 0 {
            return Err(DomainError::Validation(ValidationError::relationship(
                "field is not mapped to this project",
            )));
        }

        Ok(())
    }

    pub fn validate_date_format(date_str: &str, field_name: &str) -> DomainResult<()> {
        match NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
            Ok(_) => Ok(()),
            Err(_) => Err(DomainError::Validation(ValidationError::format(
                field_name,
                "must be in the format YYYY-MM-DD",
            ))),
        }
    }

    pub fn validate_non_negative_amount(amount: f64, field_name: &str) -> DomainResult<()> {
        if amount.is_finite() && amount >= 0.0 {
            Ok(())
        } else {
            Err(DomainError::Validation(ValidationError::invalid_value(
                field_name,
                "must be a non-negative amount",
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_builder() {
        let result = ValidationBuilder::new("name", Some("".to_string()))
            .required()
            .validate();
        assert!(result.is_err());

        let result = ValidationBuilder::new("name", Some("test".to_string()))
            .required()
            .min_length(5)
            .validate();
        assert!(result.is_err());

        let result = ValidationBuilder::new("year_index", Some(0))
            .min(1)
            .validate();
        assert!(result.is_err());

        let result = ValidationBuilder::new("year_index", Some(2))
            .range(1, 5)
            .validate();
        assert!(result.is_ok());

        let value: Option<String> = None;
        let result = ValidationBuilder::new("name", value)
            .required()
            .validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_not_blank() {
        assert!(ValidationBuilder::new("name", Some("  ".to_string())).not_blank().validate().is_err());
        assert!(ValidationBuilder::new("name", Some("Equipment".to_string())).not_blank().validate().is_ok());
    }

    #[test]
    fn test_common_validations() {
        assert!(common::validate_date_format("2023-04-01", "date").is_ok());
        assert!(common::validate_date_format("01/04/2023", "date").is_err());

        assert!(common::validate_non_negative_amount(0.0, "amount").is_ok());
        assert!(common::validate_non_negative_amount(150000.0, "amount").is_ok());
        assert!(common::validate_non_negative_amount(-1.0, "amount").is_err());
        assert!(common::validate_non_negative_amount(f64::NAN, "amount").is_err());
    }
}
