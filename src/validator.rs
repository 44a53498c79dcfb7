// src/validator.rs - Centralized validation module
use std::collections::BTreeMap;
use serde::Serialize;
use regex::Regex;
use lazy_static::lazy_static;
use chrono::NaiveDate;
use crate::error::ApiError;
use crate::models::OutgoingFormValues;

lazy_static! {
    static ref ORDER_DATE_REGEX: Regex = Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").unwrap();
    static ref TRUCK_NUMBER_REGEX: Regex = Regex::new(r"^[A-Za-z0-9 -]+$").unwrap();
    static ref RESOURCE_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap();
}

// ==================== VALIDATION RESULT ====================

#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    pub errors: BTreeMap<String, Vec<String>>,
    pub warnings: BTreeMap<String, Vec<String>>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Flat list of warning messages for views
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.values().flatten().cloned().collect()
    }

    pub fn to_api_error(&self) -> ApiError {
        let message = self.errors
            .iter()
            .map(|(field, errors)| format!("{}: {}", field, errors.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");

        ApiError::ValidationError(message)
    }
}

// ==================== FIELD VALIDATORS ====================

pub struct FieldValidator;

impl FieldValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err(format!("{} cannot be empty", field))
        } else {
            Ok(())
        }
    }

    pub fn order_date(value: &str) -> Result<NaiveDate, String> {
        parse_order_date(value).ok_or_else(|| "Order date must be a valid date in dd.mm.yyyy format".to_string())
    }

    /// Backend ids travel in URL paths, so only plain identifiers are accepted
    pub fn resource_id(value: &str, field: &str) -> Result<(), String> {
        if RESOURCE_ID_REGEX.is_match(value.trim()) {
            Ok(())
        } else {
            Err(format!("{} must be a plain identifier (letters, digits, '-' or '_')", field))
        }
    }

    pub fn truck_number(value: &str) -> Result<(), String> {
        let value = value.trim();
        if value.is_empty() || TRUCK_NUMBER_REGEX.is_match(value) {
            Ok(())
        } else {
            Err("Truck number may only contain letters, digits, spaces and dashes".to_string())
        }
    }
}

pub fn validate_farmer_storage_link_id(value: &str) -> Result<(), validator::ValidationError> {
    FieldValidator::resource_id(value, "Farmer").map_err(|message| {
        let mut error = validator::ValidationError::new("invalid_farmer_storage_link_id");
        error.message = Some(message.into());
        error
    })
}

// ==================== DATES ====================

/// Parses a console date typed as dd.mm.yyyy (single-digit day and month accepted)
pub fn parse_order_date(value: &str) -> Option<NaiveDate> {
    let caps = ORDER_DATE_REGEX.captures(value.trim())?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Midnight UTC timestamp the backend expects for a voucher date
pub fn to_backend_date(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

/// dd.mm.yyyy rendering used to prefill the order date
pub fn format_order_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

// ==================== CUSTOM VALIDATION ====================

pub trait CustomValidate {
    fn custom_validate(&self) -> ValidationResult;
}

impl CustomValidate for OutgoingFormValues {
    fn custom_validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = FieldValidator::not_empty(&self.farmer_storage_link_id, "Farmer") {
            result.add_error("farmer_storage_link_id", e);
        }

        if let Err(e) = FieldValidator::not_empty(&self.variety, "Variety") {
            result.add_error("variety", e);
        }

        if let Err(e) = FieldValidator::order_date(&self.order_date) {
            result.add_error("order_date", e);
        }

        if let Some(ref truck) = self.truck_number {
            if let Err(e) = FieldValidator::truck_number(truck) {
                result.add_error("truck_number", e);
            }
        }

        if self.from.as_deref().map(str::trim).unwrap_or("").is_empty()
            && self.to.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            result.add_warning("from", "Neither 'from' nor 'to' is filled in");
        }

        result
    }
}
