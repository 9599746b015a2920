//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, rates finite)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Blob settings are only checked when capture is enabled
//! - Unknown store kinds are left to the capture factory, which fails on first use

use std::fmt;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.tracer.service_name.trim().is_empty() {
        errors.push(ValidationError::new("tracer.service_name", "must not be empty"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.blobs.enabled {
        let store = &config.blobs.store;

        if store.name.eq_ignore_ascii_case("agent") {
            if store.host.trim().is_empty() {
                errors.push(ValidationError::new("blobs.store.host", "required for the agent store"));
            }
            if store.port == 0 {
                errors.push(ValidationError::new("blobs.store.port", "required for the agent store"));
            }
            if store.timeout_ms == 0 {
                errors.push(ValidationError::new("blobs.store.timeout_ms", "must be greater than 0"));
            }
        }

        if let Some(rate) = config.blobs.rate_per_sec {
            if !rate.is_finite() {
                errors.push(ValidationError::new(
                    "blobs.rate_per_sec",
                    format!("must be a finite number, got {}", rate),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
