//! Configuration validation.
//!
//! Validation never stops at the first problem: every check contributes to a
//! [`ValidationResult`] so operators see all errors in one pass.

mod acme;
mod lint;
mod sites;

pub use acme::validate_acme;
pub use lint::lint_config;
pub use sites::validate_sites;

use std::fmt;

use thiserror::Error;

use crate::Config;

/// Area of the configuration an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Acme,
    Server,
    Site,
    Email,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Acme => "acme",
            Self::Server => "server",
            Self::Site => "site",
            Self::Email => "email",
        };
        f.write_str(name)
    }
}

/// A configuration problem that prevents operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{category}] {message}")]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// A configuration choice worth flagging but not fatal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Collected errors and warnings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run every validator over the configuration
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut result = validate_acme(config);
    result.merge(validate_sites(config));
    result.merge(lint_config(config));
    result
}
