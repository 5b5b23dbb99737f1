//! Site validation
//!
//! Checks that site identifiers are unique and that no domain is claimed by
//! two sites, which would make hostname splitting ambiguous.

use std::collections::HashMap;

use validator::ValidateEmail;

use super::{ErrorCategory, ValidationError, ValidationResult};
use crate::Config;

/// Validate configured sites
pub fn validate_sites(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut ids: HashMap<&str, usize> = HashMap::new();
    let mut owners: HashMap<&str, &str> = HashMap::new();

    for site in &config.sites {
        *ids.entry(site.id.as_str()).or_default() += 1;

        if site.id.is_empty() || site.id.contains(['/', '\\']) || site.id.starts_with('.') {
            result.add_error(ValidationError::new(
                ErrorCategory::Site,
                format!("Site id '{}' cannot be used as a directory name", site.id),
            ));
        }

        if site.id == certkeep_common::SYSTEM_SITE {
            result.add_error(ValidationError::new(
                ErrorCategory::Site,
                format!("Site id '{}' is reserved for the system certificate", site.id),
            ));
        }

        for domain in site.domains() {
            if let Some(owner) = owners.insert(domain, site.id.as_str()) {
                if owner != site.id {
                    result.add_error(ValidationError::new(
                        ErrorCategory::Site,
                        format!(
                            "Domain '{}' is claimed by both '{}' and '{}'",
                            domain, owner, site.id
                        ),
                    ));
                }
            }
        }

        if let Some(ref email) = site.admin_email {
            if !email.validate_email() {
                result.add_error(ValidationError::new(
                    ErrorCategory::Email,
                    format!("Site '{}' admin-email '{}' is not valid", site.id, email),
                ));
            }
        }
    }

    let mut duplicates: Vec<_> = ids
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    duplicates.sort_unstable();
    for id in duplicates {
        result.add_error(ValidationError::new(
            ErrorCategory::Site,
            format!("Site '{}' is defined more than once", id),
        ));
    }

    result
}
