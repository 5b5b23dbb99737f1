//! Configuration linting for risky but legal settings

use super::{ValidationResult, ValidationWarning};
use crate::Config;

/// Lint configuration for settings that are usually mistakes in production
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.acme.staging {
        result.add_warning(ValidationWarning::new(
            "Staging directory in use; issued certificates will not be trusted",
        ));
    }

    if !config.acme.verify_ip {
        result.add_warning(ValidationWarning::new(
            "verify-ip is off; hostnames not pointing here will fail issuance at the CA",
        ));
    }

    if config.acme.alt_form && !config.acme.verify_ip {
        result.add_warning(ValidationWarning::new(
            "alt-form has no effect while verify-ip is off",
        ));
    }

    if config.acme.client_timeout_secs == 0 {
        result.add_warning(ValidationWarning::new(
            "client-timeout-secs is 0; a hung ACME client blocks housekeeping forever",
        ));
    }

    if config.acme.default_email.is_none() && config.server.admin_email.is_none() {
        result.add_warning(ValidationWarning::new(
            "Neither acme default-email nor server admin-email is set; ACME registration will fail",
        ));
    }

    for site in config.sites.iter().filter(|s| !s.active) {
        result.add_warning(ValidationWarning::new(format!(
            "Site '{}' is inactive and will not be renewed",
            site.id
        )));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_registration_email() {
        let result = lint_config(&Config::default());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("registration"));
    }

    #[test]
    fn test_staging_and_verify_ip_warnings() {
        let mut config = Config::default();
        config.acme.staging = true;
        config.acme.verify_ip = false;
        config.acme.default_email = Some("hostmaster@example.net".to_string());

        let result = lint_config(&config);
        assert_eq!(result.warnings.len(), 3);
        assert!(result.is_ok());
    }
}
