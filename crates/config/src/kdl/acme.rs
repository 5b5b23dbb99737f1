//! ACME block KDL parsing.

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::trace;

use crate::acme::AcmeSettings;

use super::helpers::{
    args, child, get_bool_entry, get_int_entry, get_string_args, get_string_entry,
};

/// Parse the `acme { ... }` block
pub fn parse_acme_config(node: &kdl::KdlNode) -> Result<AcmeSettings> {
    trace!("Parsing acme configuration block");
    let defaults = AcmeSettings::default();

    let client = match get_string_args(node, "client") {
        Some(client) if client.is_empty() => bail!("acme 'client' requires at least one argument"),
        Some(client) => client,
        None => defaults.client,
    };

    let platform_version = child(node, "platform-version")
        .and_then(|n| args(n).next())
        .and_then(|v| {
            v.as_string()
                .map(str::to_string)
                .or_else(|| v.as_integer().map(|i| i.to_string()))
        })
        .unwrap_or(defaults.platform_version);

    let settings = AcmeSettings {
        staging: get_bool_entry(node, "staging").unwrap_or(defaults.staging),
        client,
        storage: get_string_entry(node, "storage")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage),
        challenge_path: get_string_entry(node, "challenge-path")
            .map(PathBuf::from)
            .unwrap_or(defaults.challenge_path),
        install_root: get_string_entry(node, "install-root")
            .map(PathBuf::from)
            .unwrap_or(defaults.install_root),
        default_email: get_string_entry(node, "default-email"),
        fingerprint: get_string_entry(node, "fingerprint").unwrap_or(defaults.fingerprint),
        alt_form: get_bool_entry(node, "alt-form").unwrap_or(defaults.alt_form),
        verify_ip: get_bool_entry(node, "verify-ip").unwrap_or(defaults.verify_ip),
        renew_before_days: non_negative(node, "renew-before-days")?
            .map(|v| v as u32)
            .unwrap_or(defaults.renew_before_days),
        platform_version,
        client_timeout_secs: non_negative(node, "client-timeout-secs")?
            .map(|v| v as u64)
            .unwrap_or(defaults.client_timeout_secs),
        max_attempts: non_negative(node, "max-attempts")?
            .map(|v| v as u32)
            .unwrap_or(defaults.max_attempts),
    };

    trace!(
        staging = settings.staging,
        alt_form = settings.alt_form,
        verify_ip = settings.verify_ip,
        max_attempts = settings.max_attempts,
        "Parsed acme configuration"
    );

    Ok(settings)
}

fn non_negative(node: &kdl::KdlNode, name: &str) -> Result<Option<i128>> {
    match get_int_entry(node, name) {
        Some(v) if v < 0 || v > i128::from(u32::MAX) => {
            bail!("acme '{}' must be between 0 and {}, got {}", name, u32::MAX, v)
        }
        other => Ok(other),
    }
}
