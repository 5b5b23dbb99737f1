//! Server identity and site KDL parsing.

use anyhow::{Context, Result};
use tracing::trace;

use crate::server::{split_names, ServerSettings, SiteConfig};

use super::helpers::{
    get_bool_entry, get_first_arg_string, get_repeated_strings, get_string_args,
    get_string_entry,
};

/// Parse the `server { ... }` block
pub fn parse_server_config(node: &kdl::KdlNode) -> Result<ServerSettings> {
    trace!("Parsing server configuration block");

    let public_ip = get_string_entry(node, "public-ip")
        .map(|ip| {
            ip.parse()
                .with_context(|| format!("server 'public-ip' is not an IP address: {}", ip))
        })
        .transpose()?;

    // Either separate arguments or one comma/space separated string
    let additional_names = get_string_args(node, "additional-names")
        .unwrap_or_default()
        .iter()
        .flat_map(|raw| split_names(raw))
        .collect();

    let config = ServerSettings {
        name: get_string_entry(node, "name").unwrap_or_default(),
        public_ip,
        additional_names,
        admin_email: get_string_entry(node, "admin-email"),
    };

    trace!(
        name = %config.name,
        additional = config.additional_names.len(),
        "Parsed server configuration"
    );

    Ok(config)
}

/// Parse a `site "<id>" { ... }` block
pub fn parse_site(node: &kdl::KdlNode) -> Result<SiteConfig> {
    let id = get_first_arg_string(node)
        .ok_or_else(|| anyhow::anyhow!("site block requires an identifier argument"))?;
    trace!(site = %id, "Parsing site block");

    let domain = get_string_entry(node, "domain")
        .ok_or_else(|| anyhow::anyhow!("site '{}' has no 'domain'", id))?;

    Ok(SiteConfig {
        domain: domain.to_ascii_lowercase(),
        aliases: get_repeated_strings(node, "alias")
            .into_iter()
            .map(|a| a.to_ascii_lowercase())
            .collect(),
        admin_email: get_string_entry(node, "admin-email"),
        active: get_bool_entry(node, "active").unwrap_or(true),
        ssl: get_bool_entry(node, "ssl").unwrap_or(true),
        id,
    })
}
