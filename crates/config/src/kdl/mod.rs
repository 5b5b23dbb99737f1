//! KDL configuration parsing.

mod acme;
mod helpers;
mod server;

use anyhow::Result;
use kdl::KdlDocument;
use tracing::{debug, warn};

use crate::Config;

/// Parse a whole configuration document
pub fn parse_document(text: &str) -> Result<Config> {
    let doc = text.parse::<KdlDocument>().map_err(|e| {
        let report = miette::Report::new(e).with_source_code(text.to_string());
        anyhow::anyhow!("{:?}", report)
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "acme" => config.acme = acme::parse_acme_config(node)?,
            "server" => config.server = server::parse_server_config(node)?,
            "site" => config.sites.push(server::parse_site(node)?),
            other => warn!(node = %other, "Ignoring unknown configuration node"),
        }
    }

    debug!(sites = config.sites.len(), "Parsed configuration document");
    Ok(config)
}
