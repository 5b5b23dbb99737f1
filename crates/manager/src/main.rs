//! Certkeep - Main entry point
//!
//! Command-line front end for certificate request, renewal, revocation and
//! periodic housekeeping.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use certkeep_common::{logging, LogFormat};
use certkeep_config::server::split_names;
use certkeep_config::Config;
use certkeep_manager::{
    CertManager, HostSpec, RenewOutcome, RequestOptions, RequestOutcome, SiteId,
    SystemCertificateAction,
};

/// Certkeep - Automated TLS certificates for hosted sites
#[derive(Parser, Debug)]
#[command(name = "certkeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(
        short = 'c',
        long = "config",
        env = "CERTKEEP_CONFIG",
        default_value = "/etc/certkeep/certkeep.kdl"
    )]
    config: String,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,

    /// Log output format: text or json
    #[arg(long = "log-format", env = "CERTKEEP_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register, renew expiring certificates and keep the system certificate current
    Housekeeping,
    /// Request and install a certificate for a site
    Request {
        site: String,
        /// Hostnames to cover (comma or space separated lists are accepted)
        #[arg(required = true)]
        hosts: Vec<String>,
        /// Skip the DNS ownership check
        #[arg(long = "no-verify-ip")]
        no_verify_ip: bool,
        /// Abort when any hostname fails the ownership check
        #[arg(long = "strict")]
        strict: bool,
    },
    /// Renew the installed certificate for the same hostnames
    Renew { site: String },
    /// Add hostnames to a site's certificate
    Append {
        site: String,
        #[arg(required = true)]
        hosts: Vec<String>,
        /// Skip the DNS ownership check
        #[arg(long = "no-verify-ip")]
        no_verify_ip: bool,
    },
    /// Revoke a site's certificate and remove its storage
    Revoke { site: String },
    /// Show storage and installation state of a site
    Status { site: String },
    /// Validate configuration file and exit
    Test,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    let config = Config::from_file(&cli.config).context("Failed to load configuration file")?;

    let ok = match cli.command {
        Commands::Test => test_config(&cli.config, &config)?,
        command => run(&build_manager(&config)?, command)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn build_manager(config: &Config) -> Result<CertManager> {
    config
        .validate()
        .context("Configuration validation failed")?;
    CertManager::from_config(config).context("Failed to initialize certificate manager")
}

/// Run a lifecycle command; `false` when the operation failed
fn run(manager: &CertManager, command: Commands) -> Result<bool> {
    let ok = match command {
        Commands::Test => true,
        Commands::Housekeeping => housekeeping(manager)?,
        Commands::Request {
            site,
            hosts,
            no_verify_ip,
            strict,
        } => {
            let specs: Vec<HostSpec> = expand_hosts(&hosts).into_iter().map(HostSpec::Raw).collect();
            let opts = RequestOptions {
                verify_ip: !no_verify_ip,
                strict,
            };
            report_request(&manager.issuer(SiteId::new(site)).request(&specs, opts))
        }
        Commands::Renew { site } => report_renew(manager.issuer(SiteId::new(site)).renew(true)),
        Commands::Append {
            site,
            hosts,
            no_verify_ip,
        } => {
            let outcome = manager
                .issuer(SiteId::new(site))
                .append(&expand_hosts(&hosts), !no_verify_ip);
            report_request(&outcome)
        }
        Commands::Revoke { site } => {
            let site = SiteId::new(site);
            manager
                .issuer(site.clone())
                .revoke()
                .with_context(|| format!("Failed to revoke certificate for {}", site))?;
            println!("{}: certificate revoked", site);
            true
        }
        Commands::Status { site } => {
            print_status(manager, SiteId::new(site))?;
            true
        }
    };
    Ok(ok)
}

fn expand_hosts(hosts: &[String]) -> Vec<String> {
    hosts.iter().flat_map(|h| split_names(h)).collect()
}

/// Validate configuration and exit
fn test_config(path: &str, config: &Config) -> Result<bool> {
    let result = config
        .validate()
        .context("Configuration validation failed")?;

    info!("Configuration test successful:");
    info!("  - {} site(s)", config.sites.len());
    info!("  - {} warning(s)", result.warnings.len());
    info!("  - ACME server {}", config.acme.active_server());

    println!("certkeep: configuration file {} test is successful", path);
    Ok(true)
}

fn housekeeping(manager: &CertManager) -> Result<bool> {
    let report = manager
        .scheduler()
        .housekeeping()
        .context("Housekeeping failed")?;

    if !report.supported {
        println!("ACME certificates are not supported on this platform version");
        return Ok(true);
    }

    for site in &report.renewed {
        println!("{}: renewed", site);
    }
    for site in &report.pruned {
        println!("{}: SSL disabled, stored certificate removed", site);
    }
    for (site, reason) in &report.skipped {
        println!("{}: skipped ({})", site, reason);
    }
    for (site, error) in &report.failed {
        println!("{}: FAILED ({})", site, error);
    }
    match &report.system_certificate {
        SystemCertificateAction::Issued { hostnames, reason } => {
            println!("system: issued for {} ({})", hostnames.join(", "), reason)
        }
        SystemCertificateAction::Failed { reason, error } => {
            println!("system: FAILED ({}: {})", reason, error)
        }
        SystemCertificateAction::Current | SystemCertificateAction::NotChecked => {}
    }

    Ok(!report.has_failures())
}

fn report_request(outcome: &RequestOutcome) -> bool {
    match outcome {
        RequestOutcome::Installed { hostnames } => {
            println!("Installed certificate for {}", hostnames.join(", "));
            true
        }
        RequestOutcome::NoEligibleHosts => {
            warn!("No valid hostnames to request");
            println!("Nothing requested: no hostname passed validation");
            true
        }
        RequestOutcome::Failed(e) => {
            eprintln!("Certificate request failed: {}", e);
            false
        }
    }
}

fn report_renew(outcome: RenewOutcome) -> bool {
    match outcome {
        RenewOutcome::Renewed { hostnames } => {
            println!("Renewed certificate for {}", hostnames.join(", "));
            true
        }
        RenewOutcome::NotManaged { reason } => {
            println!("Not renewed: {}", reason);
            true
        }
        RenewOutcome::NoEligibleHosts => {
            println!("Not renewed: no valid hostnames to renew");
            true
        }
        RenewOutcome::Failed(e) => {
            eprintln!("Renewal failed: {}", e);
            false
        }
    }
}

fn print_status(manager: &CertManager, site: SiteId) -> Result<()> {
    let status = manager
        .issuer(site.clone())
        .status()
        .with_context(|| format!("Failed to read certificate status for {}", site))?;

    println!("site:       {}", status.site);
    println!("permitted:  {}", manager.permitted(&site));
    println!(
        "storage:    {} ({})",
        status.storage_path.display(),
        if status.storage_exists { "present" } else { "absent" }
    );
    println!("issued:     {}", status.issued);
    match &status.installed {
        Some(info) => {
            println!("installed:  {}", info.sans.join(", "));
            println!("expires:    {}", info.not_after);
            println!("managed:    {}", status.managed);
        }
        None => println!("installed:  none"),
    }
    Ok(())
}
