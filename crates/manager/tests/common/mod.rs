//! Shared fixtures for lifecycle integration tests.
//!
//! Storage and installation run against real directories in a temp dir; the
//! ACME client, DNS and administrator mail are replaced by recording fakes.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, IsCa, Issuer, KeyPair, KeyUsagePurpose,
};
use tempfile::TempDir;
use x509_parser::extensions::ParsedExtension;
use x509_parser::parse_x509_certificate;

use certkeep_config::{Config, SiteConfig};
use certkeep_manager::acme::certificate::colon_hex;
use certkeep_manager::acme::canonicalize_server;
use certkeep_manager::acme::error::InstallError;
use certkeep_manager::acme::FsCertificateStore;
use certkeep_manager::platform::{
    CertificateComponents, CertificateStore, ConfiguredSites, FileInstaller, Installer,
    NetworkResolver, Notifier, ProcessExecutor, ProcessOutput,
};
use certkeep_manager::{CertManager, Collaborators, ServerIdentity, SiteId};

pub const SERVER_IP: &str = "203.0.113.10";
pub const OTHER_IP: &str = "198.51.100.7";
pub const PRIMARY: &str = "panel.example.net";
pub const MACHINE: &str = "node1.internal";

pub const NONCE_FAILURE: &str = "error: urn:ietf:params:acme:error:badNonce invalid anti-replay nonce";

pub fn ip(addr: &str) -> IpAddr {
    addr.parse().unwrap()
}

// ============================================================================
// Certificate authority
// ============================================================================

/// In-test CA that signs leaves with the authority key identifier extension
pub struct TestCa {
    issuer: Issuer<'static, KeyPair>,
    pub cert_pem: String,
    /// Key identifier of the CA, `AA:BB:..`
    pub fingerprint: String,
}

impl TestCa {
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
        ];
        params.distinguished_name.push(DnType::CommonName, name);

        let cert = params.self_signed(&key).unwrap();

        let mut ca = Self {
            issuer: Issuer::new(params, key),
            cert_pem: cert.pem(),
            fingerprint: String::new(),
        };
        ca.fingerprint = ca.key_id();
        ca
    }

    /// Authority key identifier this CA stamps on its leaves
    fn key_id(&self) -> String {
        let (leaf, _) = self.leaf(&hosts(&["probe.test"]), 1);
        let der = pem::parse(leaf).unwrap();
        let (_, cert) = parse_x509_certificate(der.contents()).unwrap();
        cert.extensions()
            .iter()
            .find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    aki.key_identifier.as_ref().map(|kid| colon_hex(kid.0))
                }
                _ => None,
            })
            .expect("leaf carries an authority key identifier")
    }

    /// Leaf certificate and key PEM for `hostnames`, valid for `days`
    pub fn leaf(&self, hostnames: &[String], days: i64) -> (String, String) {
        let mut params = CertificateParams::new(hostnames.to_vec()).unwrap();
        params.use_authority_key_identifier_extension = true;
        params.not_before = time::OffsetDateTime::now_utc() - time::Duration::days(1);
        params.not_after = time::OffsetDateTime::now_utc() + time::Duration::days(days);
        if let Some(first) = hostnames.first() {
            params.distinguished_name.push(DnType::CommonName, first.as_str());
        }

        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.issuer).unwrap();
        (cert.pem(), key.serialize_pem())
    }
}

pub fn hosts(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// ACME client
// ============================================================================

/// One recorded client invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn command(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    /// Value following `flag`
    pub fn flag(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Fake ACME client.
///
/// `setup` writes the account key, `issue` writes a certificate signed by the
/// test CA into the site's storage directory and `revoke` succeeds. Scripted
/// responses for a subcommand take priority over that behavior.
pub struct FakeAcmeClient {
    ca: Arc<TestCa>,
    calls: Mutex<Vec<Invocation>>,
    scripted: Mutex<HashMap<String, VecDeque<ProcessOutput>>>,
}

impl FakeAcmeClient {
    pub fn new(ca: Arc<TestCa>) -> Self {
        Self {
            ca,
            calls: Mutex::new(Vec::new()),
            scripted: Mutex::new(HashMap::new()),
        }
    }

    /// Queue `times` copies of a failed run for `command`
    pub fn fail(&self, command: &str, stdout: &str, times: usize) {
        let output = ProcessOutput {
            success: false,
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(1),
        };
        self.scripted
            .lock()
            .entry(command.to_string())
            .or_default()
            .extend(std::iter::repeat(output).take(times));
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, command: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.command() == command)
            .collect()
    }

    fn issue(&self, call: &Invocation) -> io::Result<()> {
        let storage = PathBuf::from(call.flag("--storage").unwrap_or_default());
        let server = call.flag("-s").unwrap_or_default();
        let site = call.flag("--name").unwrap_or_default();
        let domains: Vec<String> = call
            .flag("--domains")
            .unwrap_or_default()
            .split(',')
            .map(str::to_string)
            .collect();

        let dir = storage
            .join("certs")
            .join(canonicalize_server(server))
            .join(site);
        fs::create_dir_all(&dir)?;

        let (cert, key) = self.ca.leaf(&domains, 90);
        fs::write(dir.join("key.pem"), key)?;
        fs::write(dir.join("cert.pem"), &cert)?;
        fs::write(dir.join("chain.pem"), &self.ca.cert_pem)?;
        fs::write(dir.join("fullchain.pem"), format!("{}{}", cert, self.ca.cert_pem))?;
        Ok(())
    }

    fn setup(&self, call: &Invocation) -> io::Result<()> {
        let storage = PathBuf::from(call.flag("--storage").unwrap_or_default());
        let server = call.flag("-s").unwrap_or_default();
        let accounts = storage.join("accounts");
        fs::create_dir_all(&accounts)?;
        fs::write(
            accounts.join(format!("{}.pem", canonicalize_server(server))),
            "account key",
        )
    }
}

impl ProcessExecutor for FakeAcmeClient {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        let call = Invocation {
            program: program.to_string(),
            args: args.to_vec(),
        };
        self.calls.lock().push(call.clone());

        if let Some(output) = self
            .scripted
            .lock()
            .get_mut(call.command())
            .and_then(VecDeque::pop_front)
        {
            return Ok(output);
        }

        match call.command() {
            "setup" => self.setup(&call)?,
            "issue" => self.issue(&call)?,
            "revoke" => {}
            other => {
                return Ok(ProcessOutput {
                    success: false,
                    stdout: format!("error: unknown command {}", other),
                    stderr: String::new(),
                    exit_code: Some(2),
                })
            }
        }

        Ok(ProcessOutput {
            success: true,
            stdout: format!("info: {} complete", call.command()),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

// ============================================================================
// DNS, installation and notification
// ============================================================================

/// DNS answers set by the test; unknown names do not resolve
pub struct ScriptedResolver {
    public_ip: Option<IpAddr>,
    answers: Mutex<HashMap<String, IpAddr>>,
    lookups: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    pub fn new(public_ip: Option<IpAddr>) -> Self {
        Self {
            public_ip,
            answers: Mutex::new(HashMap::new()),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(&self, host: &str, addr: &str) {
        self.answers.lock().insert(host.to_string(), ip(addr));
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

impl NetworkResolver for ScriptedResolver {
    fn lookup(&self, host: &str, _timeout: Duration) -> Option<IpAddr> {
        self.lookups.lock().push(host.to_string());
        self.answers.lock().get(host).copied()
    }

    fn public_ip(&self) -> Option<IpAddr> {
        self.public_ip
    }
}

/// Counts installations and delegates to a [`FileInstaller`]
pub struct RecordingInstaller {
    inner: FileInstaller,
    installs: Mutex<Vec<SiteId>>,
}

impl RecordingInstaller {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: FileInstaller::new(root),
            installs: Mutex::new(Vec::new()),
        }
    }

    pub fn installs(&self) -> Vec<SiteId> {
        self.installs.lock().clone()
    }

    pub fn site_dir(&self, site: &SiteId) -> PathBuf {
        self.inner.site_dir(site)
    }
}

impl Installer for RecordingInstaller {
    fn install(
        &self,
        site: &SiteId,
        components: &CertificateComponents,
    ) -> Result<(), InstallError> {
        self.installs.lock().push(site.clone());
        self.inner.install(site, components)
    }

    fn installed_certificate(&self, site: &SiteId) -> Result<Option<String>, InstallError> {
        self.inner.installed_certificate(site)
    }
}

/// Collects administrator notices
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send_admin(&self, subject: &str, body: &str) -> bool {
        self.sent.lock().push((subject.to_string(), body.to_string()));
        true
    }
}

// ============================================================================
// Environment
// ============================================================================

/// A manager wired to fakes over a temporary directory
pub struct TestEnv {
    pub temp: TempDir,
    pub ca: Arc<TestCa>,
    pub config: Config,
    pub client: Arc<FakeAcmeClient>,
    pub resolver: Arc<ScriptedResolver>,
    pub installer: Arc<RecordingInstaller>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<FsCertificateStore>,
    pub manager: CertManager,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Environment with `customize` applied to the default test configuration
    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let temp = TempDir::new().unwrap();
        let ca = Arc::new(TestCa::new("Certkeep Test CA"));

        let mut config = Config::default();
        config.acme.client = vec!["acme-client".to_string()];
        config.acme.storage = temp.path().join("storage");
        config.acme.challenge_path = temp.path().join("www");
        config.acme.install_root = temp.path().join("installed");
        config.acme.default_email = Some("hostmaster@example.net".to_string());
        config.acme.fingerprint = ca.fingerprint.clone();
        config.acme.platform_version = "8.1".to_string();
        config.server.name = PRIMARY.to_string();
        config.server.public_ip = Some(ip(SERVER_IP));

        let mut site12 = SiteConfig::new("site12", "example.com");
        site12.aliases.push("example.org".to_string());
        site12.admin_email = Some("owner@example.com".to_string());
        let mut site13 = SiteConfig::new("site13", "other.test");
        site13.active = false;
        config.sites = vec![site12, site13];

        customize(&mut config);

        let client = Arc::new(FakeAcmeClient::new(Arc::clone(&ca)));
        let resolver = Arc::new(ScriptedResolver::new(config.server.public_ip));
        let installer = Arc::new(RecordingInstaller::new(&config.acme.install_root));
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(FsCertificateStore::new(
            &config.acme.storage,
            config.acme.active_server(),
        ));
        let sites = Arc::new(ConfiguredSites::new(&config.sites));

        let collaborators = Collaborators {
            sites: sites.clone(),
            domains: sites,
            resolver: resolver.clone(),
            executor: client.clone(),
            store: store.clone(),
            expiry: store.clone(),
            installer: installer.clone(),
            notifier: notifier.clone(),
            retry_backoff: Duration::ZERO,
        };
        let identity = ServerIdentity {
            primary: PRIMARY.to_string(),
            machine: Some(MACHINE.to_string()),
            additional: config.server.additional_names.clone(),
        };
        let manager = CertManager::with_collaborators(&config, identity, collaborators).unwrap();

        Self {
            temp,
            ca,
            config,
            client,
            resolver,
            installer,
            notifier,
            store,
            manager,
        }
    }

    /// Point every name in `hostnames` at this server
    pub fn resolve_here(&self, hostnames: &[&str]) {
        for host in hostnames {
            self.resolver.answer(host, SERVER_IP);
        }
    }

    /// Write a certificate into ACME storage as if the client had issued it
    pub fn store_issued(&self, site: &SiteId, hostnames: &[&str], days: i64) -> String {
        let (cert, key) = self.ca.leaf(&hosts(hostnames), days);
        let components = self.store.certificate_components(site);
        fs::create_dir_all(self.store.site_storage_dir(site)).unwrap();
        fs::write(&components.key_path, key).unwrap();
        fs::write(&components.crt_path, &cert).unwrap();
        fs::write(&components.chain_path, &self.ca.cert_pem).unwrap();
        cert
    }

    /// Place a live certificate signed by `ca` for `site`
    pub fn install_existing(&self, site: &SiteId, ca: &TestCa, hostnames: &[&str]) {
        let (cert, key) = ca.leaf(&hosts(hostnames), 60);
        let dir = self.installer.site_dir(site);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("server.crt"), cert).unwrap();
        fs::write(dir.join("server.key"), key).unwrap();
        fs::write(dir.join("bundle.crt"), &ca.cert_pem).unwrap();
    }

    pub fn accounts_dir(&self) -> PathBuf {
        self.config.acme.storage.join("accounts")
    }
}
