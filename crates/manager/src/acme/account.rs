//! ACME account registration state
//!
//! The external client writes the account key to
//! `<storage>/accounts/<server>.pem`. After a successful `setup` this module
//! also writes `<storage>/accounts/<server>.json`, a small record of which
//! directory URL the account belongs to and when it was created.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, trace, warn};

use super::client::{AcmeClientAdapter, AcmeCommand};
use super::error::{RegistrationError, StorageError};
use crate::platform::CertificateStore;

/// Map a directory URL to a filename: scheme dropped, separators become dots
pub fn canonicalize_server(server_url: &str) -> String {
    let without_scheme = server_url
        .split_once("://")
        .map_or(server_url, |(_, rest)| rest);
    without_scheme
        .trim_end_matches('/')
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '.' } else { c })
        .collect()
}

/// Registration details recorded after `setup` succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub server_url: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
}

/// Snapshot of the account for the active directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmeAccount {
    pub server_url: String,
    pub storage_dir: PathBuf,
    pub registered: bool,
}

/// Tracks and creates the ACME account for one directory URL
pub struct AcmeAccountRegistry {
    server_url: String,
    store: Arc<dyn CertificateStore>,
    client: Arc<AcmeClientAdapter>,
    admin_email: Option<String>,
    default_email: Option<String>,
}

impl AcmeAccountRegistry {
    pub fn new(
        server_url: impl Into<String>,
        store: Arc<dyn CertificateStore>,
        client: Arc<AcmeClientAdapter>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            store,
            client,
            admin_email: None,
            default_email: None,
        }
    }

    /// Fallback addresses tried, in order, when no email is given
    pub fn with_fallback_emails(
        mut self,
        admin_email: Option<String>,
        default_email: Option<String>,
    ) -> Self {
        self.admin_email = admin_email;
        self.default_email = default_email;
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn accounts_dir(&self) -> PathBuf {
        self.store.account_storage_dir().join("accounts")
    }

    fn artifact(&self, extension: &str) -> PathBuf {
        self.accounts_dir().join(format!(
            "{}.{}",
            canonicalize_server(&self.server_url),
            extension
        ))
    }

    pub fn account(&self) -> AcmeAccount {
        AcmeAccount {
            server_url: self.server_url.clone(),
            storage_dir: self.store.account_storage_dir(),
            registered: self.registered(),
        }
    }

    /// Load the registration record for the active directory, if present
    pub fn load_record(&self) -> Result<Option<AccountRecord>, StorageError> {
        let path = self.artifact("json");
        if !path.is_file() {
            trace!(path = %path.display(), "No ACME account record");
            return Ok(None);
        }
        let record = serde_json::from_str(&fs::read_to_string(&path)?)?;
        Ok(Some(record))
    }

    /// Whether an account exists for the active directory.
    ///
    /// A missing accounts directory answers immediately. Otherwise the
    /// record is consulted, then the client's key file.
    pub fn registered(&self) -> bool {
        if !self.accounts_dir().is_dir() {
            trace!("No accounts directory");
            return false;
        }

        match self.load_record() {
            Ok(Some(record)) if record.server_url == self.server_url => return true,
            Ok(Some(record)) => {
                debug!(
                    recorded = %record.server_url,
                    active = %self.server_url,
                    "ACME account record belongs to another directory"
                );
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Unreadable ACME account record"),
        }

        self.artifact("pem").is_file()
    }

    /// First available of `explicit`, the admin email and the default email
    pub fn resolve_email(&self, explicit: Option<&str>) -> Result<String, RegistrationError> {
        [explicit, self.admin_email.as_deref(), self.default_email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|e| !e.is_empty())
            .map(str::to_string)
            .ok_or(RegistrationError::NoEmail)
    }

    /// Create the account with the ACME client and record it
    pub fn register(&self, email: Option<&str>) -> Result<AccountRecord, RegistrationError> {
        let email = self.resolve_email(email)?;
        let storage = self.store.account_storage_dir();
        create_private_dir(&storage).map_err(StorageError::from)?;

        info!(server = %self.server_url, email = %email, "Registering ACME account");

        let command = AcmeCommand::new("setup")
            .flag("-s", &self.server_url)
            .flag("--email", &email)
            .flag("--storage", storage.to_string_lossy());

        if let Err(e) = self.client.run(&command) {
            error!(server = %self.server_url, error = %e, "ACME registration failed");
            return Err(e.into());
        }

        let record = AccountRecord {
            server_url: self.server_url.clone(),
            email,
            registered_at: Utc::now(),
        };
        self.write_record(&record)?;

        info!(server = %self.server_url, "Registered ACME account");
        Ok(record)
    }

    /// Register unless an account already exists
    pub fn ensure_registered(&self, email: Option<&str>) -> Result<(), RegistrationError> {
        if self.registered() {
            trace!(server = %self.server_url, "ACME account already registered");
            return Ok(());
        }
        self.register(email).map(|_| ())
    }

    fn write_record(&self, record: &AccountRecord) -> Result<(), StorageError> {
        let dir = self.accounts_dir();
        create_private_dir(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(serde_json::to_string_pretty(record)?.as_bytes())?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(self.artifact("json"))
            .map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }
}

fn create_private_dir(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

impl std::fmt::Debug for AcmeAccountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcmeAccountRegistry")
            .field("server_url", &self.server_url)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
