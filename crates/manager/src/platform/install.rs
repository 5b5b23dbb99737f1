//! Installs issued certificates into a per-site directory

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use certkeep_common::SiteId;
use tempfile::NamedTempFile;
use tracing::{debug, info, trace, warn};

use super::{CertificateComponents, Installer};
use crate::acme::error::InstallError;

const KEY_FILE: &str = "server.key";
const CRT_FILE: &str = "server.crt";
const BUNDLE_FILE: &str = "bundle.crt";

/// Installs `server.key`, `server.crt` and `bundle.crt` under `<root>/<site>/`.
///
/// All three files are staged as temporaries in the target directory before
/// any of them replaces the live copy; a failure while staging leaves the
/// previous certificate untouched. When one of the renames fails, the files
/// already swapped are restored from the previous live contents.
#[derive(Debug, Clone)]
pub struct FileInstaller {
    root: PathBuf,
}

impl FileInstaller {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the live certificate of `site`
    pub fn site_dir(&self, site: &SiteId) -> PathBuf {
        self.root.join(site.as_str())
    }

    fn read_artifact(path: &Path) -> Result<Vec<u8>, InstallError> {
        if !path.is_file() {
            return Err(InstallError::MissingArtifact(path.to_path_buf()));
        }
        Ok(fs::read(path)?)
    }

    fn stage(dir: &Path, contents: &[u8], private: bool) -> Result<NamedTempFile, InstallError> {
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = if private { 0o600 } else { 0o644 };
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        let _ = private;

        Ok(tmp)
    }

    /// Current contents of a live file, `None` when nothing is installed there
    fn previous(path: &Path) -> Result<Option<Vec<u8>>, InstallError> {
        if path.is_file() {
            Ok(Some(fs::read(path)?))
        } else {
            Ok(None)
        }
    }

    /// Put back the live files replaced before a failed swap
    fn roll_back(site: &SiteId, dir: &Path, swapped: Vec<(&'static str, Option<Vec<u8>>)>) {
        for (name, contents) in swapped {
            let path = dir.join(name);
            let restored = match contents {
                Some(bytes) => Self::stage(dir, &bytes, name == KEY_FILE)
                    .and_then(|tmp| tmp.persist(&path).map(|_| ()).map_err(|e| e.error.into())),
                None => fs::remove_file(&path).map_err(InstallError::from),
            };
            if let Err(e) = restored {
                warn!(site = %site, file = name, error = %e, "Failed to restore certificate file");
            }
        }
    }
}

impl Installer for FileInstaller {
    fn install(
        &self,
        site: &SiteId,
        components: &CertificateComponents,
    ) -> Result<(), InstallError> {
        let key = Self::read_artifact(&components.key_path)?;
        let crt = Self::read_artifact(&components.crt_path)?;
        let chain = Self::read_artifact(&components.chain_path)?;

        let dir = self.site_dir(site);
        fs::create_dir_all(&dir)?;

        let staged = [
            (Self::stage(&dir, &key, true)?, KEY_FILE),
            (Self::stage(&dir, &crt, false)?, CRT_FILE),
            (Self::stage(&dir, &chain, false)?, BUNDLE_FILE),
        ];
        trace!(site = %site, dir = %dir.display(), "Staged certificate files");

        let mut previous = Vec::with_capacity(staged.len());
        for (_, name) in &staged {
            previous.push(Self::previous(&dir.join(name))?);
        }

        let mut swapped = Vec::with_capacity(staged.len());
        for ((tmp, name), previous) in staged.into_iter().zip(previous) {
            let path = dir.join(name);
            if let Err(e) = tmp.persist(&path) {
                Self::roll_back(site, &dir, swapped);
                return Err(InstallError::Failed(format!("{}: {}", name, e.error)));
            }
            swapped.push((name, previous));
        }

        info!(site = %site, dir = %dir.display(), "Installed certificate");
        Ok(())
    }

    fn installed_certificate(&self, site: &SiteId) -> Result<Option<String>, InstallError> {
        let path = self.site_dir(site).join(CRT_FILE);
        if !path.is_file() {
            debug!(site = %site, "No installed certificate");
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }
}
