//! Writes consistent publication points to a local directory tree.
//!
//! Layout mirrors the rsync URIs: `<root>/<host>/<path>/<repo path>/<file>`,
//! with the trust anchor certificate beside its publication point and the
//! TAL in a separate directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::authority::{CertificateAuthority, TrustAnchor};
use crate::infra::error::{ForgeError, ForgeResult};

/// Summary of one `write_tree` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationSummary {
    pub files: Vec<PathBuf>,
    pub tal: Option<PathBuf>,
}

pub struct PublicationWriter {
    repo_dir: PathBuf,
    tal_dir: PathBuf,
}

impl PublicationWriter {
    /// Writer placing repository files under `repo_dir` and TALs under `tal_dir`.
    #[must_use]
    pub fn new(repo_dir: impl Into<PathBuf>, tal_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            tal_dir: tal_dir.into(),
        }
    }

    /// `<root>/repo` and `<root>/tals`.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self::new(root.join("repo"), root.join("tals"))
    }

    /// Write the trust anchor, its TAL and every CA in `authorities`.
    ///
    /// Fails before touching the filesystem if any CA is not consistent.
    pub fn write_tree(
        &self,
        ta: &TrustAnchor,
        authorities: &[&CertificateAuthority],
    ) -> ForgeResult<PublicationSummary> {
        let mut snapshots = vec![(&**ta, ta.snapshot()?)];
        for ca in authorities {
            snapshots.push((*ca, ca.snapshot()?));
        }

        let mut summary = PublicationSummary::default();

        let base = self.repo_dir.join(ta.settings().uri_path()?);
        let ta_cert = base.join(ta.cert_path());
        write_file(&ta_cert, ta.certificate().as_der())?;
        summary.files.push(ta_cert);

        for (ca, files) in snapshots {
            let dir = self.repo_dir.join(ca.settings().uri_path()?).join(ca.repo_path());
            for (name, bytes) in files {
                let path = dir.join(name);
                write_file(&path, &bytes)?;
                summary.files.push(path);
            }
            log::info!("Wrote publication point of '{}' to {}", ca.name(), dir.display());
        }

        let tal_path = self.tal_dir.join(ta.tal_file_name());
        write_file(&tal_path, ta.locator().to_text()?.as_bytes())?;
        log::info!("Wrote trust anchor locator {}", tal_path.display());
        summary.tal = Some(tal_path);

        Ok(summary)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> ForgeResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ForgeError::IoError(format!("Failed to create directory {}: {e}", parent.display()))
        })?;
    }
    fs::write(path, bytes)
        .map_err(|e| ForgeError::IoError(format!("Failed to write {}: {e}", path.display())))?;
    log::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
