//! `ConjureWorkflow`: builds a populated demo repository from thin air.
//!
//! TA → CA, one ROA and one Ghostbusters record under the CA, CRLs and
//! manifests everywhere, written out with the TAL.

use std::path::Path;

use crate::authority::{CertificateAuthority, TrustAnchor};
use crate::domain::crypto::DigestAlgorithm;
use crate::domain::payloads::{Ghostbusters, RouteOriginAttestation};
use crate::domain::resources::Resources;
use crate::infra::config::RepositoryConfiguration;
use crate::infra::error::ForgeResult;
use crate::services::publication::{PublicationSummary, PublicationWriter};

/// What goes into the demo repository.
#[derive(Debug, Clone)]
pub struct ConjureOptions {
    pub ta_resources: Resources,
    pub ca_resources: Resources,
    pub roa: RouteOriginAttestation,
    pub gbr: Ghostbusters,
    /// Digest of the ROA and GBR envelopes.
    pub digest: DigestAlgorithm,
}

impl ConjureOptions {
    pub fn demo() -> ForgeResult<Self> {
        Ok(Self {
            ta_resources: Resources::all(),
            ca_resources: Resources::parse(
                "10.0.0.0/8, 192.168.0.0-192.168.2.255, 2001:db8::/32",
                "65000",
            )?,
            roa: RouteOriginAttestation::new(
                65000,
                vec!["10.0.0.0/8".parse()?, "2001:db8::/32".parse()?],
            )?,
            gbr: Ghostbusters::new("Jane Doe")
                .with_org("Example Org")
                .with_email("jane@example.net"),
            digest: DigestAlgorithm::Sha256,
        })
    }
}

pub struct ConjureWorkflow {
    config: RepositoryConfiguration,
}

impl ConjureWorkflow {
    #[must_use]
    pub fn new(config: RepositoryConfiguration) -> Self {
        Self { config }
    }

    /// Build the repository in memory and write it under `output_dir`.
    pub fn run(&self, output_dir: &Path, options: &ConjureOptions) -> ForgeResult<PublicationSummary> {
        self.config.validate()?;
        let settings = self.config.ca_settings()?;

        log::info!("creating trust anchor '{}'", self.config.trust_anchor_name);
        let mut ta = TrustAnchor::with_resources(
            &self.config.trust_anchor_name,
            settings,
            options.ta_resources.clone(),
        )?;

        log::info!("creating subordinate CA '{}'", self.config.ca_name);
        let mut ca =
            CertificateAuthority::new_child(&mut ta, &self.config.ca_name, options.ca_resources.clone())?;

        for content in [options.roa.to_content(), options.gbr.to_content()] {
            let object = ca.sign(&content, options.digest)?;
            let name = object.default_file_name();
            ca.publish(&name, object)?;
        }

        ca.issue_crl()?;
        ca.issue_manifest()?;
        ta.issue_crl()?;
        ta.issue_manifest()?;

        log::info!("publishing repository to {}", output_dir.display());
        PublicationWriter::under(output_dir).write_tree(&ta, &[&ca])
    }
}
