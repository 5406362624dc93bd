//! Service layer module root.
//! Contains the DER codec, builders for certificates, CRLs and CMS envelopes,
//! verification and publication.

pub mod cert_builder;
pub mod codec;
pub mod crl_builder;
pub mod envelope;
pub mod publication;
pub mod registry;
pub mod verification;

pub use cert_builder::{common_name, CertificateBuilderService, IssuerContext};
pub use crl_builder::{CrlBuilderService, CrlRequest};
pub use envelope::{EnvelopeService, PreparedContent};
pub use publication::{PublicationSummary, PublicationWriter};
pub use registry::{ContentTypeRegistry, RegistryBuilder};
pub use verification::VerificationService;
