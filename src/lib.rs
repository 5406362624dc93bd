//! rpki-forge library
//!
//! Builds and parses RPKI signed objects: CMS envelopes around schema-driven
//! payloads (manifests, ROAs, Ghostbusters records, signed checklists, signed
//! URI lists and any registered type),
//! resource certificates, CRLs and trust anchor locators.
//!
//! Layered architecture:
//! - `domain`: value types, schemas, resources and the signed-object model
//! - `services`: DER codec, builders, registry, verification and publication
//! - `authority`: certificate authorities and their publication points
//! - `pipelines`: end-to-end workflows used by the CLI
//! - `infra`: configuration and errors

pub mod authority;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use authority::{
    CaSettings, CaState, CertificateAuthority, RepositoryObject, TrustAnchor, TrustAnchorLocator,
};
pub use domain::certificate::{ResourceCertificate, RevocationList};
pub use domain::content::{ContentTypeDescriptor, EncapsulatedContent};
pub use domain::crypto::{DigestAlgorithm, KeyPair};
pub use domain::envelope::{SignedAttributes, SignedObject};
pub use domain::payloads::{
    ChecklistEntry, FileAndHash, Ghostbusters, Manifest, RoaPrefix, RouteOriginAttestation,
    SignedChecklist, SignedUriList, UriEntry,
};
pub use domain::resources::{AsBlock, IpBlock, IpPrefix, Resources};
pub use domain::schema::{Field, Schema};
pub use domain::value::{IntValue, Value};
pub use domain::verification::VerificationReport;
pub use infra::error::{ForgeError, ForgeResult};
pub use pipelines::verify::VerifyWorkflow;
pub use services::{ContentTypeRegistry, RegistryBuilder};
