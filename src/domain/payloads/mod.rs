//! Built-in RPKI payload types.

pub mod ghostbusters;
pub mod manifest;
pub mod roa;
pub mod rsc;
pub mod rsu;

use crate::domain::content::ContentTypeDescriptor;

pub use ghostbusters::Ghostbusters;
pub use manifest::{FileAndHash, Manifest};
pub use roa::{RoaPrefix, RouteOriginAttestation};
pub use rsc::{ChecklistEntry, SignedChecklist};
pub use rsu::{SignedUriList, UriEntry};

/// Descriptors registered by `RegistryBuilder::with_builtins`.
#[must_use]
pub fn builtin_descriptors() -> Vec<ContentTypeDescriptor> {
    vec![
        Manifest::descriptor(),
        RouteOriginAttestation::descriptor(),
        Ghostbusters::descriptor(),
        SignedChecklist::descriptor(),
        SignedUriList::descriptor(),
    ]
}
