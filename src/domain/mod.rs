//! Domain layer: value types for resources, payloads, certificates and the
//! CMS envelope. Nothing here touches the filesystem.

pub mod certificate;
pub mod constants;
pub mod content;
pub mod crypto;
pub mod envelope;
pub mod payloads;
pub mod resources;
pub mod schema;
pub mod time;
pub mod value;
pub mod verification;
