//! `PerceiveWorkflow`: decodes signed objects found on disk.
//!
//! The content type is picked by file extension; the envelope is then
//! decoded against the registry and rendered as JSON.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::domain::envelope::SignedObject;
use crate::infra::error::{ForgeError, ForgeResult};
use crate::services::registry::ContentTypeRegistry;

#[derive(Debug, Clone, Copy, Default)]
pub struct PerceiveOptions {
    /// Include envelope details next to the payload.
    pub signed_data: bool,
    /// Leave out the decoded payload.
    pub no_econtent: bool,
}

pub struct PerceiveWorkflow<'r> {
    registry: &'r ContentTypeRegistry,
    options: PerceiveOptions,
}

impl<'r> PerceiveWorkflow<'r> {
    #[must_use]
    pub fn new(registry: &'r ContentTypeRegistry, options: PerceiveOptions) -> Self {
        Self { registry, options }
    }

    /// Decode `path`. Files with no registered extension yield `None`.
    pub fn perceive_file(&self, path: &Path) -> ForgeResult<Option<serde_json::Value>> {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            log::warn!("{} has no file extension, skipping", path.display());
            return Ok(None);
        };
        if self.registry.by_file_ext(ext).is_none() {
            log::warn!("no signed object type with file extension .{ext}");
            return Ok(None);
        }
        log::info!("deciphering {}", path.display());
        let bytes = fs::read(path)
            .map_err(|e| ForgeError::IoError(format!("Failed to read {}: {e}", path.display())))?;
        let object = SignedObject::decode(&bytes, self.registry)?;
        Ok(Some(self.render(path, &object)))
    }

    #[must_use]
    pub fn render(&self, path: &Path, object: &SignedObject) -> serde_json::Value {
        let mut out = json!({
            "file": path.display().to_string(),
            "content_type": object.content_type().to_string(),
        });
        if let Ok(descriptor) = self.registry.lookup(&object.content_type()) {
            out["name"] = json!(descriptor.name);
        }
        if self.options.signed_data {
            let attrs = object.signed_attributes();
            out["signed_data"] = json!({
                "digest_algorithm": object.digest_algorithm().as_str(),
                "message_digest": hex::encode(&attrs.message_digest),
                "signing_time": attrs.signing_time.to_string(),
                "signer": object.signer().subject(),
                "signer_issuer": object.signer().issuer(),
                "signature_len": object.signature().len(),
            });
        }
        if !self.options.no_econtent {
            out["econtent"] = object.content().value().to_json();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{CaSettings, TrustAnchor};
    use crate::domain::crypto::DigestAlgorithm;
    use crate::domain::payloads::Ghostbusters;
    use tempfile::TempDir;

    #[test]
    fn perceives_ghostbusters_record() {
        let temp = TempDir::new().unwrap();
        let settings = CaSettings {
            key_bits: 1024,
            ..CaSettings::default()
        };
        let mut ta = TrustAnchor::new("TA", settings).unwrap();
        let object = ta
            .sign(
                &Ghostbusters::new("Jane Doe").to_content(),
                DigestAlgorithm::Sha256,
            )
            .unwrap();
        let path = temp.path().join(object.default_file_name());
        std::fs::write(&path, object.as_der()).unwrap();

        let registry = ContentTypeRegistry::builtins();
        let workflow = PerceiveWorkflow::new(
            &registry,
            PerceiveOptions {
                signed_data: true,
                no_econtent: false,
            },
        );
        let json = workflow.perceive_file(&path).unwrap().unwrap();
        assert_eq!(json["name"], "rpkiGhostbusters");
        assert_eq!(json["signed_data"]["digest_algorithm"], "sha256");
        assert!(json["econtent"].is_string());
    }

    #[test]
    fn unknown_extension_is_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        let registry = ContentTypeRegistry::builtins();
        let workflow = PerceiveWorkflow::new(&registry, PerceiveOptions::default());
        assert!(workflow.perceive_file(&path).unwrap().is_none());
    }
}
