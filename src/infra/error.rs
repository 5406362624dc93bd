//! Error types for signed-object construction and repository operations.

use thiserror::Error;

/// Result type for repository and envelope operations
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Error kinds surfaced by the engine.
///
/// Every failure is reported synchronously at the point of detection; nothing
/// is retried.
#[derive(Error, Debug, miette::Diagnostic)]
pub enum ForgeError {
    #[error("Duplicate content type OID: {0}")]
    #[diagnostic(help("an OID may only be bound to one schema"))]
    DuplicateOid(String),

    #[error("Unknown content type: {0}")]
    #[diagnostic(help("register the content type before decoding objects of this type"))]
    UnknownContentType(String),

    #[error("Malformed object: {0}")]
    MalformedObject(String),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    #[error("Inconsistent manifest: {0}")]
    #[diagnostic(help("call issue_manifest() after publishing, revoking or issuing a CRL"))]
    InconsistentManifest(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl ForgeError {
    /// Wrap a DER error raised while serializing.
    pub fn encode(error: der::Error) -> Self {
        ForgeError::EncodeError(error.to_string())
    }
}

impl From<der::Error> for ForgeError {
    fn from(error: der::Error) -> Self {
        ForgeError::DecodeError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for ForgeError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        ForgeError::CryptoError(error.to_string())
    }
}

impl From<std::io::Error> for ForgeError {
    fn from(error: std::io::Error) -> Self {
        ForgeError::IoError(error.to_string())
    }
}
