//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent invalid manifests.
/// They are raised while building the manifest shape, before any
/// collaborator is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("aliases '{existing}' and '{alias}' both resolve to '{path}'")]
    DuplicateAlias {
        path: String,
        existing: String,
        alias: String,
    },

    #[error("alias '{0}' is reserved for the bound root")]
    ReservedAlias(String),

    #[error("invalid manifest: {message}")]
    InvalidManifest { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
