//! Infrastructure-level errors (in-memory scene operations)

use thiserror::Error;

/// Errors raised by [`MemoryScene`](super::scene::MemoryScene) mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InfraError {
    #[error("unknown scene node: {0}")]
    UnknownNode(String),

    #[error("cannot parent {node} under its own descendant {parent}")]
    CyclicParent { node: String, parent: String },
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
