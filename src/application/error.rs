//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Binding errors wrap domain errors and add lifecycle and config concerns.
#[derive(Error, Debug)]
pub enum BindError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("root already bound: {root}")]
    AlreadyBound { root: String },

    #[error("config error: {message}")]
    Config { message: String },
}

/// Result type for application layer operations.
pub type BindResult<T> = Result<T, BindError>;
