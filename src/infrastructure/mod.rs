//! Infrastructure layer: collaborator boundaries and the in-memory scene
//!
//! The binding engine only talks to a hierarchy and a tag registry through
//! the traits defined here.

pub mod error;
pub mod scene;
pub mod traits;

pub use error::{InfraError, InfraResult};
