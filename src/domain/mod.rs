//! Domain layer: manifests and their shape
//!
//! This layer is independent of collaborators (no listeners, no callbacks).

pub mod arena;
pub mod builder;
pub mod error;
pub mod manifest;
pub mod path;
pub mod resolved;

pub use arena::{ManifestNode, ManifestTree};
pub use builder::TreeBuilder;
pub use error::{DomainError, DomainResult};
pub use manifest::{Manifest, ROOT_ALIAS};
pub use path::parse_path;
pub use resolved::ResolvedManifest;
