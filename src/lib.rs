//! tagbind: bind a callback to a manifest of named descendants for every
//! root carrying a tag.
//!
//! The callback fires once per root each time all aliases resolve, and the
//! disposer it returns is released as soon as any alias goes missing.
//!
//! # Architecture
//!
//! - `domain`: manifest shape, path parsing and resolution bookkeeping
//! - `application`: resolver, root lifecycle and the binding handle
//! - `infrastructure`: collaborator traits and an in-memory scene
//! - `config`: layered settings

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;

pub use application::{BindCallback, BindError, BindResult, Binder, BindingHandle, RootState};
pub use config::{InvariantPolicy, Settings};
pub use domain::{parse_path, DomainError, Manifest, ResolvedManifest, ROOT_ALIAS};
pub use infrastructure::scene::{MemoryScene, SceneNode};
pub use infrastructure::traits::{
    Connection, Disposable, Disposer, Hierarchy, Instance, Listener, TagRegistry,
};
