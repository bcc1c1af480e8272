//! Application layer: resolution engine and binding lifecycle
//!
//! This layer drives the domain shape against the collaborator traits.

pub mod binder;
pub mod error;
pub mod lifecycle;
pub(crate) mod resolver;
pub(crate) mod tree;

pub use binder::{BindCallback, Binder, BindingHandle};
pub use error::{BindError, BindResult};
pub use lifecycle::RootState;
