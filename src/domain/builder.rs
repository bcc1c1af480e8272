//! Builds the manifest shape tree from a [`Manifest`].

use tracing::{debug, instrument};

use crate::domain::arena::ManifestTree;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::manifest::{Manifest, ROOT_ALIAS};
use crate::domain::path::{join_segments, parse_path};

/// Constructs the shared [`ManifestTree`] for a binding.
#[derive(Debug, Default)]
pub struct TreeBuilder;

impl TreeBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Walk every manifest path from the root, creating nodes as needed.
    ///
    /// Entries are visited in alias order, so the conflicting pair reported by
    /// [`DomainError::DuplicateAlias`] is deterministic.
    #[instrument(level = "debug", skip(self, manifest), fields(entries = manifest.len()))]
    pub fn build(&self, manifest: &Manifest) -> DomainResult<ManifestTree> {
        let mut tree = ManifestTree::with_root();
        let root = tree.root();
        // root cannot already carry an alias
        let _ = tree.assign_alias(root, ROOT_ALIAS);

        for (alias, path) in manifest.iter() {
            if alias == ROOT_ALIAS {
                return Err(DomainError::ReservedAlias(alias.to_owned()));
            }

            let segments = parse_path(path);
            let mut current = root;
            for segment in &segments {
                current = tree.child_or_insert(current, segment);
            }

            if let Err(existing) = tree.assign_alias(current, alias) {
                return Err(DomainError::DuplicateAlias {
                    path: join_segments(&segments),
                    existing,
                    alias: alias.to_owned(),
                });
            }
        }

        tree.set_target(manifest.target());
        debug!(nodes = tree.len(), target = tree.target(), "built manifest shape");
        Ok(tree)
    }
}
