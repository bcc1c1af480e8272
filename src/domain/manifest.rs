//! Manifest: the named set of paths a binding waits for.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// Alias under which the bound root itself is exposed.
pub const ROOT_ALIAS: &str = "root";

/// Section name accepted by [`Manifest::from_toml_str`].
const MANIFEST_SECTION: &str = "manifest";

/// Mapping from alias to a slash-delimited path relative to a root.
///
/// The implicit [`ROOT_ALIAS`] entry is never stored here; it is added when
/// the manifest shape is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, alias: impl Into<String>, path: impl Into<String>) -> Self {
        self.insert(alias, path);
        self
    }

    /// Insert or replace an entry, returning the previous path.
    pub fn insert(&mut self, alias: impl Into<String>, path: impl Into<String>) -> Option<String> {
        self.entries.insert(alias.into(), path.into())
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    /// Number of user-declared entries (the implicit root is not counted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Completeness target: every declared alias plus the implicit root.
    pub fn target(&self) -> usize {
        self.entries.len() + 1
    }

    /// Entries in alias order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(alias, path)| (alias.as_str(), path.as_str()))
    }

    /// Parse a manifest from TOML.
    ///
    /// Accepts either a top-level table of `alias = "path"` pairs or the same
    /// pairs nested under a `[manifest]` section.
    pub fn from_toml_str(content: &str) -> DomainResult<Self> {
        let mut table: toml::Table =
            toml::from_str(content).map_err(|e| DomainError::InvalidManifest {
                message: e.to_string(),
            })?;

        if matches!(table.get(MANIFEST_SECTION), Some(toml::Value::Table(_))) {
            if let Some(toml::Value::Table(inner)) = table.remove(MANIFEST_SECTION) {
                table = inner;
            }
        }

        let mut manifest = Manifest::new();
        for (alias, value) in table {
            match value {
                toml::Value::String(path) => {
                    manifest.insert(alias, path);
                }
                other => {
                    return Err(DomainError::InvalidManifest {
                        message: format!(
                            "alias '{}' must map to a path string, found {}",
                            alias,
                            other.type_str()
                        ),
                    })
                }
            }
        }
        Ok(manifest)
    }
}

impl<A, P> FromIterator<(A, P)> for Manifest
where
    A: Into<String>,
    P: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (A, P)>>(iter: T) -> Self {
        let mut manifest = Manifest::new();
        for (alias, path) in iter {
            manifest.insert(alias, path);
        }
        manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_counts_implicit_root() {
        let manifest = Manifest::new().with("a", "A").with("b", "B/C");
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.target(), 3);
        assert_eq!(Manifest::new().target(), 1);
    }

    #[test]
    fn test_from_toml_top_level() {
        let manifest = Manifest::from_toml_str(
            r#"
head = "Body/Head"
body = "Body"
"#,
        )
        .unwrap();
        assert_eq!(manifest.get("head"), Some("Body/Head"));
        assert_eq!(manifest.get("body"), Some("Body"));
    }

    #[test]
    fn test_from_toml_section() {
        let manifest = Manifest::from_toml_str(
            r#"
[manifest]
door = "Frame/Door"
"#,
        )
        .unwrap();
        assert_eq!(manifest.iter().collect::<Vec<_>>(), vec![("door", "Frame/Door")]);
    }

    #[test]
    fn test_from_toml_alias_named_manifest_is_an_entry() {
        let manifest = Manifest::from_toml_str(r#"manifest = "Docs/Manifest""#).unwrap();
        assert_eq!(manifest.get("manifest"), Some("Docs/Manifest"));
    }

    #[test]
    fn test_from_toml_rejects_non_string_paths() {
        let err = Manifest::from_toml_str("a = 3").unwrap_err();
        assert!(matches!(err, DomainError::InvalidManifest { .. }));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(Manifest::from_toml_str("a = ").is_err());
    }
}
