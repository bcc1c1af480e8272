//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Settings file: a TOML file passed to [`Settings::load`]
//! 3. Environment variables: `TAGBIND_*` prefix

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::BindError;

/// What to do when event delivery breaks an internal invariant
/// (for example a tag-added event for a root that is already bound).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvariantPolicy {
    /// Log at error level and leave the existing state untouched.
    #[default]
    Log,
    /// Panic.
    Panic,
}

impl FromStr for InvariantPolicy {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(InvariantPolicy::Log),
            "panic" => Ok(InvariantPolicy::Panic),
            other => Err(BindError::Config {
                message: format!("unknown invariant policy '{}' (expected log or panic)", other),
            }),
        }
    }
}

impl fmt::Display for InvariantPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantPolicy::Log => f.write_str("log"),
            InvariantPolicy::Panic => f.write_str("panic"),
        }
    }
}

/// Raw settings for intermediate parsing (`None` → not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub invariant_policy: Option<InvariantPolicy>,
    pub self_heal: Option<bool>,
}

/// Engine settings shared by every binding a [`Binder`](crate::Binder) creates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Reaction to invariant violations
    pub invariant_policy: InvariantPolicy,
    /// Re-resolve a same-named replacement right after a child is removed
    pub self_heal: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            invariant_policy: InvariantPolicy::Log,
            self_heal: true,
        }
    }
}

fn config_err(e: ConfigError) -> BindError {
    BindError::Config {
        message: e.to_string(),
    }
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, BindError> {
    let content = std::fs::read_to_string(path).map_err(|e| BindError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| BindError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            invariant_policy: overlay.invariant_policy.unwrap_or(self.invariant_policy),
            self_heal: overlay.self_heal.unwrap_or(self.self_heal),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `path` - Optional TOML settings file; a missing file is skipped
    pub fn load(path: Option<&Path>) -> Result<Self, BindError> {
        let mut current = Self::default();

        if let Some(path) = path {
            if path.exists() {
                let raw = load_raw_settings(path)?;
                current = current.merge_with(&raw);
            } else {
                debug!(path = %path.display(), "settings file not found, using defaults");
            }
        }

        Self::apply_env_overrides(current)
    }

    /// Parse settings from TOML text layered over the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, BindError> {
        let raw: RawSettings = toml::from_str(content).map_err(|e| BindError::Config {
            message: e.to_string(),
        })?;
        Ok(Self::default().merge_with(&raw))
    }

    /// Apply TAGBIND_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, BindError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("TAGBIND")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("invariant_policy") {
            settings.invariant_policy = val.parse()?;
        }
        if let Ok(val) = config.get_string("self_heal") {
            settings.self_heal = parse_bool(&val)?;
        }

        Ok(settings)
    }
}

fn parse_bool(value: &str) -> Result<bool, BindError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BindError::Config {
            message: format!("expected a boolean for self_heal, got '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.invariant_policy, InvariantPolicy::Log);
        assert!(settings.self_heal);
    }

    #[test]
    fn test_from_toml_overlays_defaults() {
        let settings = Settings::from_toml_str("invariant_policy = \"panic\"").unwrap();
        assert_eq!(settings.invariant_policy, InvariantPolicy::Panic);
        assert!(settings.self_heal, "unspecified keys keep defaults");
    }

    #[test]
    fn test_from_toml_rejects_unknown_policy() {
        assert!(Settings::from_toml_str("invariant_policy = \"ignore\"").is_err());
    }

    #[rstest]
    #[case("log", InvariantPolicy::Log)]
    #[case(" PANIC ", InvariantPolicy::Panic)]
    fn test_policy_from_str(#[case] input: &str, #[case] expected: InvariantPolicy) {
        assert_eq!(input.parse::<InvariantPolicy>().unwrap(), expected);
    }

    #[rstest]
    #[case("true", true)]
    #[case("off", false)]
    #[case("1", true)]
    fn test_parse_bool(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(parse_bool(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_bool_rejects_garbage() {
        assert!(matches!(parse_bool("maybe"), Err(BindError::Config { .. })));
    }
}
