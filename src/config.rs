//! Declarative binding files
//!
//! ```yaml
//! name: profile
//! source: profile.json
//! on_unmatched: skip
//! save_on_change: true
//! resolver:
//!   mapping:
//!     employed: has_work
//!   suppress_errors: [nickname]
//!   complement_keys: true
//! ```
//!
//! A [`ControlManifest`] lists headless controls to bind against:
//!
//! ```yaml
//! controls:
//!   - { name: age, kind: spinner, value: 0 }
//!   - { name: has_work, kind: checkbox }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::control::ControlHandle;
use crate::error::{FormSyncError, Result};
use crate::headless::control_from_spec;
use crate::resolver::{KeyResolver, UnmatchedPolicy};
use crate::value::Scalar;

/// Binder settings read from YAML
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    pub name: String,
    /// Data file; relative paths are taken from the binding file's directory
    pub source: PathBuf,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default)]
    pub allow_multiple_hooks: bool,
    #[serde(default)]
    pub on_unmatched: UnmatchedPolicy,
    #[serde(default)]
    pub save_on_change: bool,
    #[serde(default)]
    pub dump_on_save: bool,
    #[serde(default)]
    pub resolver: Option<ResolverConfig>,
}

fn default_recursive() -> bool {
    true
}

impl BindingConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a binding file, anchoring `source` next to it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_yaml(&fs::read_to_string(path)?)?;
        if config.source.is_relative() {
            if let Some(dir) = path.parent() {
                config.source = dir.join(&config.source);
            }
        }
        Ok(config)
    }

    /// The configured key resolver, if any
    pub fn key_resolver(&self) -> Result<Option<KeyResolver>> {
        self.resolver.as_ref().map(ResolverConfig::to_resolver).transpose()
    }
}

/// `resolver:` block, exactly one of `mapping` or `keys`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    #[serde(default)]
    pub mapping: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub suppress_errors: Vec<String>,
    #[serde(default)]
    pub complement_keys: bool,
    #[serde(default)]
    pub log_build_result: bool,
}

impl ResolverConfig {
    pub fn to_resolver(&self) -> Result<KeyResolver> {
        let resolver = match (&self.mapping, &self.keys) {
            (Some(mapping), None) => KeyResolver::from_mapping(mapping.clone()),
            (None, Some(keys)) => KeyResolver::from_keys(keys.clone()),
            (Some(_), Some(_)) => {
                return Err(FormSyncError::invalid_config(
                    "resolver takes either 'mapping' or 'keys', not both",
                ))
            }
            (None, None) => {
                return Err(FormSyncError::invalid_config(
                    "resolver needs a 'mapping' or a 'keys' list",
                ))
            }
        };

        Ok(resolver
            .suppress_errors(self.suppress_errors.iter().cloned())
            .complement_keys(self.complement_keys)
            .log_build_result(self.log_build_result))
    }
}

/// Headless controls described in YAML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlManifest {
    pub controls: Vec<ControlSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlSpec {
    pub name: String,
    /// Category name or alias (`spinner`, `checkbox`, ...); unknown kinds
    /// become unsupported controls
    pub kind: String,
    #[serde(default)]
    pub value: Option<Scalar>,
}

impl ControlManifest {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    /// Create one headless control per entry
    pub fn instantiate(&self) -> Result<Vec<ControlHandle>> {
        self.controls
            .iter()
            .map(|spec| control_from_spec(&spec.name, &spec.kind, spec.value.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlKind;
    use crate::resolver::KeySource;

    #[test]
    fn binding_defaults() {
        let config = BindingConfig::from_yaml("name: profile\nsource: data.json\n").unwrap();
        assert!(config.recursive);
        assert!(!config.allow_multiple_hooks);
        assert!(!config.save_on_change);
        assert_eq!(config.on_unmatched, UnmatchedPolicy::FailFast);
        assert!(config.key_resolver().unwrap().is_none());
    }

    #[test]
    fn binding_rejects_unknown_fields() {
        let err = BindingConfig::from_yaml("name: a\nsource: b.json\nrecursve: false\n");
        assert!(matches!(err, Err(FormSyncError::Yaml(_))));
    }

    #[test]
    fn resolver_block_builds_key_resolver() {
        let yaml = r#"
name: profile
source: data.json
on_unmatched: skip
resolver:
  keys: [user]
  suppress_errors: [nickname]
  complement_keys: true
"#;
        let config = BindingConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.on_unmatched, UnmatchedPolicy::Skip);
        let resolver = config.key_resolver().unwrap().unwrap();
        assert_eq!(resolver.source(), &KeySource::Keys(vec!["user".into()]));
        assert!(resolver.is_suppressed("nickname"));
    }

    #[test]
    fn resolver_needs_exactly_one_source() {
        let both = ResolverConfig {
            mapping: Some(BTreeMap::new()),
            keys: Some(Vec::new()),
            ..Default::default()
        };
        assert!(both.to_resolver().is_err());
        assert!(ResolverConfig::default().to_resolver().is_err());
    }

    #[test]
    fn from_file_anchors_relative_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binding.yaml");
        fs::write(&path, "name: p\nsource: data.json\n").unwrap();
        let config = BindingConfig::from_file(&path).unwrap();
        assert_eq!(config.source, dir.path().join("data.json"));
    }

    #[test]
    fn manifest_instantiates_controls() {
        let yaml = r#"
controls:
  - { name: age, kind: spinner, value: 19 }
  - { name: employed, kind: checkbox }
  - { name: submit, kind: push_button }
"#;
        let controls = ControlManifest::from_yaml(yaml).unwrap().instantiate().unwrap();
        assert_eq!(controls.len(), 3);
        assert_eq!(controls[0].kind(), Some(ControlKind::Numeric));
        assert_eq!(controls[1].kind(), Some(ControlKind::Toggle));
        assert!(!controls[2].is_supported());
    }

    #[test]
    fn manifest_value_must_fit_kind() {
        let yaml = "controls:\n  - { name: employed, kind: checkbox, value: maybe }\n";
        let err = ControlManifest::from_yaml(yaml).unwrap().instantiate().unwrap_err();
        assert!(matches!(err, FormSyncError::ValueMismatch { .. }));
    }
}
