//! Error types with fix suggestions
//!
//! Error code ranges:
//! - FSYNC-010-019: Key resolution errors
//! - FSYNC-020-029: Binding/hook errors
//! - FSYNC-030-039: Control capability errors
//! - FSYNC-040-049: Configuration errors
//! - FSYNC-050-059: Persistence errors

use thiserror::Error;

use crate::control::ControlKind;

pub type Result<T> = std::result::Result<T, FormSyncError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum FormSyncError {
    // ─────────────────────────────────────────────────────────────
    // Key resolution errors (FSYNC-010 to FSYNC-012)
    // ─────────────────────────────────────────────────────────────
    #[error("FSYNC-010: No matching control for '{identifier}' (key '{key}')")]
    UnresolvedKey { key: String, identifier: String },

    #[error("FSYNC-011: {} key(s) without a matching control: {}", .keys.len(), .keys.join(", "))]
    UnresolvedKeys { keys: Vec<String> },

    #[error("FSYNC-012: Key resolver used before build()")]
    ResolverNotBuilt,

    // ─────────────────────────────────────────────────────────────
    // Binding errors (FSYNC-020 to FSYNC-023)
    // ─────────────────────────────────────────────────────────────
    #[error("FSYNC-020: Control '{identifier}' is already hooked by binder '{owner}'")]
    DuplicateHook { identifier: String, owner: String },

    #[error("FSYNC-021: A binder named '{name}' is already registered")]
    DuplicateBinder { name: String },

    #[error("FSYNC-022: Missing control for '{key}'")]
    ControlNotFound { key: String },

    #[error("FSYNC-023: No hook bound to '{key}'")]
    HookNotFound { key: String },

    // ─────────────────────────────────────────────────────────────
    // Control capability errors (FSYNC-030 to FSYNC-032)
    // ─────────────────────────────────────────────────────────────
    #[error("FSYNC-030: Not yet supported control '{identifier}': {type_name}")]
    UnsupportedControl {
        identifier: String,
        type_name: String,
    },

    #[error("FSYNC-031: Control '{identifier}' ({kind}) cannot hold a {found} value")]
    ValueMismatch {
        identifier: String,
        kind: ControlKind,
        found: &'static str,
    },

    #[error("FSYNC-032: Invalid date '{value}' (expected dd.MM.yyyy)")]
    InvalidDate { value: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration errors (FSYNC-040 to FSYNC-041)
    // ─────────────────────────────────────────────────────────────
    #[error("FSYNC-040: Invalid configuration: {details}")]
    InvalidConfiguration { details: String },

    #[error("FSYNC-041: Data of binder '{binder}' is borrowed elsewhere during sync")]
    TreeBusy { binder: String },

    // ─────────────────────────────────────────────────────────────
    // Persistence errors (FSYNC-050 to FSYNC-054)
    // ─────────────────────────────────────────────────────────────
    #[error("FSYNC-050: Unsupported file format: '{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("FSYNC-051: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("FSYNC-052: YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("FSYNC-053: XML error: {details}")]
    Xml { details: String },

    #[error("FSYNC-054: IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FormSyncError {
    pub(crate) fn invalid_config(details: impl Into<String>) -> Self {
        FormSyncError::InvalidConfiguration {
            details: details.into(),
        }
    }

    pub(crate) fn xml(details: impl ToString) -> Self {
        FormSyncError::Xml {
            details: details.to_string(),
        }
    }
}

impl FixSuggestion for FormSyncError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FormSyncError::UnresolvedKey { .. } | FormSyncError::UnresolvedKeys { .. } => Some(
                "Rename the control, map the key explicitly, enable complement_keys or suppress the key",
            ),
            FormSyncError::ResolverNotBuilt => Some("Call build() with the available controls first"),
            FormSyncError::DuplicateHook { .. } => {
                Some("Drop the other binder first or set allow_multiple_hooks")
            }
            FormSyncError::DuplicateBinder { .. } => Some("Use a unique binder name"),
            FormSyncError::ControlNotFound { .. } => {
                Some("Add a control with this name or map the key in the resolver")
            }
            FormSyncError::HookNotFound { .. } => {
                Some("Use a configuration key or control name the binder has hooked")
            }
            FormSyncError::UnsupportedControl { .. } => {
                Some("Only selector, toggle, numeric, text, page index and date controls can be bound")
            }
            FormSyncError::ValueMismatch { .. } => {
                Some("Store a value of the type the control natively holds")
            }
            FormSyncError::InvalidDate { .. } => Some("Write dates as dd.MM.yyyy, e.g. 03.01.2004"),
            FormSyncError::InvalidConfiguration { .. } => {
                Some("Provide data or a source path, and only mappings of scalars")
            }
            FormSyncError::TreeBusy { .. } => {
                Some("Release borrows of the shared data before syncing")
            }
            FormSyncError::UnsupportedFormat { .. } => Some("Use a .json, .xml, .yaml or .yml file"),
            FormSyncError::Json(_) => Some("Check JSON syntax"),
            FormSyncError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
            FormSyncError::Xml { .. } => Some("Check the XML is well formed with a single root element"),
            FormSyncError::Io(_) => Some("Check file path and permissions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_keys_lists_every_key() {
        let err = FormSyncError::UnresolvedKeys {
            keys: vec!["age".into(), "name".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("FSYNC-011"));
        assert!(msg.contains("2 key(s)"));
        assert!(msg.contains("age, name"));
    }

    #[test]
    fn duplicate_hook_names_owner() {
        let err = FormSyncError::DuplicateHook {
            identifier: "age".into(),
            owner: "profile".into(),
        };
        assert_eq!(
            err.to_string(),
            "FSYNC-020: Control 'age' is already hooked by binder 'profile'"
        );
    }

    #[test]
    fn every_variant_has_a_suggestion() {
        let err = FormSyncError::UnsupportedFormat {
            extension: ".ini".into(),
        };
        assert!(err.fix_suggestion().is_some());
        assert!(FormSyncError::ResolverNotBuilt.fix_suggestion().is_some());
    }
}
