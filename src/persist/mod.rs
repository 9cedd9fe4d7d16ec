//! Persistence - load and save configuration trees
//!
//! The format is picked from the file extension:
//! - `.json` - pretty printed, four-space indent
//! - `.yaml` / `.yml` - via serde_yaml
//! - `.xml` - element tree, see [`xml`]
//!
//! Sequences and nulls have no place in a [`ConfigTree`]; loading a document
//! that contains them fails with the offending key path.

mod json;
mod xml;
mod yaml;

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{FormSyncError, Result};
use crate::value::ConfigTree;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "json" => Ok(Format::Json),
            "xml" => Ok(Format::Xml),
            "yaml" | "yml" => Ok(Format::Yaml),
            _ => Err(FormSyncError::UnsupportedFormat {
                extension: format!(".{}", extension),
            }),
        }
    }

    /// Parse a document of this format
    pub fn parse(self, text: &str) -> Result<ConfigTree> {
        match self {
            Format::Json => json::parse(text),
            Format::Xml => xml::parse(text),
            Format::Yaml => yaml::parse(text),
        }
    }

    /// Render a tree in this format
    pub fn render(self, tree: &ConfigTree) -> Result<String> {
        match self {
            Format::Json => json::render(tree),
            Format::Xml => xml::render(tree),
            Format::Yaml => yaml::render(tree),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "json",
            Format::Xml => "xml",
            Format::Yaml => "yaml",
        })
    }
}

/// Read a configuration tree from `path`
pub fn load(path: impl AsRef<Path>) -> Result<ConfigTree> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path)?;
    let tree = format.parse(&text)?;
    debug!(path = %path.display(), %format, keys = tree.len(), "configuration loaded");
    Ok(tree)
}

/// Write a configuration tree to `path`
pub fn save(path: impl AsRef<Path>, tree: &ConfigTree) -> Result<()> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    let text = format.render(tree)?;
    fs::write(path, text)?;
    debug!(path = %path.display(), %format, "configuration saved");
    Ok(())
}

/// Join a key path for error messages: `person.address.city`
pub(crate) fn key_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/b.json")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(Path::new("c.YML")).unwrap(), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("c.xml")).unwrap(), Format::Xml);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = Format::from_path(Path::new("settings.ini")).unwrap_err();
        assert_eq!(err.to_string(), "FSYNC-050: Unsupported file format: '.ini'");
        assert!(Format::from_path(Path::new("Makefile")).is_err());
    }

    #[test]
    fn save_then_load_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let tree = ConfigTree::new()
            .with("age", 19)
            .with("employed", false)
            .with("nationality", "German");

        for name in ["c.json", "c.yaml"] {
            let path = dir.path().join(name);
            save(&path, &tree).unwrap();
            assert_eq!(load(&path).unwrap(), tree, "{}", name);
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, FormSyncError::Io(_)));
    }

    #[test]
    fn key_path_joins() {
        assert_eq!(key_path("", "a"), "a");
        assert_eq!(key_path("a", "b"), "a.b");
    }
}
