//! YAML documents

use serde_yaml::{Mapping, Value};

use super::key_path;
use crate::error::{FormSyncError, Result};
use crate::value::{ConfigTree, Node, Scalar};

pub(super) fn parse(text: &str) -> Result<ConfigTree> {
    match unwrap_tag(serde_yaml::from_str::<Value>(text)?) {
        Value::Mapping(map) => tree_from_mapping(map, ""),
        // An empty document is an empty tree
        Value::Null => Ok(ConfigTree::new()),
        _ => Err(FormSyncError::invalid_config(
            "top level of a YAML document must be a mapping",
        )),
    }
}

pub(super) fn render(tree: &ConfigTree) -> Result<String> {
    Ok(serde_yaml::to_string(tree)?)
}

fn unwrap_tag(value: Value) -> Value {
    match value {
        Value::Tagged(tagged) => unwrap_tag(tagged.value),
        other => other,
    }
}

fn key_string(key: Value) -> Option<String> {
    match unwrap_tag(key) {
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn tree_from_mapping(map: Mapping, parent: &str) -> Result<ConfigTree> {
    let mut tree = ConfigTree::new();
    for (key, value) in map {
        let key = key_string(key).ok_or_else(|| {
            FormSyncError::invalid_config(format!("'{}' contains a non-scalar key", parent))
        })?;
        let path = key_path(parent, &key);
        let node = match unwrap_tag(value) {
            Value::Mapping(inner) => Node::Tree(tree_from_mapping(inner, &path)?),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Scalar(Scalar::Int(i)),
                None => Node::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => Node::Scalar(Scalar::Text(s)),
            Value::Null => {
                return Err(FormSyncError::invalid_config(format!(
                    "'{}' is null, only mappings and scalars are supported",
                    path
                )))
            }
            _ => {
                return Err(FormSyncError::invalid_config(format!(
                    "'{}' holds a sequence, only mappings and scalars are supported",
                    path
                )))
            }
        };
        tree.insert(key, node);
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalars_and_nesting() {
        let tree = parse("age: 19\nemployed: false\nperson:\n  name: Ada\n  height: 1.7\n").unwrap();
        assert_eq!(tree.scalar("age"), Some(&Scalar::Int(19)));
        assert_eq!(tree.scalar("employed"), Some(&Scalar::Bool(false)));
        let person = tree.subtree("person").unwrap();
        assert_eq!(person.scalar("name"), Some(&Scalar::Text("Ada".into())));
        assert_eq!(person.scalar("height"), Some(&Scalar::Float(1.7)));
    }

    #[test]
    fn numeric_keys_become_text() {
        let tree = parse("1: one\n").unwrap();
        assert_eq!(tree.scalar("1"), Some(&Scalar::Text("one".into())));
    }

    #[test]
    fn rejects_sequences_and_nulls() {
        let err = parse("tags:\n  - a\n").unwrap_err();
        assert!(err.to_string().contains("'tags' holds a sequence"));
        let err = parse("person:\n  age: ~\n").unwrap_err();
        assert!(err.to_string().contains("'person.age' is null"));
    }

    #[test]
    fn empty_document_is_empty_tree() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn renders_in_insertion_order() {
        let tree = ConfigTree::new().with("zeta", 1).with("alpha", "x");
        assert_eq!(render(&tree).unwrap(), "zeta: 1\nalpha: x\n");
    }
}
