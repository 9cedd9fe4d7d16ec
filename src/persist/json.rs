//! JSON documents

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use super::key_path;
use crate::error::{FormSyncError, Result};
use crate::value::{ConfigTree, Node, Scalar};

pub(super) fn parse(text: &str) -> Result<ConfigTree> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => tree_from_object(map, ""),
        other => Err(FormSyncError::invalid_config(format!(
            "top level of a JSON document must be an object, found {}",
            kind_of(&other)
        ))),
    }
}

pub(super) fn render(tree: &ConfigTree) -> Result<String> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    tree.serialize(&mut serializer)?;
    out.push(b'\n');
    String::from_utf8(out).map_err(|e| FormSyncError::invalid_config(e.to_string()))
}

fn tree_from_object(map: Map<String, Value>, parent: &str) -> Result<ConfigTree> {
    let mut tree = ConfigTree::new();
    for (key, value) in map {
        let path = key_path(parent, &key);
        let node = match value {
            Value::Object(inner) => Node::Tree(tree_from_object(inner, &path)?),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Scalar(Scalar::Int(i)),
                None => Node::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => Node::Scalar(Scalar::Text(s)),
            other => {
                return Err(FormSyncError::invalid_config(format!(
                    "'{}' holds {}, only objects and scalars are supported",
                    path,
                    kind_of(&other)
                )))
            }
        };
        tree.insert(key, node);
    }
    Ok(tree)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
