//! XML documents
//!
//! Element tree ↔ [`ConfigTree`]:
//! - the document root becomes the single top-level key
//! - attributes become `@name` keys, text next to children or attributes
//!   becomes `#text`
//! - an element with neither children nor attributes is a text leaf
//!
//! Everything reads back as text. Repeated sibling elements have no
//! representation and are rejected.

use once_cell::sync::Lazy;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;

use crate::error::{FormSyncError, Result};
use crate::value::{ConfigTree, Node, Scalar};

const ATTRIBUTE_PREFIX: char = '@';
const TEXT_KEY: &str = "#text";

static XML_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9._-]*$").unwrap());

// ═══════════════════════════════════════════════════════════════
// Reading
// ═══════════════════════════════════════════════════════════════

/// Element being read
struct Frame {
    name: String,
    children: ConfigTree,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(FormSyncError::xml)?
            .to_string();
        let mut children = ConfigTree::new();
        for attr in start.attributes() {
            let attr = attr.map_err(FormSyncError::xml)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(FormSyncError::xml)?;
            let value = attr.unescape_value().map_err(FormSyncError::xml)?;
            children.insert(format!("{}{}", ATTRIBUTE_PREFIX, key), value.into_owned());
        }
        Ok(Self {
            name,
            children,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Node) {
        let Frame {
            name,
            mut children,
            text,
        } = self;
        if children.is_empty() {
            return (name, Node::Scalar(Scalar::Text(text)));
        }
        if !text.is_empty() {
            children.insert(TEXT_KEY, text);
        }
        (name, Node::Tree(children))
    }
}

pub(super) fn parse(text: &str) -> Result<ConfigTree> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<ConfigTree> = None;

    loop {
        match reader.read_event().map_err(FormSyncError::xml)? {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let frame = Frame::open(&start)?;
                attach(frame, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| FormSyncError::xml("unexpected closing tag"))?;
                attach(frame, &mut stack, &mut root)?;
            }
            Event::Text(t) => {
                let content = t.unescape().map_err(FormSyncError::xml)?;
                push_text(&mut stack, &content)?;
            }
            Event::CData(data) => {
                let content =
                    String::from_utf8(data.into_inner().into_owned()).map_err(FormSyncError::xml)?;
                push_text(&mut stack, &content)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(FormSyncError::xml(format!("element '{}' is never closed", open.name)));
    }
    root.ok_or_else(|| FormSyncError::xml("document has no root element"))
}

fn push_text(stack: &mut [Frame], content: &str) -> Result<()> {
    match stack.last_mut() {
        Some(frame) => {
            frame.text.push_str(content);
            Ok(())
        }
        None if content.trim().is_empty() => Ok(()),
        None => Err(FormSyncError::xml("text outside the root element")),
    }
}

fn attach(frame: Frame, stack: &mut [Frame], root: &mut Option<ConfigTree>) -> Result<()> {
    let (name, node) = frame.close();
    match stack.last_mut() {
        Some(parent) => {
            if parent.children.contains_key(&name) {
                return Err(FormSyncError::xml(format!(
                    "element '{}' repeats inside '{}', repeated elements are not supported",
                    name, parent.name
                )));
            }
            parent.children.insert(name, node);
        }
        None => {
            if root.is_some() {
                return Err(FormSyncError::xml("document has more than one root element"));
            }
            *root = Some(ConfigTree::new().with(name, node));
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// Writing
// ═══════════════════════════════════════════════════════════════

pub(super) fn render(tree: &ConfigTree) -> Result<String> {
    let mut entries = tree.iter();
    let (name, node) = match (entries.next(), entries.next()) {
        (Some(root), None) => root,
        _ => {
            return Err(FormSyncError::invalid_config(format!(
                "an XML document needs exactly one top-level key, found {}",
                tree.len()
            )))
        }
    };

    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(FormSyncError::xml)?;
    write_element(&mut writer, name, node)?;

    let mut out = String::from_utf8(writer.into_inner()).map_err(FormSyncError::xml)?;
    out.push('\n');
    Ok(out)
}

fn check_name(name: &str) -> Result<()> {
    if XML_NAME.is_match(name) {
        Ok(())
    } else {
        Err(FormSyncError::invalid_config(format!(
            "'{}' is not a valid XML name",
            name
        )))
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, node: &Node) -> Result<()> {
    check_name(name)?;
    let mut start = BytesStart::new(name);

    let tree = match node {
        Node::Scalar(value) => {
            let text = value.to_string();
            if text.is_empty() {
                return emit(writer, Event::Empty(start));
            }
            emit(writer, Event::Start(start))?;
            emit(writer, Event::Text(BytesText::new(&text)))?;
            return emit(writer, Event::End(BytesEnd::new(name)));
        }
        Node::Tree(tree) if tree.is_empty() => {
            // `<name/>` would read back as an empty text leaf
            return Err(FormSyncError::invalid_config(format!(
                "'{}' is an empty table, which XML cannot tell apart from empty text",
                name
            )));
        }
        Node::Tree(tree) => tree,
    };

    let mut text = None;
    let mut children = Vec::new();
    for (key, child) in tree.iter() {
        if let Some(attribute) = key.strip_prefix(ATTRIBUTE_PREFIX) {
            check_name(attribute)?;
            let value = scalar_text(key, child)?;
            start.push_attribute((attribute, value.as_str()));
        } else if key == TEXT_KEY {
            text = Some(scalar_text(key, child)?);
        } else {
            children.push((key, child));
        }
    }

    if text.is_none() && children.is_empty() {
        return emit(writer, Event::Empty(start));
    }
    emit(writer, Event::Start(start))?;
    if let Some(text) = text {
        emit(writer, Event::Text(BytesText::new(&text)))?;
    }
    for (key, child) in children {
        write_element(writer, key, child)?;
    }
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn scalar_text(key: &str, node: &Node) -> Result<String> {
    node.as_scalar().map(Scalar::to_string).ok_or_else(|| {
        FormSyncError::invalid_config(format!("'{}' must hold a scalar in XML", key))
    })
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(FormSyncError::xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROFILE: &str = r#"<?xml version="1.0"?>
<profile version="2">
    <age>19</age>
    <employed>false</employed>
    <address>
        <city>Berlin</city>
    </address>
    <notes lang="en">hello</notes>
    <empty/>
</profile>
"#;

    #[test]
    fn parses_elements_attributes_and_text() {
        let tree = parse(PROFILE).unwrap();
        let expected = ConfigTree::new().with(
            "profile",
            ConfigTree::new()
                .with("@version", "2")
                .with("age", "19")
                .with("employed", "false")
                .with("address", ConfigTree::new().with("city", "Berlin"))
                .with(
                    "notes",
                    ConfigTree::new().with("@lang", "en").with("#text", "hello"),
                )
                .with("empty", ""),
        );
        assert_eq!(tree, expected);
    }

    #[test]
    fn rejects_repeated_siblings() {
        let err = parse("<root><item>1</item><item>2</item></root>").unwrap_err();
        assert!(err.to_string().contains("'item' repeats inside 'root'"));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse("<root><open></root>").is_err());
        assert!(parse("").is_err());
        assert!(parse("<a/><b/>").is_err());
    }

    #[test]
    fn render_then_parse_keeps_structure_as_text() {
        let tree = ConfigTree::new().with(
            "settings",
            ConfigTree::new()
                .with("@id", 7)
                .with("age", 19)
                .with("employed", true)
                .with("name", "Ada & Bob"),
        );
        let text = render(&tree).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));

        let expected = ConfigTree::new().with(
            "settings",
            ConfigTree::new()
                .with("@id", "7")
                .with("age", "19")
                .with("employed", "true")
                .with("name", "Ada & Bob"),
        );
        assert_eq!(parse(&text).unwrap(), expected);
    }

    #[test]
    fn render_requires_single_root() {
        let tree = ConfigTree::new().with("a", 1).with("b", 2);
        assert!(matches!(
            render(&tree),
            Err(FormSyncError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn render_rejects_empty_tables() {
        let tree = ConfigTree::new().with(
            "root",
            ConfigTree::new().with("inner", ConfigTree::new()).with("x", "1"),
        );
        let err = render(&tree).unwrap_err();
        assert!(err.to_string().contains("'inner'"));
    }

    #[test]
    fn render_rejects_invalid_names() {
        let tree = ConfigTree::new().with("root", ConfigTree::new().with("first name", "x"));
        let err = render(&tree).unwrap_err();
        assert!(err.to_string().contains("'first name' is not a valid XML name"));
    }
}
