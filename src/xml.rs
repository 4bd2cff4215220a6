//! XML adapter.
//!
//! Schema documents are parsed with `roxmltree` and mirrored into an owned
//! [`XmlNode`] tree that carries `file:line` locations, so the rest of the
//! library never borrows the backing text. The adapter implements the DSL's
//! property model: a property may be given either as an attribute
//! (`name="v"`) or as a child element (`<name value="v"/>` or
//! `<name>v</name>`); the two forms are interchangeable and providing a
//! value both ways is an error.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use multimap::MultiMap;

use crate::error::{Error, ErrorKind, Result};
use crate::logger::Logger;
use crate::text;

/// Properties of a node, merged from attributes and property children.
/// A multimap so that duplicated definitions can be detected afterwards.
pub type PropsMap = MultiMap<String, String>;

/// Source position of an element, printed as `file:line`.
#[derive(Debug, Clone)]
pub struct Location {
    file: Arc<str>,
    line: u32,
}

impl Location {
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Owned mirror of an XML element.
#[derive(Debug, Clone)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    text: Option<String>,
    loc: Location,
}

/// A parsed schema document.
#[derive(Debug)]
pub struct XmlDoc {
    pub file: String,
    pub root: XmlNode,
}

impl XmlDoc {
    /// Reads and parses a schema file.
    pub fn load(path: &Path, logger: &Logger) -> Result<XmlDoc> {
        let display = path.display().to_string();
        let data = fs::read_to_string(path).map_err(|err| {
            let msg = format!("Failed to read \"{}\": {}", display, err);
            logger.error(&msg);
            Error::new(ErrorKind::IoError, msg)
        })?;
        Self::parse(&display, &data, logger)
    }

    /// Parses schema text; `file` is used only for diagnostics.
    pub fn parse(file: &str, data: &str, logger: &Logger) -> Result<XmlDoc> {
        let doc = roxmltree::Document::parse(data).map_err(|err| {
            let msg = format!("{}: {}", file, err);
            logger.error(&msg);
            Error::new(ErrorKind::BadXml, msg)
        })?;

        let file_arc: Arc<str> = Arc::from(file);
        let root = mirror(&doc, doc.root_element(), &file_arc);
        Ok(XmlDoc {
            file: file.to_string(),
            root,
        })
    }
}

fn mirror(doc: &roxmltree::Document<'_>, node: roxmltree::Node<'_, '_>, file: &Arc<str>) -> XmlNode {
    let line = doc.text_pos_at(node.range().start).row;
    let attrs = node
        .attributes()
        .map(|a| (a.name().to_string(), a.value().trim().to_string()))
        .collect();

    let children: Vec<XmlNode> = node
        .children()
        .filter(|c| c.is_element())
        .map(|c| mirror(doc, c, file))
        .collect();

    // Text content is meaningful only for element-free nodes, matching the
    // "<name>value</name>" property form.
    let text = if children.is_empty() {
        node.text().map(|t| t.to_string()).filter(|t| !t.trim().is_empty())
    } else {
        None
    };

    XmlNode {
        name: node.tag_name().name().to_string(),
        attrs,
        children,
        text,
        loc: Location {
            file: Arc::clone(file),
            line,
        },
    }
}

impl XmlNode {
    pub fn location(&self) -> &Location {
        &self.loc
    }

    /// Diagnostics prefix for this element.
    pub fn log_prefix(&self) -> String {
        format!("{}: ", self.loc)
    }

    /// All attribute properties of this node.
    pub fn props(&self) -> PropsMap {
        let mut map = PropsMap::new();
        for (name, value) in &self.attrs {
            map.insert(name.clone(), value.clone());
        }
        map
    }

    /// Child elements, optionally filtered by name.
    pub fn children_named<'a>(&'a self, names: &[&str]) -> Vec<&'a XmlNode> {
        self.children
            .iter()
            .filter(|c| names.is_empty() || names.contains(&c.name.as_str()))
            .collect()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn has_any_child(&self, names: &[&str]) -> bool {
        self.children.iter().any(|c| names.contains(&c.name.as_str()))
    }

    /// Element-free text content.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Serialises the element back to text, used to preserve unrecognised
    /// children verbatim.
    pub fn outer_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }

        if self.children.is_empty() && self.text.is_none() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape_text(text.trim()));
        }
        for child in &self.children {
            child.write_xml(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('"', "&quot;")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;")
}

/// Extracts the single value of a property-form child element
/// (`<name value="v"/>` or `<name>v</name>`). Specifying both forms at once
/// is an error; a missing value is an error only when `must_have` is set.
pub fn parse_node_value(node: &XmlNode, logger: &Logger, must_have: bool) -> Result<Option<String>> {
    let attr_value = node
        .attrs
        .iter()
        .find(|(name, _)| name == "value")
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty());

    let text_value = node
        .text()
        .map(|t| text::normalise(t))
        .filter(|t| !t.is_empty());

    match (attr_value, text_value) {
        (Some(_), Some(_)) => {
            let msg = format!(
                "{}Incorrect value format for \"{}\" element.",
                node.log_prefix(),
                node.name
            );
            logger.error(&msg);
            Err(Error::new(ErrorKind::BadXml, msg))
        }
        (Some(v), None) | (None, Some(v)) => Ok(Some(v)),
        (None, None) if must_have => {
            let msg = format!("{}No value for \"{}\" element.", node.log_prefix(), node.name);
            logger.error(&msg);
            Err(Error::new(ErrorKind::BadXml, msg))
        }
        (None, None) => Ok(None),
    }
}

/// Folds the listed child elements of `node` into `props` as if they were
/// attributes.
pub fn parse_children_as_props(
    node: &XmlNode,
    names: &[&str],
    logger: &Logger,
    props: &mut PropsMap,
    must_have_value: bool,
) -> Result<()> {
    for child in &node.children {
        if !names.contains(&child.name.as_str()) {
            continue;
        }

        match parse_node_value(child, logger, must_have_value) {
            Ok(Some(value)) => props.insert(child.name.clone(), value),
            Ok(None) => {}
            Err(err) if must_have_value => return Err(err),
            Err(_) => {}
        }
    }
    Ok(())
}

/// Collects the node's properties: attributes plus the listed property-form
/// children.
pub fn parse_props(
    node: &XmlNode,
    children_as_props: &[&str],
    logger: &Logger,
) -> Result<PropsMap> {
    let mut props = node.props();
    parse_children_as_props(node, children_as_props, logger, &mut props, true)?;
    Ok(props)
}

/// Ensures the property appears at most once (and at least once when
/// `must_have` is set).
pub fn validate_single_prop(
    node: &XmlNode,
    props: &PropsMap,
    name: &str,
    logger: &Logger,
    must_have: bool,
) -> Result<()> {
    let count = props.get_vec(name).map_or(0, Vec::len);
    if count > 1 {
        let msg = format!(
            "{}Too many values of \"{}\" property for \"{}\" element.",
            node.log_prefix(),
            name,
            node.name
        );
        logger.error(&msg);
        return Err(Error::new(ErrorKind::BadXml, msg));
    }

    if count == 0 && must_have {
        let msg = format!(
            "{}Missing value for mandatory property \"{}\" for \"{}\" element.",
            node.log_prefix(),
            name,
            node.name
        );
        logger.error(&msg);
        return Err(Error::new(ErrorKind::BadXml, msg));
    }

    Ok(())
}

/// Ensures the property is absent.
pub fn validate_no_prop(node: &XmlNode, props: &PropsMap, name: &str, logger: &Logger) -> Result<()> {
    if props.get(name).is_some() {
        let msg = format!(
            "{}Property \"{}\" is not applicable to \"{}\" element.",
            node.log_prefix(),
            name,
            node.name
        );
        logger.error(&msg);
        return Err(Error::new(ErrorKind::SchemaRule, msg));
    }
    Ok(())
}

/// Reports (and returns) the standard unexpected-property-value error.
pub fn unexpected_prop_value(
    node: &XmlNode,
    elem_name: &str,
    prop: &str,
    value: &str,
    logger: &Logger,
) -> Error {
    let msg = format!(
        "{}Property \"{}\" of element \"{}\" has unexpected value ({}).",
        node.log_prefix(),
        prop,
        elem_name,
        value
    );
    logger.error(&msg);
    Error::new(ErrorKind::SchemaRule, msg)
}

/// Attributes not listed in `known`, sorted by name. Attributes starting
/// with one of `expected_prefixes` are collected silently, anything else
/// draws a warning.
pub fn extra_attrs(
    node: &XmlNode,
    known: &[&str],
    expected_prefixes: &[String],
    logger: &Logger,
) -> Vec<(String, String)> {
    let mut extras: Vec<(String, String)> = node
        .attrs
        .iter()
        .filter(|(name, _)| !known.contains(&name.as_str()))
        .cloned()
        .collect();
    extras.sort();

    for (name, _) in &extras {
        if !expected_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            logger.warning(format!("{}Unexpected attribute \"{}\".", node.log_prefix(), name));
        }
    }
    extras
}

/// Serialised contents of child elements not listed in `known`.
pub fn extra_children(
    node: &XmlNode,
    known: &[&str],
    expected_prefixes: &[String],
    logger: &Logger,
) -> Vec<String> {
    let mut result = Vec::new();
    for child in &node.children {
        if known.contains(&child.name.as_str()) {
            continue;
        }

        if !expected_prefixes.iter().any(|p| child.name.starts_with(p.as_str())) {
            logger.warning(format!(
                "{}Unexpected element \"{}\".",
                child.log_prefix(),
                child.name
            ));
        }
        result.push(child.outer_xml());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &str) -> XmlDoc {
        XmlDoc::parse("test.xml", data, &Logger::default()).unwrap()
    }

    #[test]
    fn attribute_and_child_props_are_interchangeable() {
        let logger = Logger::default();
        let doc = parse(r#"<int name="F1"><defaultValue value="5"/></int>"#);
        let props = parse_props(&doc.root, &["defaultValue"], &logger).unwrap();
        assert_eq!(Some(&"F1".to_string()), props.get("name"));
        assert_eq!(Some(&"5".to_string()), props.get("defaultValue"));
    }

    #[test]
    fn both_forms_at_once_fail() {
        let logger = Logger::default();
        let doc = parse(r#"<int name="F1" defaultValue="1"><defaultValue value="5"/></int>"#);
        let props = parse_props(&doc.root, &["defaultValue"], &logger).unwrap();
        let err = validate_single_prop(&doc.root, &props, "defaultValue", &logger, false).unwrap_err();
        assert_eq!(ErrorKind::BadXml, err.kind());
    }

    #[test]
    fn value_attr_and_text_conflict() {
        let logger = Logger::default();
        let doc = parse(r#"<f><description value="a">b</description></f>"#);
        let child = &doc.root.children[0];
        assert!(parse_node_value(child, &logger, true).is_err());
    }

    #[test]
    fn locations_carry_file_and_line() {
        let doc = parse("<schema>\n  <ns name=\"n\"/>\n</schema>");
        let ns = &doc.root.children[0];
        assert_eq!("test.xml", ns.location().file());
        assert_eq!(2, ns.location().line());
    }

    #[test]
    fn extra_children_are_preserved_verbatim() {
        let logger = Logger::default();
        let doc = parse(r#"<schema><custom attr="x">text</custom></schema>"#);
        let extras = extra_children(&doc.root, &["ns"], &[], &logger);
        assert_eq!(vec![r#"<custom attr="x">text</custom>"#.to_string()], extras);
    }

    #[test]
    fn expected_prefix_silences_warning() {
        let seen = std::rc::Rc::new(std::cell::Cell::new(0usize));
        let seen2 = std::rc::Rc::clone(&seen);
        let logger = Logger::new(Box::new(move |level, _| {
            if level == crate::Level::Warning {
                seen2.set(seen2.get() + 1);
            }
        }));
        let doc = XmlDoc::parse("t.xml", r#"<f ext.meta="1" odd="2"/>"#, &logger).unwrap();
        let extras = extra_attrs(&doc.root, &[], &["ext.".to_string()], &logger);
        assert_eq!(2, extras.len());
        assert_eq!(1, seen.get());
    }
}
