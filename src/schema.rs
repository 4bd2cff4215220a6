//! Top-level `<schema>` element: properties shared across every schema file
//! of the protocol.

use crate::error::{ErrorKind, Result};
use crate::logger::Logger;
use crate::text;
use crate::xml::{self, XmlNode};

/// Byte order of serialized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    Big,
    #[default]
    Little,
}

/// Parses an `endian` property value, falling back to `default` when the
/// value is empty/absent.
pub fn parse_endian(value: Option<&str>, default: Endian) -> Option<Endian> {
    match value.map(str::trim) {
        None | Some("") => Some(default),
        Some(v) if v.eq_ignore_ascii_case("big") => Some(Endian::Big),
        Some(v) if v.eq_ignore_ascii_case("little") => Some(Endian::Little),
        Some(_) => None,
    }
}

const PROP_NAMES: &[&str] = &[
    "name",
    "id",
    "version",
    "dslVersion",
    "endian",
    "description",
    "nonUniqueMsgIdAllowed",
];

/// Validated `<schema>` header.
#[derive(Debug, Default)]
pub struct SchemaHeader {
    pub name: String,
    pub description: String,
    pub id: u32,
    pub version: u32,
    pub dsl_version: u32,
    pub endian: Endian,
    pub non_unique_msg_id_allowed: bool,
    pub extra_attrs: Vec<(String, String)>,
    pub extra_children: Vec<String>,
    props: Vec<(String, String)>,
}

impl SchemaHeader {
    pub fn parse(node: &XmlNode, extra_prefixes: &[String], logger: &Logger) -> Result<SchemaHeader> {
        let props = xml::parse_props(node, PROP_NAMES, logger)?;

        let mut header = SchemaHeader::default();
        for name in PROP_NAMES {
            xml::validate_single_prop(node, &props, name, logger, false)?;
        }

        if let Some(value) = props.get("name") {
            header.name = value.clone();
        }
        if let Some(value) = props.get("description") {
            header.description = value.clone();
        }

        for (prop, slot) in [
            ("id", &mut header.id),
            ("version", &mut header.version),
            ("dslVersion", &mut header.dsl_version),
        ] {
            if let Some(value) = props.get(prop) {
                *slot = text::parse_unsigned(value)
                    .ok_or_else(|| xml::unexpected_prop_value(node, "schema", prop, value, logger))?;
            }
        }

        header.endian = parse_endian(props.get("endian").map(String::as_str), Endian::Little)
            .ok_or_else(|| {
                xml::unexpected_prop_value(
                    node,
                    "schema",
                    "endian",
                    props.get("endian").map(String::as_str).unwrap_or(""),
                    logger,
                )
            })?;

        if let Some(value) = props.get("nonUniqueMsgIdAllowed") {
            header.non_unique_msg_id_allowed = text::parse_bool(value).ok_or_else(|| {
                xml::unexpected_prop_value(node, "schema", "nonUniqueMsgIdAllowed", value, logger)
            })?;
        }

        if !header.name.is_empty() && !text::is_valid_name(&header.name) {
            let msg = format!(
                "{}Property \"name\" has unexpected value ({}).",
                node.log_prefix(),
                header.name
            );
            logger.error(&msg);
            return Err(crate::error::Error::new(ErrorKind::SchemaRule, msg));
        }

        header.extra_attrs = xml::extra_attrs(node, PROP_NAMES, extra_prefixes, logger);

        let mut known: Vec<&str> = PROP_NAMES.to_vec();
        known.extend(crate::namespace::EXPECTED_SCHEMA_CHILDREN);
        known.push("platforms");
        known.push("platform");
        header.extra_children = xml::extra_children(node, &known, extra_prefixes, logger);

        header.props = PROP_NAMES
            .iter()
            .filter_map(|name| props.get(*name).map(|v| (name.to_string(), v.clone())))
            .collect();

        Ok(header)
    }

    /// Explicit properties, used to cross-check re-declarations in later
    /// schema files.
    pub fn explicit_props(&self) -> &[(String, String)] {
        &self.props
    }

    /// Merges the header parsed from a later schema file into the first one.
    /// Explicit properties must agree; extra attributes merge with a warning
    /// on conflict; extra children concatenate.
    pub fn merge(&mut self, other: SchemaHeader, node: &XmlNode, logger: &Logger) -> Result<()> {
        for (name, value) in other.explicit_props() {
            let known = self.props.iter().find(|(n, _)| n == name);
            if known.map(|(_, v)| v) != Some(value) {
                let msg = format!(
                    "{}Value of \"{}\" property of \"schema\" element differs from the first one.",
                    node.log_prefix(),
                    name
                );
                logger.error(&msg);
                return Err(crate::error::Error::new(ErrorKind::SchemaRule, msg));
            }
        }

        for (name, value) in other.extra_attrs {
            match self.extra_attrs.iter().find(|(n, _)| *n == name) {
                None => self.extra_attrs.push((name, value)),
                Some((_, existing)) if *existing == value => {}
                Some(_) => logger.warning(format!(
                    "{}Value of \"{}\" attribute of \"schema\" element differs from the previous one.",
                    node.log_prefix(),
                    name
                )),
            }
        }

        self.extra_children.extend(other.extra_children);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDoc;

    fn parse(data: &str) -> Result<SchemaHeader> {
        let logger = Logger::default();
        let doc = XmlDoc::parse("s.xml", data, &logger)?;
        SchemaHeader::parse(&doc.root, &[], &logger)
    }

    #[test]
    fn full_header() {
        let header = parse(
            r#"<schema name="X" id="1" version="5" dslVersion="2" endian="big" nonUniqueMsgIdAllowed="true"/>"#,
        )
        .unwrap();
        assert_eq!("X", header.name);
        assert_eq!(1, header.id);
        assert_eq!(5, header.version);
        assert_eq!(2, header.dsl_version);
        assert_eq!(Endian::Big, header.endian);
        assert!(header.non_unique_msg_id_allowed);
    }

    #[test]
    fn endian_defaults_to_little() {
        let header = parse(r#"<schema name="X" id="1" version="0"/>"#).unwrap();
        assert_eq!(Endian::Little, header.endian);
    }

    #[test]
    fn invalid_name_rejected() {
        let err = parse(r#"<schema name="1X" id="1" version="0"/>"#).unwrap_err();
        assert_eq!(ErrorKind::SchemaRule, err.kind());
    }

    #[test]
    fn merge_requires_consistent_props() {
        let logger = Logger::default();
        let doc1 = XmlDoc::parse("a.xml", r#"<schema name="X" id="1" version="3"/>"#, &logger).unwrap();
        let doc2 = XmlDoc::parse("b.xml", r#"<schema name="X" id="2"/>"#, &logger).unwrap();
        let mut first = SchemaHeader::parse(&doc1.root, &[], &logger).unwrap();
        let second = SchemaHeader::parse(&doc2.root, &[], &logger).unwrap();
        assert!(first.merge(second, &doc2.root, &logger).is_err());
    }
}
