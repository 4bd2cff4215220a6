//! Namespaces: named scopes holding fields, messages, interfaces, frames
//! and child namespaces. The anonymous global namespace has the empty name.

use std::collections::BTreeMap;

use crate::error::{Error, ErrorKind, Result};
use crate::field::Field;
use crate::frame::Frame;
use crate::interface::Interface;
use crate::logger::Logger;
use crate::message::Message;
use crate::text::access_key;
use crate::xml::{self, XmlNode};

/// Elements a schema/namespace node may directly contain.
pub const EXPECTED_SCHEMA_CHILDREN: &[&str] = &[
    "ns", "int", "float", "enum", "set", "bitfield", "bundle", "string", "data", "list", "ref",
    "optional", "variant", "message", "interface", "frame", "fields", "messages", "interfaces",
    "frames",
];

const NS_PROPS: &[&str] = &["name", "description"];

#[derive(Debug, Default)]
pub struct Namespace {
    pub name: String,
    pub description: String,
    pub namespaces: BTreeMap<String, Namespace>,
    /// Entities keyed by [`access_key`] (first character case-folded).
    fields: BTreeMap<String, Field>,
    messages: BTreeMap<String, Message>,
    interfaces: BTreeMap<String, Interface>,
    frames: BTreeMap<String, Frame>,
    pub extra_attrs: Vec<(String, String)>,
    pub extra_children: Vec<String>,
}

impl Namespace {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Namespace {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parses the lexical properties of an `<ns>` element.
    pub(crate) fn parse_props(
        node: &XmlNode,
        extra_prefixes: &[String],
        logger: &Logger,
    ) -> Result<Namespace> {
        let props = xml::parse_props(node, NS_PROPS, logger)?;
        xml::validate_single_prop(node, &props, "name", logger, true)?;
        xml::validate_single_prop(node, &props, "description", logger, false)?;

        let name = props.get("name").cloned().unwrap_or_default();
        if !crate::text::is_valid_name(&name) {
            return Err(xml::unexpected_prop_value(node, "ns", "name", &name, logger));
        }

        let mut ns = Namespace::new(name);
        ns.description = props.get("description").cloned().unwrap_or_default();
        ns.extra_attrs = xml::extra_attrs(node, NS_PROPS, extra_prefixes, logger);
        Ok(ns)
    }

    /// Merges the lexical properties of a re-opened namespace definition.
    pub(crate) fn merge_reopened(&mut self, other: Namespace, node: &XmlNode, logger: &Logger) {
        if !other.description.is_empty() && other.description != self.description {
            if self.description.is_empty() {
                self.description = other.description;
            } else {
                logger.warning(format!(
                    "{}Description of namespace \"{}\" differs to one encountered before.",
                    node.log_prefix(),
                    self.name
                ));
            }
        }

        for (name, value) in other.extra_attrs {
            match self.extra_attrs.iter().find(|(n, _)| *n == name) {
                None => self.extra_attrs.push((name, value)),
                Some((_, existing)) if *existing == value => {}
                Some(_) => logger.warning(format!(
                    "{}Value of attribute \"{}\" differs to one defined before.",
                    node.log_prefix(),
                    name
                )),
            }
        }

        self.extra_children.extend(other.extra_children);
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(&access_key(name))
    }

    pub fn find_message(&self, name: &str) -> Option<&Message> {
        self.messages.get(&access_key(name))
    }

    pub fn find_interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(&access_key(name))
    }

    pub fn find_frame(&self, name: &str) -> Option<&Frame> {
        self.frames.get(&access_key(name))
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.values()
    }

    pub(crate) fn insert_field(&mut self, field: Field, logger: &Logger) -> Result<()> {
        let key = access_key(field.name());
        if self.fields.contains_key(&key) {
            let msg = format!(
                "{}: Field with name \"{}\" has already been defined in this namespace.",
                field.location(),
                field.name()
            );
            logger.error(&msg);
            return Err(Error::new(ErrorKind::DuplicateName, msg));
        }
        self.fields.insert(key, field);
        Ok(())
    }

    pub(crate) fn insert_message(&mut self, message: Message, logger: &Logger) -> Result<()> {
        let key = access_key(&message.name);
        if self.messages.contains_key(&key) {
            let msg = format!(
                "{}: Message with name \"{}\" has already been defined in this namespace.",
                message.location(),
                message.name
            );
            logger.error(&msg);
            return Err(Error::new(ErrorKind::DuplicateName, msg));
        }
        self.messages.insert(key, message);
        Ok(())
    }

    pub(crate) fn insert_interface(&mut self, interface: Interface, logger: &Logger) -> Result<()> {
        let key = access_key(&interface.name);
        if self.interfaces.contains_key(&key) {
            let msg = format!(
                "{}: Interface with name \"{}\" has already been defined in this namespace.",
                interface.location(),
                interface.name
            );
            logger.error(&msg);
            return Err(Error::new(ErrorKind::DuplicateName, msg));
        }
        self.interfaces.insert(key, interface);
        Ok(())
    }

    pub(crate) fn insert_frame(&mut self, frame: Frame, logger: &Logger) -> Result<()> {
        let key = access_key(&frame.name);
        if self.frames.contains_key(&key) {
            let msg = format!(
                "{}: Frame with name \"{}\" has already been defined in this namespace.",
                frame.location(),
                frame.name
            );
            logger.error(&msg);
            return Err(Error::new(ErrorKind::DuplicateName, msg));
        }
        self.frames.insert(key, frame);
        Ok(())
    }
}
