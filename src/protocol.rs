//! The protocol driver: owns the document set and drives
//! parse → validate → cross-verify.
//!
//! Construction is two-phase. Phase A registers every namespace and entity
//! node across all documents; Phase B parses entities in dependency order
//! (fields, interfaces, messages, frames) so cross-file and cross-kind
//! references resolve, while field-to-field references keep the
//! recorded-before-referenced rule. Inside a phase the first error of an
//! entity aborts that entity but siblings continue, so a single run surfaces
//! as many diagnostics as possible; the phase itself fails if any entity
//! failed.

use std::collections::BTreeMap;
use std::path::Path;

use crate::ctx::ParseCtx;
use crate::error::{Error, ErrorKind, Result};
use crate::field::{Field, SemanticType, SUPPORTED_TYPES};
use crate::frame::Frame;
use crate::interface::Interface;
use crate::logger::{Level, Logger};
use crate::message::Message;
use crate::namespace::Namespace;
use crate::reference;
use crate::schema::SchemaHeader;
use crate::text;
use crate::xml::{XmlDoc, XmlNode};

#[derive(Default)]
struct Pending<'d> {
    fields: Vec<(Vec<String>, &'d XmlNode)>,
    interfaces: Vec<(Vec<String>, &'d XmlNode)>,
    messages: Vec<(Vec<String>, &'d XmlNode)>,
    frames: Vec<(Vec<String>, &'d XmlNode)>,
}

#[derive(Debug)]
pub struct Protocol {
    logger: Logger,
    schema: SchemaHeader,
    schema_seen: bool,
    namespaces: BTreeMap<String, Namespace>,
    platforms: Vec<String>,
    extra_prefixes: Vec<String>,
    docs: Vec<XmlDoc>,
    validated: bool,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol {
    pub fn new() -> Protocol {
        Protocol::with_logger(Logger::default())
    }

    pub fn with_logger(logger: Logger) -> Protocol {
        Protocol {
            logger,
            schema: SchemaHeader::default(),
            schema_seen: false,
            namespaces: BTreeMap::new(),
            platforms: Vec::new(),
            extra_prefixes: Vec::new(),
            docs: Vec::new(),
            validated: false,
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn set_min_level(&self, level: Level) {
        self.logger.set_min_level(level);
    }

    /// Registers an element/attribute name prefix that silences
    /// unknown-child warnings.
    pub fn add_expected_extension_prefix(&mut self, prefix: impl Into<String>) {
        self.extra_prefixes.push(prefix.into());
    }

    /// Loads a schema file. May be called repeatedly before [`validate`].
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.validated {
            let msg = "Parsing extra files after validation is not allowed".to_string();
            self.logger.error(&msg);
            return Err(Error::new(ErrorKind::SchemaRule, msg));
        }
        let doc = XmlDoc::load(path.as_ref(), &self.logger)?;
        self.docs.push(doc);
        Ok(())
    }

    /// Parses schema text directly; `name` is used for diagnostics.
    pub fn parse_str(&mut self, name: &str, data: &str) -> Result<()> {
        if self.validated {
            let msg = "Parsing extra files after validation is not allowed".to_string();
            self.logger.error(&msg);
            return Err(Error::new(ErrorKind::SchemaRule, msg));
        }
        let doc = XmlDoc::parse(name, data, &self.logger)?;
        self.docs.push(doc);
        Ok(())
    }

    /// Builds and cross-verifies the IR from every loaded document. After a
    /// successful return the IR is frozen.
    pub fn validate(&mut self) -> Result<()> {
        if self.validated {
            return Ok(());
        }

        if self.docs.is_empty() {
            let msg = "Cannot validate without any schema files".to_string();
            self.logger.error(&msg);
            return Err(Error::new(ErrorKind::SchemaRule, msg));
        }

        let docs = std::mem::take(&mut self.docs);
        let result = self.build(&docs);
        self.docs = docs;
        result?;

        self.validated = true;
        Ok(())
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn schema(&self) -> &SchemaHeader {
        &self.schema
    }

    pub fn namespaces(&self) -> &BTreeMap<String, Namespace> {
        &self.namespaces
    }

    pub fn platforms(&self) -> &[String] {
        &self.platforms
    }

    pub fn extra_element_prefixes(&self) -> &[String] {
        &self.extra_prefixes
    }

    /// All messages of the protocol, ordered by `(id, order)`.
    pub fn all_messages(&self) -> Vec<&Message> {
        let mut result = Vec::new();
        fn walk<'p>(ns: &'p Namespace, out: &mut Vec<&'p Message>) {
            out.extend(ns.messages());
            for child in ns.namespaces.values() {
                walk(child, out);
            }
        }
        for ns in self.namespaces.values() {
            walk(ns, &mut result);
        }
        result.sort_by_key(|m| (m.id, m.order));
        result
    }

    pub fn all_interfaces(&self) -> Vec<&Interface> {
        let mut result = Vec::new();
        fn walk<'p>(ns: &'p Namespace, out: &mut Vec<&'p Interface>) {
            out.extend(ns.interfaces());
            for child in ns.namespaces.values() {
                walk(child, out);
            }
        }
        for ns in self.namespaces.values() {
            walk(ns, &mut result);
        }
        result
    }

    pub fn all_frames(&self) -> Vec<&Frame> {
        let mut result = Vec::new();
        fn walk<'p>(ns: &'p Namespace, out: &mut Vec<&'p Frame>) {
            out.extend(ns.frames());
            for child in ns.namespaces.values() {
                walk(child, out);
            }
        }
        for ns in self.namespaces.values() {
            walk(ns, &mut result);
        }
        result
    }

    pub fn find_field(&self, reference: &str) -> Option<&Field> {
        if !text::is_valid_ref_name(reference) {
            return None;
        }
        reference::find_field(&self.namespaces, reference)
    }

    pub fn find_message(&self, reference: &str) -> Option<&Message> {
        if !text::is_valid_ref_name(reference) {
            return None;
        }
        reference::find_message(&self.namespaces, reference)
    }

    pub fn find_interface(&self, reference: &str) -> Option<&Interface> {
        if !text::is_valid_ref_name(reference) {
            return None;
        }
        reference::find_interface(&self.namespaces, reference)
    }

    pub fn find_frame(&self, reference: &str) -> Option<&Frame> {
        if !text::is_valid_ref_name(reference) {
            return None;
        }
        reference::find_frame(&self.namespaces, reference)
    }

    // Feature gates derived from the schema's dslVersion; 0 means "latest".

    fn feature_supported(&self, min_dsl_version: u32) -> bool {
        let current = self.schema.dsl_version;
        current == 0 || min_dsl_version <= current
    }

    pub fn value_ref_supported(&self) -> bool {
        self.feature_supported(2)
    }

    pub fn length_semantic_supported(&self) -> bool {
        self.feature_supported(2)
    }

    pub fn ref_inheritance_supported(&self) -> bool {
        self.feature_supported(2)
    }

    pub fn non_unique_specials_supported(&self) -> bool {
        self.feature_supported(2)
    }

    pub fn aliases_supported(&self) -> bool {
        self.feature_supported(3)
    }

    /// Resolves an enum-value reference (`[ns.]EnumField.ValueName`).
    pub fn str_to_enum_value(&self, reference: &str) -> Option<i64> {
        if !text::is_valid_ref_name(reference) || !reference.contains('.') {
            return None;
        }

        let (field, member) = reference::find_field_value(&self.namespaces, reference)?;
        match &field.non_ref().kind {
            crate::field::FieldKind::Enum(e) if !member.is_empty() => {
                e.values.get(member).map(|v| v.value)
            }
            _ => None,
        }
    }

    /// Resolves a numeric value reference (`Field`, `Field.special`,
    /// `Bundle.Member.value`).
    pub fn str_to_numeric(&self, reference: &str) -> Option<(i64, bool)> {
        if !self.value_ref_supported() || !text::is_valid_ref_name(reference) {
            return None;
        }
        let (field, member) = reference::find_field_value(&self.namespaces, reference)?;
        let ctx = ParseCtx::new(self, &self.logger);
        field.str_to_numeric(member, &ctx)
    }

    pub fn str_to_data(&self, reference: &str) -> Option<Vec<u8>> {
        if !self.value_ref_supported() || !text::is_valid_ref_name(reference) {
            return None;
        }
        let (field, member) = reference::find_field_value(&self.namespaces, reference)?;
        field.str_to_data(member)
    }

    /// Resolves the `^Field` dereference notation used by string defaults,
    /// descriptions and display names. Leading backslashes escape the caret.
    pub fn str_to_string_value(&self, s: &str) -> Option<String> {
        if s.is_empty() || !self.value_ref_supported() {
            return Some(s.to_string());
        }

        if let Some(reference) = s.strip_prefix('^') {
            if !text::is_valid_ref_name(reference) {
                return None;
            }
            let (field, member) = reference::find_field_value(&self.namespaces, reference)?;
            return field.str_to_string(member);
        }

        let Some(caret_pos) = s.find('^') else {
            return Some(s.to_string());
        };

        if s[..caret_pos].bytes().all(|b| b == b'\\') {
            return Some(s[1..].to_string());
        }
        Some(s.to_string())
    }

    fn build(&mut self, docs: &[XmlDoc]) -> Result<()> {
        for doc in docs {
            if doc.root.name != "schema" {
                let msg = format!("Root element of \"{}\" is not \"schema\"", doc.file);
                self.logger.error(&msg);
                return Err(Error::new(ErrorKind::BadXml, msg));
            }

            let header = SchemaHeader::parse(&doc.root, &self.extra_prefixes, &self.logger)?;
            if !self.schema_seen {
                if header.name.is_empty() {
                    let msg = format!(
                        "{}First schema definition must define \"name\" property.",
                        doc.root.log_prefix()
                    );
                    self.logger.error(&msg);
                    return Err(Error::new(ErrorKind::SchemaRule, msg));
                }
                self.schema = header;
                self.schema_seen = true;
            } else {
                let mut merged = std::mem::take(&mut self.schema);
                let result = merged.merge(header, &doc.root, &self.logger);
                self.schema = merged;
                result?;
            }
        }

        for doc in docs {
            self.register_platforms(&doc.root)?;
        }

        let mut pending = Pending::default();
        for doc in docs {
            self.register_children(&doc.root, Vec::new(), &mut pending)?;
        }

        self.build_entities(&pending.fields, |protocol, path, node| {
            let field = {
                let ctx = ParseCtx::new(protocol, protocol.logger());
                Field::parse(node, &ctx)?
            };
            let Protocol { namespaces, logger, .. } = protocol;
            ns_mut(namespaces, path).insert_field(field, logger)
        })?;

        self.build_entities(&pending.interfaces, |protocol, path, node| {
            let mut interface = {
                let ctx = ParseCtx::new(protocol, protocol.logger());
                Interface::parse(node, &ctx)?
            };
            interface.external_ref = external_ref(path, &interface.name);
            let Protocol { namespaces, logger, .. } = protocol;
            ns_mut(namespaces, path).insert_interface(interface, logger)
        })?;

        self.build_entities(&pending.messages, |protocol, path, node| {
            let mut message = {
                let ctx = ParseCtx::new(protocol, protocol.logger());
                Message::parse(node, &ctx)?
            };
            message.external_ref = external_ref(path, &message.name);
            let Protocol { namespaces, logger, .. } = protocol;
            ns_mut(namespaces, path).insert_message(message, logger)
        })?;

        self.build_entities(&pending.frames, |protocol, path, node| {
            let mut frame = {
                let ctx = ParseCtx::new(protocol, protocol.logger());
                Frame::parse(node, &ctx)?
            };
            frame.external_ref = external_ref(path, &frame.name);
            let Protocol { namespaces, logger, .. } = protocol;
            ns_mut(namespaces, path).insert_frame(frame, logger)
        })?;

        self.verify_message_ids()?;
        self.verify_message_id_fields()?;
        self.verify_frames()?;
        Ok(())
    }

    fn build_entities<'d>(
        &mut self,
        items: &[(Vec<String>, &'d XmlNode)],
        mut build: impl FnMut(&mut Protocol, &[String], &'d XmlNode) -> Result<()>,
    ) -> Result<()> {
        let mut first_err = None;
        for (path, node) in items {
            if let Err(err) = build(self, path, node) {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn register_platforms(&mut self, root: &XmlNode) -> Result<()> {
        let mut platform_nodes: Vec<&XmlNode> = Vec::new();
        for group in root.children_named(&["platforms"]) {
            for child in &group.children {
                if child.name != "platform" {
                    let msg = format!(
                        "{}Unexpected element, \"platform\" is expected.",
                        child.log_prefix()
                    );
                    self.logger.error(&msg);
                    return Err(Error::new(ErrorKind::BadXml, msg));
                }
                platform_nodes.push(child);
            }
        }
        platform_nodes.extend(root.children_named(&["platform"]));

        for node in platform_nodes {
            let mut props = node.props();
            crate::xml::parse_children_as_props(node, &["name"], &self.logger, &mut props, true)?;
            let Some(name) = props.get("name") else {
                let msg = format!(
                    "{}Required property \"name\" is not defined.",
                    node.log_prefix()
                );
                self.logger.error(&msg);
                return Err(Error::new(ErrorKind::BadXml, msg));
            };

            if self.platforms.contains(name) {
                self.logger.warning(format!(
                    "{}Platform \"{}\" defined more than once.",
                    node.log_prefix(),
                    name
                ));
                continue;
            }

            if name.contains(&['+', '-', ','][..]) {
                let msg = format!("{}Invalid platform name ({}).", node.log_prefix(), name);
                self.logger.error(&msg);
                return Err(Error::new(ErrorKind::SchemaRule, msg));
            }

            self.platforms.push(name.clone());
        }

        self.platforms.sort();
        Ok(())
    }

    fn register_children<'d>(
        &mut self,
        node: &'d XmlNode,
        path: Vec<String>,
        pending: &mut Pending<'d>,
    ) -> Result<()> {
        for child in &node.children {
            let name = child.name.as_str();
            if name == "ns" {
                let parsed = Namespace::parse_props(child, &self.extra_prefixes, &self.logger)?;
                let ns_name = parsed.name.clone();
                {
                    let Protocol { namespaces, logger, .. } = &mut *self;
                    let container = ns_container(namespaces, &path);
                    match container.get_mut(&ns_name) {
                        Some(existing) => existing.merge_reopened(parsed, child, logger),
                        None => {
                            container.insert(ns_name.clone(), parsed);
                        }
                    }
                }

                let mut child_path = path.clone();
                child_path.push(ns_name);
                self.register_children(child, child_path, pending)?;
                continue;
            }

            if SUPPORTED_TYPES.contains(&name) {
                self.ensure_namespace(&path);
                pending.fields.push((path.clone(), child));
                continue;
            }

            match name {
                "message" => {
                    self.ensure_namespace(&path);
                    pending.messages.push((path.clone(), child));
                }
                "interface" => {
                    self.ensure_namespace(&path);
                    pending.interfaces.push((path.clone(), child));
                }
                "frame" => {
                    self.ensure_namespace(&path);
                    pending.frames.push((path.clone(), child));
                }
                "fields" => {
                    self.register_grouped(child, SUPPORTED_TYPES, &path, &mut pending.fields)?;
                }
                "messages" => {
                    self.register_grouped(child, &["message"], &path, &mut pending.messages)?;
                }
                "interfaces" => {
                    self.register_grouped(child, &["interface"], &path, &mut pending.interfaces)?;
                }
                "frames" => {
                    self.register_grouped(child, &["frame"], &path, &mut pending.frames)?;
                }
                _ => {
                    // Property children of <schema>/<ns> and extras were
                    // already consumed by the header/namespace parse.
                }
            }
        }
        Ok(())
    }

    fn register_grouped<'d>(
        &mut self,
        group: &'d XmlNode,
        allowed: &[&str],
        path: &[String],
        out: &mut Vec<(Vec<String>, &'d XmlNode)>,
    ) -> Result<()> {
        for child in &group.children {
            if !allowed.contains(&child.name.as_str()) {
                let msg = format!(
                    "{}Unexpected element \"{}\" inside \"{}\".",
                    child.log_prefix(),
                    child.name,
                    group.name
                );
                self.logger.error(&msg);
                return Err(Error::new(ErrorKind::BadXml, msg));
            }
            self.ensure_namespace(path);
            out.push((path.to_vec(), child));
        }
        Ok(())
    }

    fn ensure_namespace(&mut self, path: &[String]) {
        if path.is_empty() {
            self.namespaces
                .entry(String::new())
                .or_insert_with(|| Namespace::new(""));
        }
    }

    fn verify_message_ids(&self) -> Result<()> {
        let allow_non_unique = self.schema.non_unique_msg_id_allowed;
        let all = self.all_messages();

        for pair in all.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if first.id != second.id {
                continue;
            }

            if !allow_non_unique {
                let msg = format!(
                    "Messages \"{}\" and \"{}\" have the same id.",
                    first.external_ref, second.external_ref
                );
                self.logger.error(&msg);
                return Err(Error::new(ErrorKind::DuplicateName, msg));
            }

            if first.order == second.order {
                let msg = format!(
                    "Messages \"{}\" and \"{}\" have the same \"id\" and \"order\" values.",
                    first.external_ref, second.external_ref
                );
                self.logger.error(&msg);
                return Err(Error::new(ErrorKind::DuplicateName, msg));
            }
        }
        Ok(())
    }

    fn verify_message_id_fields(&self) -> Result<()> {
        fn count(ns: &Namespace) -> usize {
            ns.fields()
                .filter(|f| f.base.semantic_type == SemanticType::MessageId)
                .count()
                + ns.namespaces.values().map(count).sum::<usize>()
        }

        let total: usize = self.namespaces.values().map(count).sum();
        if 1 < total {
            let msg =
                "Only single field with \"messageId\" as semantic type is allowed.".to_string();
            self.logger.error(&msg);
            return Err(Error::new(ErrorKind::SchemaRule, msg));
        }
        Ok(())
    }

    fn verify_frames(&self) -> Result<()> {
        let ctx = ParseCtx::new(self, &self.logger);
        for frame in self.all_frames() {
            frame.verify_layers(&ctx)?;
        }
        Ok(())
    }
}

fn ns_container<'p>(
    namespaces: &'p mut BTreeMap<String, Namespace>,
    path: &[String],
) -> &'p mut BTreeMap<String, Namespace> {
    if path.is_empty() {
        return namespaces;
    }
    &mut ns_mut(namespaces, path).namespaces
}

fn ns_mut<'p>(
    namespaces: &'p mut BTreeMap<String, Namespace>,
    path: &[String],
) -> &'p mut Namespace {
    if path.is_empty() {
        return namespaces
            .entry(String::new())
            .or_insert_with(|| Namespace::new(""));
    }

    let mut iter = path.iter();
    let first = iter.next().unwrap();
    let mut current = namespaces
        .entry(first.clone())
        .or_insert_with(|| Namespace::new(first.clone()));
    for comp in iter {
        current = current
            .namespaces
            .entry(comp.clone())
            .or_insert_with(|| Namespace::new(comp.clone()));
    }
    current
}

fn external_ref(path: &[String], name: &str) -> String {
    if path.is_empty() {
        return name.to_string();
    }
    format!("{}.{}", path.join("."), name)
}
