//! `<message>` entities.

use itertools::Itertools;

use crate::alias::{self, Alias};
use crate::ctx::{ParentInfo, ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::{self, Field, SUPPORTED_TYPES};
use crate::text;
use crate::version::{self, NOT_YET_DEPRECATED};
use crate::xml::{self, Location, PropsMap, XmlNode};

const COMMON_PROPS: &[&str] = &[
    "name",
    "id",
    "displayName",
    "description",
    "sinceVersion",
    "deprecated",
    "removed",
    "copyFieldsFrom",
    "order",
    "platforms",
    "customizable",
    "sender",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sender {
    #[default]
    Both,
    Client,
    Server,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub id: u64,
    pub order: u32,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub deprecated_removed: bool,
    pub sender: Sender,
    /// Empty means "all platforms".
    pub platforms: Vec<String>,
    pub customizable: bool,
    pub fields: Vec<Field>,
    pub aliases: Vec<Alias>,
    pub extra_attrs: Vec<(String, String)>,
    pub extra_children: Vec<String>,
    /// Namespace-qualified reference (`ns1.ns2.Name`), assigned on insert.
    pub external_ref: String,
    loc: Location,
}

impl Message {
    pub(crate) fn parse(node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<Message> {
        let mut props = node.props();
        xml::parse_children_as_props(node, COMMON_PROPS, ctx.logger, &mut props, true)?;

        let mut msg = Message {
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            id: 0,
            order: 0,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
            deprecated_removed: false,
            sender: Sender::Both,
            platforms: Vec::new(),
            customizable: false,
            fields: Vec::new(),
            aliases: Vec::new(),
            extra_attrs: Vec::new(),
            extra_children: Vec::new(),
            external_ref: String::new(),
            loc: node.location().clone(),
        };

        msg.update_name(node, &props, ctx)?;
        field::update_string_prop(node, &props, "displayName", &mut msg.display_name, true, ctx)?;
        field::update_string_prop(node, &props, "description", &mut msg.description, true, ctx)?;
        msg.update_id(node, &props, ctx)?;
        msg.update_order(node, &props, ctx)?;
        msg.update_versions(node, &props, ctx)?;
        msg.update_platforms(node, &props, ctx)?;
        field::update_bool_prop(node, &props, "customizable", &mut msg.customizable, ctx)?;
        msg.update_sender(node, &props, ctx)?;
        msg.copy_fields(node, &props, ctx)?;
        msg.update_fields(node, ctx)?;
        alias::parse_aliases(node, &msg.fields, &mut msg.aliases, ctx)?;

        let prefixes = ctx.protocol.extra_element_prefixes();
        msg.extra_attrs = xml::extra_attrs(node, COMMON_PROPS, prefixes, ctx.logger);

        let mut known: Vec<&str> = COMMON_PROPS.to_vec();
        known.extend(SUPPORTED_TYPES);
        known.push("fields");
        known.push("alias");
        msg.extra_children = xml::extra_children(node, &known, prefixes, ctx.logger);

        Ok(msg)
    }

    pub fn location(&self) -> &Location {
        &self.loc
    }

    /// Minimal serialized length of the message payload; fields added in
    /// later versions do not contribute.
    pub fn min_length(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| f.base.since_version <= self.since_version)
            .map(Field::min_length)
            .sum()
    }

    /// Maximal serialized length, saturating.
    pub fn max_length(&self) -> usize {
        field::sum_max_lengths(&self.fields)
    }

    fn update_name(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "name", ctx.logger, true)?;
        self.name = props.get("name").cloned().unwrap_or_default();
        if !text::is_valid_name(&self.name) {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Invalid value for name property \"{}\".", self.name),
            ));
        }
        Ok(())
    }

    fn update_id(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "id", ctx.logger, true)?;
        let value = props.get("id").unwrap();

        if let Some(resolved) = ctx.protocol.str_to_enum_value(value) {
            self.id = resolved as u64;
            return Ok(());
        }

        self.id = text::parse_uint_max(value)
            .ok_or_else(|| xml::unexpected_prop_value(node, &self.name, "id", value, ctx.logger))?;
        Ok(())
    }

    fn update_order(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "order", ctx.logger, false)?;
        if let Some(value) = props.get("order") {
            self.order = text::parse_unsigned(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &self.name, "order", value, ctx.logger))?;
        }
        Ok(())
    }

    fn update_versions(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        for prop in ["sinceVersion", "deprecated", "removed"] {
            xml::validate_single_prop(node, props, prop, ctx.logger, false)?;
        }

        let mut since = 0;
        let mut deprecated = NOT_YET_DEPRECATED;
        version::get_and_check_versions(
            node,
            &self.name,
            props,
            &mut since,
            &mut deprecated,
            ctx.schema().version,
            ctx.logger,
        )?;

        let mut removed = false;
        if let Some(value) = props.get("removed") {
            removed = text::parse_bool(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &self.name, "removed", value, ctx.logger))?;
            if removed && deprecated == NOT_YET_DEPRECATED {
                ctx.warn(
                    node,
                    "Property \"removed\" is not applicable to non deprecated messages",
                );
            }
        }

        self.since_version = since;
        self.deprecated_since = deprecated;
        self.deprecated_removed = removed;
        Ok(())
    }

    fn update_platforms(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "platforms", ctx.logger, false)?;
        let Some(value) = props.get("platforms") else {
            return Ok(());
        };

        let invalid = || xml::unexpected_prop_value(node, &self.name, "platforms", value, ctx.logger);

        let mut chars = value.chars();
        let op = chars.next().ok_or_else(invalid)?;
        if op != '+' && op != '-' {
            return Err(invalid());
        }

        let mut listed: Vec<String> = Vec::new();
        for item in chars.as_str().split(',') {
            let item = item.trim();
            if item.is_empty() {
                return Err(invalid());
            }
            listed.push(item.to_string());
        }
        if listed.is_empty() {
            return Err(invalid());
        }

        let all_platforms = ctx.protocol.platforms();
        for platform in &listed {
            if !all_platforms.contains(platform) {
                return Err(ctx.err(
                    ErrorKind::UnresolvedReference,
                    node,
                    format!("Platform \"{}\" hasn't been defined.", platform),
                ));
            }
        }

        listed = listed.into_iter().sorted().dedup().collect();

        if op == '+' {
            self.platforms = listed;
            return Ok(());
        }

        self.platforms = all_platforms
            .iter()
            .filter(|p| !listed.contains(p))
            .cloned()
            .collect();
        if self.platforms.is_empty() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Message \"{}\" is not supported in any platform.", self.name),
            ));
        }
        Ok(())
    }

    fn update_sender(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "sender", ctx.logger, false)?;
        let Some(value) = props.get("sender") else {
            return Ok(());
        };

        self.sender = match value.to_ascii_lowercase().as_str() {
            "both" => Sender::Both,
            "client" => Sender::Client,
            "server" => Sender::Server,
            _ => {
                return Err(xml::unexpected_prop_value(node, &self.name, "sender", value, ctx.logger));
            }
        };
        Ok(())
    }

    fn copy_fields(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "copyFieldsFrom", ctx.logger, false)?;
        let Some(value) = props.get("copyFieldsFrom") else {
            return Ok(());
        };

        let Some(other) = ctx.protocol.find_message(value) else {
            return Err(ctx.err(
                ErrorKind::UnresolvedReference,
                node,
                format!("Invalid reference to other message \"{}\".", value),
            ));
        };

        self.fields = other.fields.clone();
        self.aliases = other.aliases.clone();

        // Inherited fields removed before this message appeared are dropped;
        // the rest re-anchor at this message's version.
        let since = self.since_version;
        self.fields
            .retain(|f| !(f.base.deprecated_removed && f.base.deprecated_since <= since));
        for f in &mut self.fields {
            f.base.since_version = f.base.since_version.max(since);
        }
        Ok(())
    }

    fn update_fields(&mut self, node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<()> {
        let field_nodes = field::collect_member_nodes(node, "message", "fields", SUPPORTED_TYPES, ctx)?;
        let member_ctx = ctx.child(ParentInfo {
            kind: ParentKind::Message,
            since: self.since_version,
            deprecated: self.deprecated_since,
        });

        for field_node in field_nodes {
            let parsed = Field::parse(field_node, &member_ctx)?;
            parsed.verify_siblings(&self.fields, &member_ctx)?;
            self.fields.push(parsed);
        }

        field::validate_members_names(&self.fields, ctx)
    }
}
