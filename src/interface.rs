//! `<interface>` entities: the common base of all messages, carrying the
//! transport fields shared by every message class.

use crate::alias::{self, Alias};
use crate::ctx::{ParentInfo, ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::{self, Field, SUPPORTED_TYPES};
use crate::text;
use crate::xml::{self, Location, PropsMap, XmlNode};

const COMMON_PROPS: &[&str] = &["name", "description", "copyFieldsFrom"];

#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub description: String,
    pub fields: Vec<Field>,
    pub aliases: Vec<Alias>,
    pub extra_attrs: Vec<(String, String)>,
    pub extra_children: Vec<String>,
    pub external_ref: String,
    loc: Location,
}

impl Interface {
    pub(crate) fn parse(node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<Interface> {
        let mut props = node.props();
        xml::parse_children_as_props(node, COMMON_PROPS, ctx.logger, &mut props, true)?;

        let mut interface = Interface {
            name: String::new(),
            description: String::new(),
            fields: Vec::new(),
            aliases: Vec::new(),
            extra_attrs: Vec::new(),
            extra_children: Vec::new(),
            external_ref: String::new(),
            loc: node.location().clone(),
        };

        xml::validate_single_prop(node, &props, "name", ctx.logger, true)?;
        interface.name = props.get("name").cloned().unwrap_or_default();
        if !text::is_valid_name(&interface.name) {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Invalid value for name property \"{}\".", interface.name),
            ));
        }

        field::update_string_prop(node, &props, "description", &mut interface.description, true, ctx)?;
        interface.copy_fields(node, &props, ctx)?;
        interface.update_fields(node, ctx)?;
        alias::parse_aliases(node, &interface.fields, &mut interface.aliases, ctx)?;

        let prefixes = ctx.protocol.extra_element_prefixes();
        interface.extra_attrs = xml::extra_attrs(node, COMMON_PROPS, prefixes, ctx.logger);

        let mut known: Vec<&str> = COMMON_PROPS.to_vec();
        known.extend(SUPPORTED_TYPES);
        known.push("fields");
        known.push("alias");
        interface.extra_children = xml::extra_children(node, &known, prefixes, ctx.logger);

        Ok(interface)
    }

    pub fn location(&self) -> &Location {
        &self.loc
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    fn copy_fields(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "copyFieldsFrom", ctx.logger, false)?;
        let Some(value) = props.get("copyFieldsFrom") else {
            return Ok(());
        };

        let Some(other) = ctx.protocol.find_interface(value) else {
            return Err(ctx.err(
                ErrorKind::UnresolvedReference,
                node,
                format!("Invalid reference to other interface \"{}\".", value),
            ));
        };

        self.fields = other.fields.clone();
        self.aliases = other.aliases.clone();
        Ok(())
    }

    fn update_fields(&mut self, node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<()> {
        let field_nodes = field::collect_member_nodes(node, "interface", "fields", SUPPORTED_TYPES, ctx)?;
        let member_ctx = ctx.child(ParentInfo {
            kind: ParentKind::Interface,
            since: 0,
            deprecated: crate::version::NOT_YET_DEPRECATED,
        });

        for field_node in field_nodes {
            let parsed = Field::parse(field_node, &member_ctx)?;
            parsed.verify_siblings(&self.fields, &member_ctx)?;
            self.fields.push(parsed);
        }

        field::validate_members_names(&self.fields, ctx)
    }
}
