//! `<string>` fields.

use crate::ctx::ParseCtx;
use crate::error::{ErrorKind, Result};
use crate::field::{self, Field, FieldBase, FieldKind, Prefix};
use crate::text;
use crate::version;
use crate::xml::{self, Location, PropsMap, XmlNode};

#[derive(Debug, Clone)]
pub struct ValidString {
    pub value: String,
    pub since_version: u32,
    pub deprecated_since: u32,
}

#[derive(Debug, Clone)]
pub struct StringField {
    pub default_value: String,
    pub encoding: String,
    pub length: u32,
    pub zero_term: bool,
    pub prefix: Option<Prefix>,
    pub valid_values: Vec<ValidString>,
}

impl StringField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<StringField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<StringField> {
        let mut field = prev.unwrap_or(StringField {
            default_value: String::new(),
            encoding: String::new(),
            length: 0,
            zero_term: false,
            prefix: None,
            valid_values: Vec::new(),
        });

        field::update_string_prop(node, props, "defaultValue", &mut field.default_value, true, ctx)?;
        field::update_string_prop(node, props, "encoding", &mut field.encoding, false, ctx)?;

        xml::validate_single_prop(node, props, "length", ctx.logger, false)?;
        if let Some(value) = props.get("length") {
            field.length = text::parse_unsigned(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "length", value, ctx.logger))?;
            // A fixed length overrides any inherited termination choice.
            field.zero_term = false;
            field.prefix = None;
        }

        field::update_bool_prop(node, props, "zeroTermSuffix", &mut field.zero_term, ctx)?;
        if let Some(prefix) = field::parse_prefix(node, props, "lengthPrefix", base, ctx)? {
            field.prefix = Some(prefix);
        }

        let selected = usize::from(field.length != 0)
            + usize::from(field.zero_term)
            + usize::from(field.prefix.is_some());
        if 1 < selected {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "Cannot combine \"length\", \"zeroTermSuffix\" and \"lengthPrefix\" \
                 properties of the \"string\" field.",
            ));
        }

        field.update_valid_values(node, base, ctx)?;
        Ok(field)
    }

    fn update_valid_values(&mut self, node: &XmlNode, base: &FieldBase, ctx: &ParseCtx<'_>) -> Result<()> {
        for value_node in node.children_named(&["validValue"]) {
            let props = value_node.props();
            let Some(value) = xml::parse_node_value(value_node, ctx.logger, true)? else {
                continue;
            };

            let mut since = base.since_version;
            let mut deprecated = base.deprecated_since;
            version::get_and_check_versions(
                value_node,
                &base.name,
                &props,
                &mut since,
                &mut deprecated,
                ctx.schema().version,
                ctx.logger,
            )?;

            self.valid_values.push(ValidString {
                value,
                since_version: since,
                deprecated_since: deprecated,
            });
        }
        Ok(())
    }

    pub(crate) fn verify_siblings(
        &self,
        loc: &Location,
        siblings: &[Field],
        ctx: &ParseCtx<'_>,
    ) -> Result<()> {
        verify_detached_prefix(&self.prefix, loc, siblings, "lengthPrefix", ctx)
    }

    pub fn min_length(&self) -> usize {
        if self.length != 0 {
            return self.length as usize;
        }
        if self.zero_term {
            return 1;
        }
        match &self.prefix {
            Some(Prefix::Field(prefix)) => prefix.min_length(),
            _ => 0,
        }
    }

    pub fn max_length(&self) -> usize {
        if self.length != 0 {
            return self.length as usize;
        }
        match &self.prefix {
            Some(Prefix::Field(prefix)) => {
                let max_value = match &prefix.non_ref().kind {
                    FieldKind::Int(int) => int.max_value.max(0) as usize,
                    _ => 0,
                };
                prefix.max_length().saturating_add(max_value)
            }
            _ => usize::MAX,
        }
    }
}

/// Detached prefixes bind by name to an `int` sibling of the containing
/// bundle/message.
pub(crate) fn verify_detached_prefix(
    prefix: &Option<Prefix>,
    loc: &Location,
    siblings: &[Field],
    prop: &str,
    ctx: &ParseCtx<'_>,
) -> Result<()> {
    let Some(Prefix::Detached(name)) = prefix else {
        return Ok(());
    };

    let sibling = field::find_sibling(loc, siblings, name, ctx)?;
    match sibling.non_ref().kind {
        FieldKind::Int(_) => Ok(()),
        _ => {
            let msg = format!(
                "{}: Detached \"{}\" field \"{}\" must be of \"int\" kind.",
                loc, prop, name
            );
            ctx.logger.error(&msg);
            Err(crate::error::Error::new(ErrorKind::SchemaRule, msg))
        }
    }
}
