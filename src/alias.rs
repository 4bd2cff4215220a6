//! `<alias>` elements: named indirections to member fields of bundles and
//! interfaces.

use crate::ctx::ParseCtx;
use crate::error::Result;
use crate::text;
use crate::xml::{self, XmlNode};

const PROPS: &[&str] = &["name", "description", "field"];

#[derive(Debug, Clone)]
pub struct Alias {
    pub name: String,
    pub description: String,
    /// Dotted member path, `$` prefix already stripped.
    pub field_name: String,
}

impl Alias {
    pub(crate) fn parse(node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<Alias> {
        let props = xml::parse_props(node, PROPS, ctx.logger)?;
        xml::validate_single_prop(node, &props, "name", ctx.logger, true)?;
        xml::validate_single_prop(node, &props, "field", ctx.logger, true)?;
        xml::validate_single_prop(node, &props, "description", ctx.logger, false)?;

        let name = props.get("name").cloned().unwrap_or_default();
        if !text::is_valid_name(&name) {
            return Err(xml::unexpected_prop_value(node, "alias", "name", &name, ctx.logger));
        }

        let mut description = String::new();
        if let Some(raw) = props.get("description") {
            description = ctx
                .protocol
                .str_to_string_value(raw)
                .ok_or_else(|| xml::unexpected_prop_value(node, &name, "description", raw, ctx.logger))?;
        }

        let raw_field = props.get("field").cloned().unwrap_or_default();
        let field_name = raw_field.strip_prefix('$').unwrap_or_default().to_string();
        if field_name.is_empty() || !text::is_valid_ref_name(&field_name) {
            return Err(xml::unexpected_prop_value(node, &name, "field", &raw_field, ctx.logger));
        }

        Ok(Alias {
            name,
            description,
            field_name,
        })
    }
}

/// Parses the `<alias>` children of a bundle/interface/message node,
/// checking the feature gate and name clashes against existing fields and
/// aliases.
pub(crate) fn parse_aliases(
    node: &XmlNode,
    fields: &[crate::field::Field],
    existing: &mut Vec<Alias>,
    ctx: &ParseCtx<'_>,
) -> Result<()> {
    let alias_nodes = node.children_named(&["alias"]);
    if alias_nodes.is_empty() {
        return Ok(());
    }

    if !ctx.protocol.aliases_supported() {
        ctx.warn(
            node,
            "Field aliases are not supported for DSL version of the schema, ignoring them.",
        );
        return Ok(());
    }

    for alias_node in alias_nodes {
        let alias = Alias::parse(alias_node, ctx)?;

        let clashes = existing.iter().any(|a| a.name == alias.name)
            || fields.iter().any(|f| f.name() == alias.name);
        if clashes {
            let msg = format!(
                "{}Name \"{}\" of the alias clashes with an existing field or alias.",
                alias_node.log_prefix(),
                alias.name
            );
            ctx.logger.error(&msg);
            return Err(crate::error::Error::new(
                crate::error::ErrorKind::DuplicateName,
                msg,
            ));
        }

        let (first, rest) = match alias.field_name.split_once('.') {
            Some((first, rest)) => (first, rest),
            None => (alias.field_name.as_str(), ""),
        };

        let target = fields.iter().find(|f| f.name() == first);
        let resolved = match target {
            Some(field) if rest.is_empty() => Some(field),
            Some(field) => field.aliased_member(rest).map(|_| field),
            None => None,
        };

        if resolved.is_none() {
            let msg = format!(
                "{}The alias \"{}\" references non existing field \"{}\".",
                alias_node.log_prefix(),
                alias.name,
                alias.field_name
            );
            ctx.logger.error(&msg);
            return Err(crate::error::Error::new(
                crate::error::ErrorKind::UnresolvedReference,
                msg,
            ));
        }

        existing.push(alias);
    }
    Ok(())
}
