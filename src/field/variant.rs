//! `<variant>` fields.

use crate::ctx::{ParentInfo, ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::{self, Field, FieldBase, SUPPORTED_TYPES};
use crate::text;
use crate::xml::{self, PropsMap, XmlNode};

#[derive(Debug, Clone)]
pub struct VariantField {
    pub members: Vec<Field>,
    pub default_member: Option<usize>,
    pub display_idx_read_only_hidden: bool,
}

impl VariantField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<VariantField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<VariantField> {
        let mut field = prev.unwrap_or(VariantField {
            members: Vec::new(),
            default_member: None,
            display_idx_read_only_hidden: false,
        });

        for member in &mut field.members {
            member.base.since_version = member.base.since_version.max(base.since_version);
        }

        let member_nodes = field::collect_member_nodes(node, "variant", "members", SUPPORTED_TYPES, ctx)?;
        if !member_nodes.is_empty() {
            if !field.members.is_empty() {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "The \"variant\" cannot add member fields after reuse.",
                ));
            }

            let member_ctx = ctx.child(ParentInfo {
                kind: ParentKind::Variant,
                since: base.since_version,
                deprecated: base.deprecated_since,
            });
            for member_node in member_nodes {
                field.members.push(Field::parse(member_node, &member_ctx)?);
            }
        }

        if field.members.is_empty() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "The \"variant\" must contain member fields.",
            ));
        }

        field::validate_members_names(&field.members, ctx)?;
        field.update_default_member(node, props, ctx)?;
        field::update_bool_prop(
            node,
            props,
            "displayIdxReadOnlyHidden",
            &mut field.display_idx_read_only_hidden,
            ctx,
        )?;
        Ok(field)
    }

    fn update_default_member(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "defaultMember", ctx.logger, false)?;
        let Some(value) = props.get("defaultMember") else {
            return Ok(());
        };

        if let Some((parsed, _)) = text::parse_intmax(value) {
            if parsed < 0 {
                self.default_member = None;
                return Ok(());
            }
            let idx = parsed as usize;
            if self.members.len() <= idx {
                return Err(xml::unexpected_prop_value(node, &node.name, "defaultMember", value, ctx.logger));
            }
            self.default_member = Some(idx);
            return Ok(());
        }

        let idx = self
            .members
            .iter()
            .position(|m| m.name() == value.as_str())
            .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "defaultMember", value, ctx.logger))?;
        self.default_member = Some(idx);
        Ok(())
    }
}
