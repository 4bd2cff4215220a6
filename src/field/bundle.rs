//! `<bundle>` fields.

use crate::alias::{self, Alias};
use crate::ctx::{ParentInfo, ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::{self, Field, FieldBase, FieldKind, SemanticType, SUPPORTED_TYPES};
use crate::xml::{PropsMap, XmlNode};

#[derive(Debug, Clone)]
pub struct BundleField {
    pub members: Vec<Field>,
    pub aliases: Vec<Alias>,
}

impl BundleField {
    pub(crate) fn parse(
        node: &XmlNode,
        _props: &PropsMap,
        base: &FieldBase,
        prev: Option<BundleField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<BundleField> {
        let mut field = prev.unwrap_or(BundleField {
            members: Vec::new(),
            aliases: Vec::new(),
        });

        // Members inherited through reuse re-anchor at the owner's version.
        for member in &mut field.members {
            member.base.since_version = member.base.since_version.max(base.since_version);
        }

        let member_nodes = field::collect_member_nodes(node, "bundle", "members", SUPPORTED_TYPES, ctx)?;
        let member_ctx = ctx.child(ParentInfo {
            kind: ParentKind::Bundle,
            since: base.since_version,
            deprecated: base.deprecated_since,
        });

        for member_node in member_nodes {
            let member = Field::parse(member_node, &member_ctx)?;
            member.verify_siblings(&field.members, &member_ctx)?;
            field.members.push(member);
        }

        if field.members.is_empty() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "The \"bundle\" must contain member fields.",
            ));
        }

        field::validate_members_names(&field.members, ctx)?;
        field.verify_single_length_member(node, ctx)?;
        alias::parse_aliases(node, &field.members, &mut field.aliases, ctx)?;
        Ok(field)
    }

    fn verify_single_length_member(&self, node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<()> {
        let length_members = self
            .members
            .iter()
            .filter(|m| m.base.semantic_type == SemanticType::Length)
            .count();
        if 1 < length_members {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "No more than single field with \"length\" semantic type is allowed within \
                 the \"bundle\".",
            ));
        }

        if length_members == 1 {
            // The length member must have a measurable sibling.
            let measurable = self
                .members
                .iter()
                .filter(|m| m.base.semantic_type != SemanticType::Length)
                .any(is_length_measurable);
            if !measurable {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "The \"bundle\" with a \"length\" semantic type member must also contain \
                     a field whose length can be measured.",
                ));
            }
        }
        Ok(())
    }

    /// Member lookup used by condition and detached-prefix resolution.
    pub fn member(&self, name: &str) -> Option<&Field> {
        self.members.iter().find(|m| m.name() == name)
    }

    /// The member carrying `semanticType=length`, if any.
    pub fn length_member(&self) -> Option<&Field> {
        self.members
            .iter()
            .find(|m| m.base.semantic_type == SemanticType::Length)
    }
}

/// Shared helper: does the field (resolved through refs) represent a
/// length-measurable payload for a `length` semantic sibling?
pub(crate) fn is_length_measurable(field: &Field) -> bool {
    matches!(
        field.non_ref().kind,
        FieldKind::Str(_) | FieldKind::Data(_) | FieldKind::List(_) | FieldKind::Bundle(_)
    )
}
