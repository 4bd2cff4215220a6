//! `<bitfield>` fields.

use crate::ctx::{ParentInfo, ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::{self, Field, FieldBase};
use crate::schema::{parse_endian, Endian};
use crate::xml::{self, PropsMap, XmlNode};

/// Field kinds that may be packed into a bitfield.
pub const MEMBER_TYPES: &[&str] = &["int", "enum", "set", "ref"];

#[derive(Debug, Clone)]
pub struct BitfieldField {
    pub endian: Endian,
    pub members: Vec<Field>,
}

impl BitfieldField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<BitfieldField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<BitfieldField> {
        let mut field = prev.unwrap_or(BitfieldField {
            endian: ctx.schema().endian,
            members: Vec::new(),
        });

        xml::validate_single_prop(node, props, "endian", ctx.logger, false)?;
        if let Some(value) = props.get("endian") {
            field.endian = parse_endian(Some(value), ctx.schema().endian)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "endian", value, ctx.logger))?;
        }

        // Members inherited through reuse keep tracking the owner's version.
        for member in &mut field.members {
            member.base.since_version = member.base.since_version.max(base.since_version);
        }

        let member_nodes = field::collect_member_nodes(node, "bitfield", "members", MEMBER_TYPES, ctx)?;
        if member_nodes.is_empty() {
            if field.members.is_empty() {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "The \"bitfield\" must contain member fields.",
                ));
            }
            return Ok(field);
        }

        if !field.members.is_empty() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "The \"bitfield\" cannot add member fields after reuse.",
            ));
        }

        let member_ctx = ctx.child(ParentInfo {
            kind: ParentKind::Bitfield,
            since: base.since_version,
            deprecated: base.deprecated_since,
        });

        for member_node in member_nodes {
            let member = Field::parse(member_node, &member_ctx)?;
            if member.base.since_version != base.since_version
                || member.base.deprecated_since != base.deprecated_since
            {
                return Err(ctx.err(
                    ErrorKind::VersionError,
                    member_node,
                    "Bitfield members are not allowed to update \"sinceVersion\" and \
                     \"deprecated\" properties.",
                ));
            }
            field.members.push(member);
        }

        field::validate_members_names(&field.members, ctx)?;

        let total_bits: u32 = field.members.iter().map(Field::bit_length).sum();
        if total_bits % 8 != 0 {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!(
                    "The summary of member's bit lengths ({}) is expected to be divisible by 8.",
                    total_bits
                ),
            ));
        }

        if 64 < total_bits {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!(
                    "The summary of member's bit lengths ({}) cannot be greater than 64.",
                    total_bits
                ),
            ));
        }

        Ok(field)
    }

    pub fn min_length(&self) -> usize {
        let bits: u32 = self.members.iter().map(Field::bit_length).sum();
        (bits / 8) as usize
    }

    pub fn total_bit_length(&self) -> u32 {
        self.members.iter().map(Field::bit_length).sum()
    }
}
