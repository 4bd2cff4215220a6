//! `<ref>` fields.

use crate::ctx::{ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::{Field, FieldBase, SemanticType};
use crate::text;
use crate::xml::{self, PropsMap, XmlNode};

#[derive(Debug, Clone)]
pub struct RefField {
    /// The reference string as written in the schema.
    pub target: String,
    /// Deep copy of the resolved referee; the IR is frozen after build, so
    /// the copy stays in sync with the origin.
    pub field: Box<Field>,
    /// Bit-length override when the ref is used inside a bitfield.
    pub bit_length: u32,
}

impl RefField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<RefField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<RefField> {
        xml::validate_single_prop(node, props, "field", ctx.logger, prev.is_none())?;

        let (target, field) = match props.get("field") {
            Some(value) => {
                let Some(referee) = ctx.protocol.find_field(value) else {
                    return Err(ctx.err(
                        ErrorKind::UnresolvedReference,
                        node,
                        format!("Cannot find field referenced by \"field\" property ({}).", value),
                    ));
                };
                (value.clone(), Box::new(referee.clone()))
            }
            None => {
                let prev = prev.as_ref().expect("mandatory when no reuse");
                (prev.target.clone(), prev.field.clone())
            }
        };

        let mut ref_field = RefField {
            target,
            field,
            bit_length: prev.map_or(0, |p| p.bit_length),
        };

        xml::validate_single_prop(node, props, "bitLength", ctx.logger, false)?;
        if let Some(value) = props.get("bitLength") {
            if ctx.parent.kind != ParentKind::Bitfield {
                ctx.warn(
                    node,
                    "The property \"bitLength\" is applicable only to members of \"bitfield\", \
                     ignoring provided value",
                );
            } else {
                let bits = text::parse_unsigned(value)
                    .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "bitLength", value, ctx.logger))?;
                let max_bits = (ref_field.field.max_length() as u32) * 8;
                if bits == 0 || max_bits < bits {
                    return Err(ctx.err(
                        ErrorKind::SchemaRule,
                        node,
                        format!("Invalid value of \"bitLength\" property ({}).", bits),
                    ));
                }
                ref_field.bit_length = bits;
            }
        }

        if base.semantic_type == SemanticType::None
            && ref_field.field.base.semantic_type != SemanticType::None
            && !ctx.protocol.ref_inheritance_supported()
        {
            ctx.warn(
                node,
                "Inheriting the semantic type of the referenced field requires DSL version 2.",
            );
        }

        Ok(ref_field)
    }
}
