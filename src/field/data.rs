//! `<data>` fields (raw byte sequences).

use crate::ctx::ParseCtx;
use crate::error::{ErrorKind, Result};
use crate::field::string::verify_detached_prefix;
use crate::field::{self, Field, FieldBase, FieldKind, Prefix};
use crate::text;
use crate::xml::{self, Location, PropsMap, XmlNode};

#[derive(Debug, Clone)]
pub struct DataField {
    pub default_value: Vec<u8>,
    pub length: u32,
    pub prefix: Option<Prefix>,
}

impl DataField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<DataField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<DataField> {
        let mut field = prev.unwrap_or(DataField {
            default_value: Vec::new(),
            length: 0,
            prefix: None,
        });

        xml::validate_single_prop(node, props, "defaultValue", ctx.logger, false)?;
        if let Some(value) = props.get("defaultValue") {
            field.default_value = text::parse_hex_bytes(value)
                .or_else(|| {
                    text::is_valid_ref_name(value)
                        .then(|| ctx.protocol.str_to_data(value))
                        .flatten()
                })
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "defaultValue", value, ctx.logger))?;
        }

        xml::validate_single_prop(node, props, "length", ctx.logger, false)?;
        if let Some(value) = props.get("length") {
            field.length = text::parse_unsigned(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "length", value, ctx.logger))?;
            field.prefix = None;
        }

        if let Some(prefix) = field::parse_prefix(node, props, "lengthPrefix", base, ctx)? {
            field.prefix = Some(prefix);
        }

        if field.length != 0 && field.prefix.is_some() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "Cannot combine \"length\" and \"lengthPrefix\" properties of the \"data\" field.",
            ));
        }

        if field.length != 0 && !field.default_value.is_empty() {
            if field.length as usize != field.default_value.len() {
                ctx.warn(
                    node,
                    format!(
                        "Default value of the \"data\" field has {} bytes while the field is \
                         fixed to {}.",
                        field.default_value.len(),
                        field.length
                    ),
                );
            }
        }

        Ok(field)
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
