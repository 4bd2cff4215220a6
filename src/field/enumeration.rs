//! `<enum>` fields.

use std::collections::BTreeMap;

use multimap::MultiMap;

use crate::ctx::{ParentKind, ParseCtx};
use crate::error::{Error, ErrorKind, Result};
use crate::field::int::{value_le, IntType};
use crate::field::FieldBase;
use crate::schema::{parse_endian, Endian};
use crate::text;
use crate::version;
use crate::xml::{self, PropsMap, XmlNode};

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub value: i64,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub description: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct EnumField {
    pub type_: IntType,
    pub endian: Endian,
    pub length: u32,
    pub bit_length: u32,
    pub values: BTreeMap<String, EnumValue>,
    /// Reverse lookup, value to name(s); multiple names share a value only
    /// when `nonUniqueAllowed` is set.
    pub rev_values: MultiMap<i64, String>,
    pub default_value: i64,
    pub non_unique_allowed: bool,
    pub valid_check_version: bool,
    pub hex_assign: bool,
}

impl EnumField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<EnumField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<EnumField> {
        let prev_type = prev.as_ref().map(|p| p.type_);
        xml::validate_single_prop(node, props, "type", ctx.logger, prev_type.is_none())?;
        let type_ = match props.get("type") {
            None => prev_type.expect("mandatory when no reuse"),
            Some(value) => {
                let parsed = IntType::parse(value)
                    .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "type", value, ctx.logger))?;
                if prev_type.is_some_and(|p| p != parsed) {
                    return Err(ctx.err(
                        ErrorKind::SchemaRule,
                        node,
                        "Type cannot be changed after reuse.",
                    ));
                }
                parsed
            }
        };

        let mut field = prev.unwrap_or(EnumField {
            type_,
            endian: ctx.schema().endian,
            length: 0,
            bit_length: 0,
            values: BTreeMap::new(),
            rev_values: MultiMap::new(),
            default_value: 0,
            non_unique_allowed: false,
            valid_check_version: false,
            hex_assign: false,
        });
        field.type_ = type_;

        xml::validate_single_prop(node, props, "endian", ctx.logger, false)?;
        if let Some(value) = props.get("endian") {
            field.endian = parse_endian(Some(value), ctx.schema().endian)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "endian", value, ctx.logger))?;
        }

        field.update_length(node, props, ctx)?;
        field.update_bit_length(node, props, ctx)?;
        crate::field::update_bool_prop(node, props, "nonUniqueAllowed", &mut field.non_unique_allowed, ctx)?;
        crate::field::update_bool_prop(node, props, "validCheckVersion", &mut field.valid_check_version, ctx)?;
        field.update_values(node, base, ctx)?;
        field.update_default(node, props, ctx)?;
        field.update_hex_assign(node, props, ctx)?;
        Ok(field)
    }

    fn update_length(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "length", ctx.logger, false)?;
        let max_len = self.type_.max_length();
        if let Some(value) = props.get("length") {
            let requested = text::parse_unsigned(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "length", value, ctx.logger))?;
            if requested == 0 || max_len < requested {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    format!(
                        "Serialization length ({}) of \"{}\" field is out of range for type \"{}\".",
                        requested,
                        node.name,
                        self.type_.token()
                    ),
                ));
            }
            self.length = requested;
        } else if self.length == 0 {
            self.length = max_len;
        }
        Ok(())
    }

    fn update_bit_length(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "bitLength", ctx.logger, false)?;
        let Some(value) = props.get("bitLength") else {
            return Ok(());
        };

        if ctx.parent.kind != ParentKind::Bitfield {
            ctx.warn(
                node,
                "The property \"bitLength\" is applicable only to members of \"bitfield\", \
                 ignoring provided value",
            );
            return Ok(());
        }

        let bits = text::parse_unsigned(value)
            .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "bitLength", value, ctx.logger))?;
        if bits == 0 || self.length * 8 < bits {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Invalid value of \"bitLength\" property ({}).", bits),
            ));
        }
        self.bit_length = bits;
        Ok(())
    }

    fn update_values(&mut self, node: &XmlNode, base: &FieldBase, ctx: &ParseCtx<'_>) -> Result<()> {
        const VALUE_PROPS: &[&str] = &[
            "name",
            "val",
            "sinceVersion",
            "deprecated",
            "description",
            "displayName",
        ];

        let unsigned = self.type_.is_unsigned();
        let (type_min, type_max) = type_range(self.type_);
        let bits = if self.bit_length != 0 {
            self.bit_length
        } else {
            self.length * 8
        };

        for value_node in node.children_named(&["validValue"]) {
            let props = xml::parse_props(value_node, VALUE_PROPS, ctx.logger)?;
            for prop in ["name", "val"] {
                xml::validate_single_prop(value_node, &props, prop, ctx.logger, true)?;
            }

            let name = props.get("name").cloned().unwrap_or_default();
            if !text::is_valid_name(&name) {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    value_node,
                    format!("Invalid value for name property \"{}\".", name),
                ));
            }

            if self.values.contains_key(&name) {
                let msg = format!(
                    "{}Value with name \"{}\" has already been defined.",
                    value_node.log_prefix(),
                    name
                );
                ctx.logger.error(&msg);
                return Err(Error::new(ErrorKind::DuplicateName, msg));
            }

            let val_str = props.get("val").unwrap();
            let value = text::parse_intmax(val_str)
                .map(|(v, _)| v)
                .or_else(|| ctx.protocol.str_to_enum_value(val_str))
                .ok_or_else(|| xml::unexpected_prop_value(value_node, &name, "val", val_str, ctx.logger))?;

            let big = self.type_.is_big_unsigned();
            if !value_le(big, type_min, value) || !value_le(big, value, type_max) {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    value_node,
                    format!(
                        "Value \"{}\" ({}) is outside the range of the underlying type \"{}\".",
                        name,
                        val_str,
                        self.type_.token()
                    ),
                ));
            }

            if bits < 64 {
                let (bit_min, bit_max) = bit_range(unsigned, bits);
                if !value_le(big, bit_min, value) || !value_le(big, value, bit_max) {
                    ctx.warn(
                        value_node,
                        format!(
                            "Value \"{}\" ({}) does not fit into {} bits used for serialization.",
                            name, val_str, bits
                        ),
                    );
                }
            }

            if !self.non_unique_allowed && self.rev_values.contains_key(&value) {
                let msg = format!(
                    "{}Value \"{}\" has already been assigned to another name.",
                    value_node.log_prefix(),
                    val_str
                );
                ctx.logger.error(&msg);
                return Err(Error::new(ErrorKind::DuplicateName, msg));
            }

            let mut since = base.since_version;
            let mut deprecated = base.deprecated_since;
            version::get_and_check_versions(
                value_node,
                &name,
                &props,
                &mut since,
                &mut deprecated,
                ctx.schema().version,
                ctx.logger,
            )?;

            self.rev_values.insert(value, name.clone());
            self.values.insert(
                name,
                EnumValue {
                    value,
                    since_version: since,
                    deprecated_since: deprecated,
                    description: props.get("description").cloned().unwrap_or_default(),
                    display_name: props.get("displayName").cloned().unwrap_or_default(),
                },
            );
        }
        Ok(())
    }

    fn update_default(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "defaultValue", ctx.logger, false)?;
        let Some(value) = props.get("defaultValue") else {
            return Ok(());
        };

        self.default_value = self
            .value_of(value, ctx)
            .map(|(v, _)| v)
            .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "defaultValue", value, ctx.logger))?;
        Ok(())
    }

    fn update_hex_assign(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        crate::field::update_bool_prop(node, props, "hexAssign", &mut self.hex_assign, ctx)?;
        if self.hex_assign && !self.type_.is_unsigned() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "Cannot use \"hexAssign\" property with signed types.",
            ));
        }
        Ok(())
    }

    /// Resolves a value name, literal, or external reference.
    pub fn value_of(&self, s: &str, ctx: &ParseCtx<'_>) -> Option<(i64, bool)> {
        let s = s.trim();
        if let Some(info) = self.values.get(s) {
            return Some((info.value, self.type_.is_big_unsigned()));
        }
        if let Some(parsed) = text::parse_intmax(s) {
            return Some(parsed);
        }
        if text::is_valid_ref_name(s) {
            return ctx.protocol.str_to_numeric(s);
        }
        None
    }

    pub fn str_to_numeric(&self, rest: &str) -> Option<(i64, bool)> {
        if rest.is_empty() {
            return Some((self.default_value, self.type_.is_big_unsigned()));
        }
        self.values
            .get(rest)
            .map(|v| (v.value, self.type_.is_big_unsigned()))
    }

    pub fn min_length(&self) -> usize {
        if self.type_.is_var() {
            1
        } else {
            self.length as usize
        }
    }
}

fn type_range(type_: IntType) -> (i64, i64) {
    let bits = match type_ {
        IntType::Int8 | IntType::Uint8 => 8,
        IntType::Int16 | IntType::Uint16 => 16,
        IntType::Int32 | IntType::Uint32 => 32,
        _ => 64,
    };
    bit_range(type_.is_unsigned(), bits)
}

fn bit_range(unsigned: bool, bits: u32) -> (i64, i64) {
    crate::field::int::range_for_bits(unsigned, bits)
}
