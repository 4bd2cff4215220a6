//! `<set>` fields (bitmasks).

use std::collections::BTreeMap;

use multimap::MultiMap;

use crate::ctx::{ParentKind, ParseCtx};
use crate::error::{Error, ErrorKind, Result};
use crate::field::int::IntType;
use crate::field::FieldBase;
use crate::schema::{parse_endian, Endian};
use crate::text;
use crate::version;
use crate::xml::{self, PropsMap, XmlNode};

#[derive(Debug, Clone)]
pub struct SetBit {
    pub idx: u32,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub description: String,
    pub display_name: String,
    pub reserved: bool,
    pub reserved_value: bool,
    pub default_value: bool,
}

#[derive(Debug, Clone)]
pub struct SetField {
    /// Explicit underlying type; `None` means the type is derived from
    /// `length`.
    pub type_: Option<IntType>,
    pub endian: Endian,
    pub length: u32,
    pub bit_length: u32,
    pub bits: BTreeMap<String, SetBit>,
    pub rev_bits: MultiMap<u32, String>,
    pub default_bit_value: bool,
    pub reserved_bit_value: bool,
    pub non_unique_allowed: bool,
    pub valid_check_version: bool,
}

impl SetField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<SetField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<SetField> {
        let mut field = prev.unwrap_or(SetField {
            type_: None,
            endian: ctx.schema().endian,
            length: 0,
            bit_length: 0,
            bits: BTreeMap::new(),
            rev_bits: MultiMap::new(),
            default_bit_value: false,
            reserved_bit_value: false,
            non_unique_allowed: false,
            valid_check_version: false,
        });

        field.update_type(node, props, ctx)?;

        xml::validate_single_prop(node, props, "endian", ctx.logger, false)?;
        if let Some(value) = props.get("endian") {
            field.endian = parse_endian(Some(value), ctx.schema().endian)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "endian", value, ctx.logger))?;
        }

        field.update_length(node, props, ctx)?;
        field.update_bit_length(node, props, ctx)?;
        crate::field::update_bool_prop(node, props, "defaultValue", &mut field.default_bit_value, ctx)?;
        crate::field::update_bool_prop(node, props, "reservedValue", &mut field.reserved_bit_value, ctx)?;
        crate::field::update_bool_prop(node, props, "nonUniqueAllowed", &mut field.non_unique_allowed, ctx)?;
        crate::field::update_bool_prop(node, props, "validCheckVersion", &mut field.valid_check_version, ctx)?;
        field.update_bits(node, base, ctx)?;
        Ok(field)
    }

    fn update_type(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "type", ctx.logger, false)?;
        let Some(value) = props.get("type") else {
            return Ok(());
        };

        let parsed = IntType::parse(value)
            .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "type", value, ctx.logger))?;

        if !parsed.is_unsigned() || parsed.is_var() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!(
                    "The type of the \"{}\" field must be a fixed-width unsigned one.",
                    node.name
                ),
            ));
        }

        if self.type_.is_some_and(|p| p != parsed) {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "Type cannot be changed after reuse.",
            ));
        }
        self.type_ = Some(parsed);
        Ok(())
    }

    fn update_length(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "length", ctx.logger, false)?;
        if let Some(value) = props.get("length") {
            let requested = text::parse_unsigned(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "length", value, ctx.logger))?;
            let max_len = self.type_.map_or(8, IntType::max_length);
            if requested == 0 || max_len < requested {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    format!("Invalid value of \"length\" property ({}).", requested),
                ));
            }
            self.length = requested;
        } else if self.length == 0 {
            self.length = self.type_.map_or(1, IntType::max_length);
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

    fn update_bits(&mut self, node: &XmlNode, base: &FieldBase, ctx: &ParseCtx<'_>) -> Result<()> {
        const BIT_PROPS: &[&str] = &[
            "name",
            "idx",
            "sinceVersion",
            "deprecated",
            "description",
            "displayName",
            "reserved",
            "reservedValue",
            "defaultValue",
        ];

        let total_bits = if self.bit_length != 0 {
            self.bit_length
        } else {
            self.length * 8
        };

        for bit_node in node.children_named(&["bit"]) {
            let props = xml::parse_props(bit_node, BIT_PROPS, ctx.logger)?;
            for prop in ["name", "idx"] {
                xml::validate_single_prop(bit_node, &props, prop, ctx.logger, true)?;
            }

            let name = props.get("name").cloned().unwrap_or_default();
            if !text::is_valid_name(&name) {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    bit_node,
                    format!("Invalid value for name property \"{}\".", name),
                ));
            }

            if self.bits.contains_key(&name) {
                let msg = format!(
                    "{}Bit with name \"{}\" has already been defined.",
                    bit_node.log_prefix(),
                    name
                );
                ctx.logger.error(&msg);
                return Err(Error::new(ErrorKind::DuplicateName, msg));
            }

            let idx_str = props.get("idx").unwrap();
            let idx = text::parse_unsigned(idx_str)
                .ok_or_else(|| xml::unexpected_prop_value(bit_node, &name, "idx", idx_str, ctx.logger))?;
            if total_bits <= idx {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    bit_node,
                    format!(
                        "Index of the bit \"{}\" ({}) must be less than {}.",
                        name, idx, total_bits
                    ),
                ));
            }

            if !self.non_unique_allowed && self.rev_bits.contains_key(&idx) {
                let msg = format!(
                    "{}Bit index {} has already been assigned to another bit.",
                    bit_node.log_prefix(),
                    idx
                );
                ctx.logger.error(&msg);
                return Err(Error::new(ErrorKind::DuplicateName, msg));
            }

            let mut since = base.since_version;
            let mut deprecated = base.deprecated_since;
            version::get_and_check_versions(
                bit_node,
                &name,
                &props,
                &mut since,
                &mut deprecated,
                ctx.schema().version,
                ctx.logger,
            )?;

            let mut bit = SetBit {
                idx,
                since_version: since,
                deprecated_since: deprecated,
                description: props.get("description").cloned().unwrap_or_default(),
                display_name: props.get("displayName").cloned().unwrap_or_default(),
                reserved: false,
                reserved_value: self.reserved_bit_value,
                default_value: self.default_bit_value,
            };
            crate::field::update_bool_prop(bit_node, &props, "reserved", &mut bit.reserved, ctx)?;
            crate::field::update_bool_prop(bit_node, &props, "reservedValue", &mut bit.reserved_value, ctx)?;
            crate::field::update_bool_prop(bit_node, &props, "defaultValue", &mut bit.default_value, ctx)?;

            self.rev_bits.insert(idx, name.clone());
            self.bits.insert(name, bit);
        }
        Ok(())
    }

    pub fn str_to_bool(&self, rest: &str) -> Option<bool> {
        if rest.is_empty() {
            return Some(self.default_bit_value);
        }
        self.bits.get(rest).map(|b| b.default_value)
    }
}
