//! `<int>` fields.

use std::collections::BTreeMap;

use crate::ctx::{ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::FieldBase;
use crate::schema::{parse_endian, Endian};
use crate::text;
use crate::version;
use crate::xml::{self, PropsMap, XmlNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Intvar,
    Uintvar,
}

impl IntType {
    pub fn parse(s: &str) -> Option<IntType> {
        Some(match s {
            "int8" => IntType::Int8,
            "uint8" => IntType::Uint8,
            "int16" => IntType::Int16,
            "uint16" => IntType::Uint16,
            "int32" => IntType::Int32,
            "uint32" => IntType::Uint32,
            "int64" => IntType::Int64,
            "uint64" => IntType::Uint64,
            "intvar" => IntType::Intvar,
            "uintvar" => IntType::Uintvar,
            _ => return None,
        })
    }

    pub fn token(self) -> &'static str {
        match self {
            IntType::Int8 => "int8",
            IntType::Uint8 => "uint8",
            IntType::Int16 => "int16",
            IntType::Uint16 => "uint16",
            IntType::Int32 => "int32",
            IntType::Uint32 => "uint32",
            IntType::Int64 => "int64",
            IntType::Uint64 => "uint64",
            IntType::Intvar => "intvar",
            IntType::Uintvar => "uintvar",
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            IntType::Uint8 | IntType::Uint16 | IntType::Uint32 | IntType::Uint64 | IntType::Uintvar
        )
    }

    pub fn is_var(self) -> bool {
        matches!(self, IntType::Intvar | IntType::Uintvar)
    }

    /// Values above `i64::MAX` are representable and travel as bit patterns.
    pub fn is_big_unsigned(self) -> bool {
        matches!(self, IntType::Uint64 | IntType::Uintvar)
    }

    /// Maximal serialized length in bytes.
    pub fn max_length(self) -> u32 {
        match self {
            IntType::Int8 | IntType::Uint8 => 1,
            IntType::Int16 | IntType::Uint16 => 2,
            IntType::Int32 | IntType::Uint32 => 4,
            IntType::Int64 | IntType::Uint64 => 8,
            // Base-128 varints: 64 bits in 7-bit groups.
            IntType::Intvar | IntType::Uintvar => 10,
        }
    }

    fn native_bits(self) -> u32 {
        match self {
            IntType::Int8 | IntType::Uint8 => 8,
            IntType::Int16 | IntType::Uint16 => 16,
            IntType::Int32 | IntType::Uint32 => 32,
            _ => 64,
        }
    }
}

/// Value range for `(signed, bits)` as `i64` bit patterns.
pub(crate) fn range_for_bits(unsigned: bool, bits: u32) -> (i64, i64) {
    debug_assert!(0 < bits && bits <= 64);
    if unsigned {
        let max = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        (0, max as i64)
    } else {
        let max = if bits == 64 {
            i64::MAX
        } else {
            (1i64 << (bits - 1)) - 1
        };
        (-max - 1, max)
    }
}

/// Compares two stored values honouring the big-unsigned interpretation.
pub(crate) fn value_le(big_unsigned: bool, left: i64, right: i64) -> bool {
    if big_unsigned {
        (left as u64) <= (right as u64)
    } else {
        left <= right
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRange {
    pub min: i64,
    pub max: i64,
    pub since_version: u32,
    pub deprecated_since: u32,
}

#[derive(Debug, Clone)]
pub struct SpecialValue {
    pub value: i64,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub description: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct IntField {
    pub type_: IntType,
    pub endian: Endian,
    pub length: u32,
    pub bit_length: u32,
    pub ser_offset: i64,
    pub min_value: i64,
    pub max_value: i64,
    pub default_value: i64,
    pub scaling: (i64, i64),
    pub valid_ranges: Vec<ValidRange>,
    pub specials: BTreeMap<String, SpecialValue>,
    pub units: String,
    pub display_decimals: u32,
    pub display_offset: i64,
    pub sign_ext: bool,
    pub non_unique_specials_allowed: bool,
    pub valid_check_version: bool,
}

impl IntField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<IntField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<IntField> {
        let type_ = update_type(node, props, prev.as_ref().map(|p| p.type_), ctx)?;

        let mut field = prev.unwrap_or(IntField {
            type_,
            endian: ctx.schema().endian,
            length: 0,
            bit_length: 0,
            ser_offset: 0,
            min_value: 0,
            max_value: 0,
            default_value: 0,
            scaling: (1, 1),
            valid_ranges: Vec::new(),
            specials: BTreeMap::new(),
            units: String::new(),
            display_decimals: 0,
            display_offset: 0,
            sign_ext: true,
            non_unique_specials_allowed: false,
            valid_check_version: false,
        });
        field.type_ = type_;

        field.update_endian(node, props, ctx)?;
        field.update_length(node, props, ctx)?;
        field.update_bit_length(node, props, ctx)?;
        field.update_scaling(node, props, ctx)?;
        field.update_ser_offset(node, props, ctx)?;
        field.update_min_max(node, ctx)?;
        field.update_specials(node, props, base, ctx)?;
        field.update_default(node, props, ctx)?;
        crate::field::update_bool_prop(node, props, "validCheckVersion", &mut field.valid_check_version, ctx)?;
        field.update_valid_ranges(node, base, ctx)?;

        crate::field::update_string_prop(node, props, "units", &mut field.units, false, ctx)?;
        if let Some(value) = props.get("displayDecimals") {
            field.display_decimals = text::parse_unsigned(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "displayDecimals", value, ctx.logger))?;
        }
        if let Some(value) = props.get("displayOffset") {
            field.display_offset = text::parse_intmax(value)
                .map(|(v, _)| v)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "displayOffset", value, ctx.logger))?;
        }
        crate::field::update_bool_prop(node, props, "signExt", &mut field.sign_ext, ctx)?;
        Ok(field)
    }

    fn update_endian(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "endian", ctx.logger, false)?;
        if let Some(value) = props.get("endian") {
            self.endian = parse_endian(Some(value), ctx.schema().endian)
                .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "endian", value, ctx.logger))?;
        }
        Ok(())
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
            if self.bit_length == 0 {
                self.bit_length = 0;
            }
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

    fn update_scaling(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "scaling", ctx.logger, false)?;
        let Some(value) = props.get("scaling") else {
            return Ok(());
        };

        let parsed = value.split_once('/').and_then(|(num, denom)| {
            let num = text::parse_intmax(num.trim())?.0;
            let denom = text::parse_intmax(denom.trim())?.0;
            (num != 0 && denom > 0).then_some((num, denom))
        });

        self.scaling = parsed
            .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "scaling", value, ctx.logger))?;
        Ok(())
    }

    fn update_ser_offset(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "serOffset", ctx.logger, false)?;
        if let Some(value) = props.get("serOffset") {
            self.ser_offset = text::parse_intmax(value)
                .map(|(v, _)| v)
                .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "serOffset", value, ctx.logger))?;
        }
        Ok(())
    }

    fn update_min_max(&mut self, node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<()> {
        let bits = if self.bit_length != 0 {
            self.bit_length
        } else if self.type_.is_var() {
            self.type_.native_bits()
        } else {
            (self.length * 8).min(self.type_.native_bits())
        };

        let (min, max) = range_for_bits(self.type_.is_unsigned(), bits);
        self.min_value = min;
        self.max_value = max;

        if self.ser_offset != 0 {
            // The serialized value (raw + offset) must still fit the type,
            // so the raw bounds shift in the opposite direction to
            // compensate. A low-side underflow of the big unsigned types
            // has no representable fix-up and is rejected.
            let (native_min, native_max) = range_for_bits(self.type_.is_unsigned(), self.type_.native_bits());
            let as_wide = |v: i64| -> i128 {
                if self.type_.is_big_unsigned() {
                    (v as u64) as i128
                } else {
                    v as i128
                }
            };
            let narrow = |v: i128| -> i64 {
                if self.type_.is_big_unsigned() {
                    (v as u64) as i64
                } else {
                    v as i64
                }
            };
            let offset = self.ser_offset as i128;

            let span = as_wide(native_max) - as_wide(native_min);
            if !self.type_.is_big_unsigned() && span <= offset.abs() {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "The serialisation offset value is too big or too small for selected type.",
                ));
            }

            if as_wide(self.min_value) + offset < as_wide(native_min) {
                if self.type_.is_big_unsigned() {
                    return Err(ctx.err(
                        ErrorKind::SchemaRule,
                        node,
                        format!(
                            "Value of \"serOffset\" property ({}) takes the minimal serialized \
                             value below the range of type \"{}\".",
                            self.ser_offset,
                            self.type_.token()
                        ),
                    ));
                }
                self.min_value = narrow(as_wide(native_min) - offset);
            }

            if as_wide(native_max) < as_wide(self.max_value) + offset {
                self.max_value = narrow(as_wide(native_max) - offset);
            }
        }
        Ok(())
    }

    fn update_specials(
        &mut self,
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        ctx: &ParseCtx<'_>,
    ) -> Result<()> {
        crate::field::update_bool_prop(
            node,
            props,
            "nonUniqueSpecialsAllowed",
            &mut self.non_unique_specials_allowed,
            ctx,
        )?;
        if self.non_unique_specials_allowed && !ctx.protocol.non_unique_specials_supported() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "Property \"nonUniqueSpecialsAllowed\" is not supported for DSL version of the schema.",
            ));
        }

        const SPECIAL_PROPS: &[&str] = &[
            "name",
            "val",
            "sinceVersion",
            "deprecated",
            "description",
            "displayName",
        ];

        for special in node.children_named(&["special"]) {
            let props = xml::parse_props(special, SPECIAL_PROPS, ctx.logger)?;
            for prop in ["name", "val"] {
                xml::validate_single_prop(special, &props, prop, ctx.logger, true)?;
            }

            let name = props.get("name").cloned().unwrap_or_default();
            if !text::is_valid_name(&name) {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    special,
                    format!("Invalid value for name property \"{}\".", name),
                ));
            }

            if self.specials.contains_key(&name) {
                let msg = format!(
                    "{}Special with name \"{}\" has already been assigned.",
                    special.log_prefix(),
                    name
                );
                ctx.logger.error(&msg);
                return Err(crate::error::Error::new(ErrorKind::DuplicateName, msg));
            }

            let val_str = props.get("val").unwrap();
            let (value, _) = self.value_of(val_str, ctx).ok_or_else(|| {
                xml::unexpected_prop_value(special, &name, "val", val_str, ctx.logger)
            })?;

            if !value_le(self.type_.is_big_unsigned(), self.min_value, value)
                || !value_le(self.type_.is_big_unsigned(), value, self.max_value)
            {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    special,
                    format!("Special value \"{}\" ({}) is outside the range of the field.", name, val_str),
                ));
            }

            if !self.non_unique_specials_allowed
                && self.specials.values().any(|s| s.value == value)
            {
                let msg = format!(
                    "{}Special value \"{}\" has already been assigned to another special.",
                    special.log_prefix(),
                    val_str
                );
                ctx.logger.error(&msg);
                return Err(crate::error::Error::new(ErrorKind::DuplicateName, msg));
            }

            let mut since = base.since_version;
            let mut deprecated = base.deprecated_since;
            version::get_and_check_versions(
                special,
                &name,
                &props,
                &mut since,
                &mut deprecated,
                ctx.schema().version,
                ctx.logger,
            )?;

            self.specials.insert(
                name,
                SpecialValue {
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

        let (parsed, _) = self
            .value_of(value, ctx)
            .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "defaultValue", value, ctx.logger))?;

        let big = self.type_.is_big_unsigned();
        if !value_le(big, self.min_value, parsed) || !value_le(big, parsed, self.max_value) {
            ctx.warn(
                node,
                format!(
                    "Default value ({}) is outside the range of available values within a field.",
                    value
                ),
            );
        }
        self.default_value = parsed;
        Ok(())
    }

    fn update_valid_ranges(&mut self, node: &XmlNode, base: &FieldBase, ctx: &ParseCtx<'_>) -> Result<()> {
        let big = self.type_.is_big_unsigned();

        // Attribute forms apply to the field's whole lifetime.
        let mut pending: Vec<ValidRange> = Vec::new();
        let attr_props = node.props();
        for prop in ["validRange", "validValue", "validMin", "validMax"] {
            if let Some(values) = attr_props.get_vec(prop) {
                for value in values {
                    pending.push(self.parse_valid_prop(
                        node,
                        prop,
                        value,
                        base.since_version,
                        base.deprecated_since,
                        ctx,
                    )?);
                }
            }
        }

        // Child forms may carry their own version bounds.
        for child in node.children_named(&["validRange", "validValue", "validMin", "validMax"]) {
            let child_props = child.props();
            let Some(value) = xml::parse_node_value(child, ctx.logger, true)? else {
                continue;
            };

            let mut since = base.since_version;
            let mut deprecated = base.deprecated_since;
            version::get_and_check_versions(
                child,
                &node.name,
                &child_props,
                &mut since,
                &mut deprecated,
                ctx.schema().version,
                ctx.logger,
            )?;
            pending.push(self.parse_valid_prop(child, &child.name, &value, since, deprecated, ctx)?);
        }

        if pending.is_empty() {
            // Keep ranges inherited through reuse.
            return Ok(());
        }

        self.valid_ranges.append(&mut pending);
        normalise_ranges(&mut self.valid_ranges, big);
        Ok(())
    }

    fn parse_valid_prop(
        &self,
        node: &XmlNode,
        prop: &str,
        value: &str,
        since: u32,
        deprecated: u32,
        ctx: &ParseCtx<'_>,
    ) -> Result<ValidRange> {
        let invalid = || xml::unexpected_prop_value(node, &node.name, prop, value, ctx.logger);

        let (min, max) = match prop {
            "validRange" => {
                let trimmed = value.trim();
                let inner = trimmed
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .ok_or_else(invalid)?;
                let (min_str, max_str) = inner.split_once(',').ok_or_else(invalid)?;
                let min = self.value_of(min_str.trim(), ctx).ok_or_else(invalid)?.0;
                let max = self.value_of(max_str.trim(), ctx).ok_or_else(invalid)?.0;
                (min, max)
            }
            "validValue" => {
                let v = self.value_of(value, ctx).ok_or_else(invalid)?.0;
                (v, v)
            }
            "validMin" => {
                let v = self.value_of(value, ctx).ok_or_else(invalid)?.0;
                (v, self.max_value)
            }
            "validMax" => {
                let v = self.value_of(value, ctx).ok_or_else(invalid)?.0;
                (self.min_value, v)
            }
            _ => unreachable!(),
        };

        let big = self.type_.is_big_unsigned();
        if !value_le(big, min, max) {
            return Err(invalid());
        }

        let (native_min, native_max) = range_for_bits(self.type_.is_unsigned(), self.type_.native_bits());
        if !value_le(big, native_min, min) || !value_le(big, max, native_max) {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!(
                    "Valid values of \"{}\" are outside the range of the type \"{}\".",
                    node.name,
                    self.type_.token()
                ),
            ));
        }

        if !value_le(big, self.min_value, min) || !value_le(big, max, self.max_value) {
            ctx.warn(
                node,
                format!(
                    "Valid values of \"{}\" are outside the range of serialized values.",
                    node.name
                ),
            );
        }

        Ok(ValidRange {
            min,
            max,
            since_version: since,
            deprecated_since: deprecated,
        })
    }

    /// Resolves a literal, a special name or an external field reference to
    /// a value of this field.
    pub fn value_of(&self, s: &str, ctx: &ParseCtx<'_>) -> Option<(i64, bool)> {
        let s = s.trim();
        if let Some(parsed) = text::parse_intmax(s) {
            return Some(parsed);
        }

        if let Some(special) = self.specials.get(s) {
            return Some((special.value, self.type_.is_big_unsigned()));
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
        self.specials
            .get(rest)
            .map(|s| (s.value, self.type_.is_big_unsigned()))
    }

    pub fn min_length(&self) -> usize {
        if self.type_.is_var() {
            1
        } else {
            self.length as usize
        }
    }
}

fn update_type(
    node: &XmlNode,
    props: &PropsMap,
    prev: Option<IntType>,
    ctx: &ParseCtx<'_>,
) -> Result<IntType> {
    xml::validate_single_prop(node, props, "type", ctx.logger, prev.is_none())?;
    let Some(value) = props.get("type") else {
        return Ok(prev.expect("mandatory when no reuse"));
    };

    let parsed = IntType::parse(value)
        .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, "type", value, ctx.logger))?;

    if let Some(prev) = prev {
        if prev != parsed {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "Type cannot be changed after reuse.",
            ));
        }
    }
    Ok(parsed)
}

/// Sorts ranges by version/value, merges adjacent ranges sharing version
/// bounds, and leaves the result sorted by value.
fn normalise_ranges(ranges: &mut Vec<ValidRange>, big_unsigned: bool) {
    let key = |v: i64| -> i128 {
        if big_unsigned {
            (v as u64) as i128
        } else {
            v as i128
        }
    };

    ranges.sort_by_key(|r| (r.since_version, r.deprecated_since, key(r.min), key(r.max)));

    let mut merged: Vec<ValidRange> = Vec::with_capacity(ranges.len());
    for range in ranges.drain(..) {
        if let Some(last) = merged.last_mut() {
            let same_versions = last.since_version == range.since_version
                && last.deprecated_since == range.deprecated_since;
            if same_versions && key(range.min) <= key(last.max).saturating_add(1) {
                if key(last.max) < key(range.max) {
                    last.max = range.max;
                }
                continue;
            }
        }
        merged.push(range);
    }

    merged.sort_by_key(|r| (key(r.min), key(r.max), r.since_version, r.deprecated_since));
    *ranges = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::NOT_YET_DEPRECATED;

    #[test]
    fn type_tokens_round_trip() {
        for token in [
            "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64", "uint64", "intvar",
            "uintvar",
        ] {
            assert_eq!(token, IntType::parse(token).unwrap().token());
        }
        assert!(IntType::parse("uint128").is_none());
    }

    #[test]
    fn bit_ranges() {
        assert_eq!((0, 255), range_for_bits(true, 8));
        assert_eq!((-128, 127), range_for_bits(false, 8));
        let (min, max) = range_for_bits(true, 64);
        assert_eq!(0, min);
        assert_eq!(u64::MAX as i64, max);
    }

    #[test]
    fn range_merge_joins_adjacent_spans() {
        let mut ranges = vec![
            ValidRange {
                min: 0,
                max: 5,
                since_version: 0,
                deprecated_since: NOT_YET_DEPRECATED,
            },
            ValidRange {
                min: 6,
                max: 10,
                since_version: 0,
                deprecated_since: NOT_YET_DEPRECATED,
            },
            ValidRange {
                min: 20,
                max: 30,
                since_version: 1,
                deprecated_since: NOT_YET_DEPRECATED,
            },
        ];
        normalise_ranges(&mut ranges, false);
        assert_eq!(2, ranges.len());
        assert_eq!((0, 10), (ranges[0].min, ranges[0].max));
        assert_eq!((20, 30), (ranges[1].min, ranges[1].max));
    }
}
