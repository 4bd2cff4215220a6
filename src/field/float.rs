//! `<float>` fields.

use std::collections::BTreeMap;

use crate::ctx::ParseCtx;
use crate::error::Result;
use crate::field::FieldBase;
use crate::schema::{parse_endian, Endian};
use crate::text;
use crate::version;
use crate::xml::{self, PropsMap, XmlNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatType {
    Float,
    Double,
}

#[derive(Debug, Clone)]
pub struct FloatSpecial {
    pub value: f64,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub description: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct FloatValidRange {
    pub min: f64,
    pub max: f64,
    pub since_version: u32,
    pub deprecated_since: u32,
}

#[derive(Debug, Clone)]
pub struct FloatField {
    pub type_: FloatType,
    pub endian: Endian,
    pub length: u32,
    pub default_value: f64,
    pub valid_ranges: Vec<FloatValidRange>,
    pub specials: BTreeMap<String, FloatSpecial>,
    pub units: String,
    pub display_decimals: u32,
    pub valid_check_version: bool,
}

impl FloatField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<FloatField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<FloatField> {
        let type_ = Self::update_type(node, props, prev.as_ref().map(|p| p.type_), ctx)?;

        let mut field = prev.unwrap_or(FloatField {
            type_,
            endian: ctx.schema().endian,
            length: 0,
            default_value: 0.0,
            valid_ranges: Vec::new(),
            specials: BTreeMap::new(),
            units: String::new(),
            display_decimals: 0,
            valid_check_version: false,
        });
        field.type_ = type_;
        field.length = match type_ {
            FloatType::Float => 4,
            FloatType::Double => 8,
        };

        xml::validate_single_prop(node, props, "endian", ctx.logger, false)?;
        if let Some(value) = props.get("endian") {
            field.endian = parse_endian(Some(value), ctx.schema().endian)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "endian", value, ctx.logger))?;
        }

        field.update_specials(node, base, ctx)?;

        xml::validate_single_prop(node, props, "defaultValue", ctx.logger, false)?;
        if let Some(value) = props.get("defaultValue") {
            field.default_value = field
                .value_of(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "defaultValue", value, ctx.logger))?;
        }

        crate::field::update_bool_prop(node, props, "validCheckVersion", &mut field.valid_check_version, ctx)?;
        field.update_valid_ranges(node, base, ctx)?;
        crate::field::update_string_prop(node, props, "units", &mut field.units, false, ctx)?;
        if let Some(value) = props.get("displayDecimals") {
            field.display_decimals = text::parse_unsigned(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "displayDecimals", value, ctx.logger))?;
        }

        Ok(field)
    }

    fn update_type(
        node: &XmlNode,
        props: &PropsMap,
        prev: Option<FloatType>,
        ctx: &ParseCtx<'_>,
    ) -> Result<FloatType> {
        xml::validate_single_prop(node, props, "type", ctx.logger, prev.is_none())?;
        let Some(value) = props.get("type") else {
            return Ok(prev.expect("mandatory when no reuse"));
        };

        let parsed = match value.as_str() {
            "float" => FloatType::Float,
            "double" => FloatType::Double,
            _ => {
                return Err(xml::unexpected_prop_value(node, &node.name, "type", value, ctx.logger));
            }
        };

        if let Some(prev) = prev {
            if prev != parsed {
                return Err(ctx.err(
                    crate::ErrorKind::SchemaRule,
                    node,
                    "Type cannot be changed after reuse.",
                ));
            }
        }
        Ok(parsed)
    }

    fn update_specials(&mut self, node: &XmlNode, base: &FieldBase, ctx: &ParseCtx<'_>) -> Result<()> {
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
                    crate::ErrorKind::SchemaRule,
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
                return Err(crate::error::Error::new(crate::ErrorKind::DuplicateName, msg));
            }

            let val_str = props.get("val").unwrap();
            let value = text::parse_float(val_str).ok_or_else(|| {
                xml::unexpected_prop_value(special, &name, "val", val_str, ctx.logger)
            })?;

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
                FloatSpecial {
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

    fn update_valid_ranges(&mut self, node: &XmlNode, base: &FieldBase, ctx: &ParseCtx<'_>) -> Result<()> {
        let attr_props = node.props();
        for prop in ["validRange", "validValue", "validMin", "validMax"] {
            if let Some(values) = attr_props.get_vec(prop) {
                for value in values {
                    let range = self.parse_valid_prop(
                        node,
                        prop,
                        value,
                        base.since_version,
                        base.deprecated_since,
                        ctx,
                    )?;
                    self.valid_ranges.push(range);
                }
            }
        }

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
            let range = self.parse_valid_prop(child, &child.name, &value, since, deprecated, ctx)?;
            self.valid_ranges.push(range);
        }

        self.valid_ranges.sort_by(|a, b| {
            a.min
                .partial_cmp(&b.min)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.max.partial_cmp(&b.max).unwrap_or(std::cmp::Ordering::Equal))
        });
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
    ) -> Result<FloatValidRange> {
        let invalid = || xml::unexpected_prop_value(node, &node.name, prop, value, ctx.logger);

        let (min, max) = match prop {
            "validRange" => {
                let inner = value
                    .trim()
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .ok_or_else(invalid)?;
                let (min_str, max_str) = inner.split_once(',').ok_or_else(invalid)?;
                let min = self.value_of(min_str.trim()).ok_or_else(invalid)?;
                let max = self.value_of(max_str.trim()).ok_or_else(invalid)?;
                (min, max)
            }
            "validValue" => {
                let v = self.value_of(value).ok_or_else(invalid)?;
                (v, v)
            }
            "validMin" => (self.value_of(value).ok_or_else(invalid)?, f64::MAX),
            "validMax" => (f64::MIN, self.value_of(value).ok_or_else(invalid)?),
            _ => unreachable!(),
        };

        if !min.is_nan() && !max.is_nan() && max < min {
            return Err(invalid());
        }

        Ok(FloatValidRange {
            min,
            max,
            since_version: since,
            deprecated_since: deprecated,
        })
    }

    /// Resolves a literal or special name to a value of this field.
    pub fn value_of(&self, s: &str) -> Option<f64> {
        let s = s.trim();
        if let Some(parsed) = text::parse_float(s) {
            return Some(parsed);
        }
        self.specials.get(s).map(|sp| sp.value)
    }

    pub fn str_to_fp(&self, rest: &str) -> Option<f64> {
        if rest.is_empty() {
            return Some(self.default_value);
        }
        self.specials.get(rest).map(|s| s.value)
    }
}
