//! `<optional>` fields.

use crate::cond::OptCond;
use crate::ctx::{ParentInfo, ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::{self, Field, FieldBase, SUPPORTED_TYPES};
use crate::xml::{self, Location, PropsMap, XmlNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptMode {
    #[default]
    Tentative,
    Missing,
    Exists,
}

#[derive(Debug, Clone)]
pub struct OptionalField {
    pub field: Box<Field>,
    pub mode: OptMode,
    pub cond: Option<OptCond>,
    pub missing_on_read_fail: bool,
    pub missing_on_invalid: bool,
}

impl OptionalField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<OptionalField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<OptionalField> {
        let member_ctx = ctx.child(ParentInfo {
            kind: ParentKind::OtherField,
            since: base.since_version,
            deprecated: base.deprecated_since,
        });

        let inner = Self::update_field(node, props, &member_ctx, prev.as_ref(), ctx)?;

        let mut field = match prev {
            Some(prev) => OptionalField {
                field: inner,
                ..prev
            },
            None => OptionalField {
                field: inner,
                mode: OptMode::Tentative,
                cond: None,
                missing_on_read_fail: false,
                missing_on_invalid: false,
            },
        };

        field.update_mode(node, props, ctx)?;
        field::update_bool_prop(node, props, "missingOnReadFail", &mut field.missing_on_read_fail, ctx)?;
        field::update_bool_prop(node, props, "missingOnInvalid", &mut field.missing_on_invalid, ctx)?;
        field.update_single_condition(node, props, ctx)?;
        field.update_multi_condition(node, ctx)?;
        Ok(field)
    }

    fn update_field(
        node: &XmlNode,
        props: &PropsMap,
        member_ctx: &ParseCtx<'_>,
        prev: Option<&OptionalField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<Box<Field>> {
        xml::validate_single_prop(node, props, "field", ctx.logger, false)?;

        let mut from_ref: Option<Field> = None;
        if let Some(value) = props.get("field") {
            let Some(target) = ctx.protocol.find_field(value) else {
                return Err(ctx.err(
                    ErrorKind::UnresolvedReference,
                    node,
                    format!("Cannot find field referenced by \"field\" property ({}).", value),
                ));
            };
            from_ref = Some(target.clone());
        }

        let standalone: Vec<_> = node.children_named(SUPPORTED_TYPES);
        let wrapped = field::single_field_in_wrapper(node, "field", ctx)?;
        let inline_node = match (standalone.len(), wrapped) {
            (0, wrapped) => wrapped,
            (1, None) => Some(standalone[0]),
            _ => {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "The \"optional\" element is expected to wrap only single field.",
                ));
            }
        };

        match (from_ref, inline_node) {
            (Some(_), Some(_)) => Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "There must be only one occurrence of \"field\" definition.",
            )),
            (Some(inner), None) => Ok(Box::new(inner)),
            (None, Some(inner_node)) => Ok(Box::new(Field::parse(inner_node, member_ctx)?)),
            (None, None) => match prev {
                Some(prev) => Ok(prev.field.clone()),
                None => Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "The \"optional\" must specify the field it wraps.",
                )),
            },
        }
    }

    fn update_mode(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "defaultMode", ctx.logger, false)?;
        let Some(value) = props.get("defaultMode") else {
            return Ok(());
        };

        self.mode = match value.to_ascii_lowercase().as_str() {
            "tentative" => OptMode::Tentative,
            "missing" => OptMode::Missing,
            "exists" | "exist" => OptMode::Exists,
            _ => {
                return Err(xml::unexpected_prop_value(node, &node.name, "defaultMode", value, ctx.logger));
            }
        };
        Ok(())
    }

    fn update_single_condition(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "cond", ctx.logger, false)?;
        let Some(expr) = props.get("cond") else {
            return Ok(());
        };
        self.cond = Some(OptCond::parse_expr(expr, node, ctx)?);
        Ok(())
    }

    fn update_multi_condition(&mut self, node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<()> {
        let bundles = node.children_named(&["and", "or"]);
        if bundles.is_empty() {
            return Ok(());
        }

        if bundles.len() > 1 || self.cond.is_some() {
            return Err(ctx.err(
                ErrorKind::ConditionError,
                node,
                "The \"optional\" field may define only single \"cond\" expression or \
                 condition bundling element.",
            ));
        }

        self.cond = Some(OptCond::parse_list(bundles[0], ctx)?);
        Ok(())
    }

    pub(crate) fn verify_siblings(
        &self,
        loc: &Location,
        siblings: &[Field],
        ctx: &ParseCtx<'_>,
    ) -> Result<()> {
        if let Some(cond) = &self.cond {
            cond.verify(siblings, loc, ctx)?;
        }
        Ok(())
    }
}
