//! `<list>` fields.

use crate::ctx::{ParentInfo, ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::string::verify_detached_prefix;
use crate::field::{self, Field, FieldBase, FieldKind, Prefix, SUPPORTED_TYPES};
use crate::text;
use crate::xml::{self, Location, PropsMap, XmlNode};

#[derive(Debug, Clone)]
pub struct ListField {
    pub element: Box<Field>,
    pub count: u32,
    pub count_prefix: Option<Prefix>,
    pub length_prefix: Option<Prefix>,
    pub elem_length_prefix: Option<Prefix>,
    pub elem_fixed_length: bool,
    pub term_suffix: Option<Box<Field>>,
}

impl ListField {
    pub(crate) fn parse(
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<ListField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<ListField> {
        let member_ctx = ctx.child(ParentInfo {
            kind: ParentKind::OtherField,
            since: base.since_version,
            deprecated: base.deprecated_since,
        });

        let element = Self::update_element(node, props, &member_ctx, prev.as_ref(), ctx)?;

        let mut field = match prev {
            Some(prev) => ListField { element, ..prev },
            None => ListField {
                element,
                count: 0,
                count_prefix: None,
                length_prefix: None,
                elem_length_prefix: None,
                elem_fixed_length: false,
                term_suffix: None,
            },
        };

        xml::validate_single_prop(node, props, "count", ctx.logger, false)?;
        if let Some(value) = props.get("count") {
            field.count = text::parse_unsigned(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "count", value, ctx.logger))?;
            field.count_prefix = None;
            field.length_prefix = None;
        }

        if let Some(prefix) = field::parse_prefix(node, props, "countPrefix", base, ctx)? {
            field.count_prefix = Some(prefix);
            field.count = 0;
        }
        if let Some(prefix) = field::parse_prefix(node, props, "lengthPrefix", base, ctx)? {
            field.length_prefix = Some(prefix);
            field.count = 0;
        }

        if field.count_prefix.is_some() && field.length_prefix.is_some() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "Cannot use both \"countPrefix\" and \"lengthPrefix\" properties of the \
                 \"list\" field.",
            ));
        }

        if let Some(prefix) = field::parse_prefix(node, props, "elemLengthPrefix", base, ctx)? {
            field.elem_length_prefix = Some(prefix);
        }
        field::update_bool_prop(node, props, "elemFixedLength", &mut field.elem_fixed_length, ctx)?;

        if field.elem_fixed_length && field.elem_length_prefix.is_none() {
            ctx.warn(
                node,
                "Property \"elemFixedLength\" has no effect without \"elemLengthPrefix\".",
            );
        }

        if let Some(term_node) = field::single_field_in_wrapper(node, "termSuffix", ctx)? {
            let term = Field::parse(term_node, &member_ctx)?;
            field.term_suffix = Some(Box::new(term));
        }

        Ok(field)
    }

    fn update_element(
        node: &XmlNode,
        props: &PropsMap,
        member_ctx: &ParseCtx<'_>,
        prev: Option<&ListField>,
        ctx: &ParseCtx<'_>,
    ) -> Result<Box<Field>> {
        xml::validate_single_prop(node, props, "element", ctx.logger, false)?;

        let mut from_ref: Option<Field> = None;
        if let Some(value) = props.get("element") {
            let Some(target) = ctx.protocol.find_field(value) else {
                return Err(ctx.err(
                    ErrorKind::UnresolvedReference,
                    node,
                    format!("Cannot find field referenced by \"element\" property ({}).", value),
                ));
            };
            from_ref = Some(target.clone());
        }

        let standalone: Vec<_> = node.children_named(SUPPORTED_TYPES);
        let wrapped = field::single_field_in_wrapper(node, "element", ctx)?;
        let inline_node = match (standalone.len(), wrapped) {
            (0, wrapped) => wrapped,
            (1, None) => Some(standalone[0]),
            _ => {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "The \"list\" element is expected to define only single element field.",
                ));
            }
        };

        match (from_ref, inline_node) {
            (Some(_), Some(_)) => Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "There must be only one occurrence of \"element\" definition.",
            )),
            (Some(element), None) => Ok(Box::new(element)),
            (None, Some(element_node)) => Ok(Box::new(Field::parse(element_node, member_ctx)?)),
            (None, None) => match prev {
                Some(prev) => Ok(prev.element.clone()),
                None => Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "The \"list\" must specify its element field.",
                )),
            },
        }
    }

    pub(crate) fn verify_siblings(
        &self,
        loc: &Location,
        siblings: &[Field],
        ctx: &ParseCtx<'_>,
    ) -> Result<()> {
        verify_detached_prefix(&self.count_prefix, loc, siblings, "countPrefix", ctx)?;
        verify_detached_prefix(&self.length_prefix, loc, siblings, "lengthPrefix", ctx)?;
        verify_detached_prefix(&self.elem_length_prefix, loc, siblings, "elemLengthPrefix", ctx)
    }

    fn extra_min(&self) -> usize {
        match &self.elem_length_prefix {
            Some(Prefix::Field(prefix)) => prefix.min_length(),
            _ => 0,
        }
    }

    pub fn min_length(&self) -> usize {
        let mut extra = self.extra_min();
        if self.count != 0 {
            if !self.elem_fixed_length {
                extra = extra.saturating_mul(self.count as usize);
            }
            return (self.element.min_length())
                .saturating_mul(self.count as usize)
                .saturating_add(extra);
        }

        match (&self.count_prefix, &self.length_prefix) {
            (Some(Prefix::Field(prefix)), _) | (_, Some(Prefix::Field(prefix))) => prefix.min_length(),
            _ => 0,
        }
    }

    pub fn max_length(&self) -> usize {
        let mut extra = match &self.elem_length_prefix {
            Some(Prefix::Field(prefix)) => prefix.max_length(),
            _ => 0,
        };

        if self.count != 0 {
            if !self.elem_fixed_length {
                extra = extra.saturating_mul(self.count as usize);
            }
            return (self.element.max_length())
                .saturating_mul(self.count as usize)
                .saturating_add(extra);
        }

        match (&self.count_prefix, &self.length_prefix) {
            (Some(Prefix::Field(prefix)), _) => {
                let max_count = match &prefix.non_ref().kind {
                    FieldKind::Int(int) => int.max_value.max(0) as usize,
                    _ => 0,
                };
                prefix
                    .max_length()
                    .saturating_add(max_count.saturating_mul(self.element.max_length()))
            }
            (_, Some(Prefix::Field(prefix))) => {
                let max_bytes = match &prefix.non_ref().kind {
                    FieldKind::Int(int) => int.max_value.max(0) as usize,
                    _ => 0,
                };
                prefix.max_length().saturating_add(max_bytes)
            }
            _ => usize::MAX,
        }
    }
}
