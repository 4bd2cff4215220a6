//! Framing layers.
//!
//! Seven variants wrap a message on the wire; all but `Payload` carry a
//! field describing their serialized form.

use crate::ctx::{ParentInfo, ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::field::{self, Field, SUPPORTED_TYPES};
use crate::text;
use crate::xml::{self, Location, PropsMap, XmlNode};

pub const SUPPORTED_LAYERS: &[&str] =
    &["payload", "id", "size", "sync", "checksum", "value", "custom"];

const COMMON_PROPS: &[&str] = &["name", "description"];
const COMMON_POSSIBLE_PROPS: &[&str] = &["field"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlg {
    Custom,
    Sum,
    CrcCcitt,
    Crc16,
    Crc32,
}

#[derive(Debug, Clone)]
pub struct ChecksumLayer {
    pub alg: ChecksumAlg,
    pub alg_name: String,
    pub from: String,
    pub until: String,
    pub verify_before_read: bool,
}

#[derive(Debug, Clone)]
pub struct ValueLayer {
    /// Referenced interface names; empty list means "every interface".
    pub interfaces: Vec<String>,
    pub interface_field_name: String,
    pub pseudo: bool,
}

#[derive(Debug, Clone)]
pub struct CustomLayer {
    pub id_replacement: bool,
}

#[derive(Debug, Clone)]
pub enum LayerKind {
    Payload,
    Id,
    Size,
    Sync,
    Checksum(ChecksumLayer),
    Value(ValueLayer),
    Custom(CustomLayer),
}

impl LayerKind {
    pub fn tag(&self) -> &'static str {
        match self {
            LayerKind::Payload => "payload",
            LayerKind::Id => "id",
            LayerKind::Size => "size",
            LayerKind::Sync => "sync",
            LayerKind::Checksum(_) => "checksum",
            LayerKind::Value(_) => "value",
            LayerKind::Custom(_) => "custom",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub description: String,
    /// Inline definition or deep copy of the referenced field; `None` only
    /// for the payload layer.
    pub field: Option<Box<Field>>,
    /// Reference string when the field came from `field=`.
    pub field_ref: Option<String>,
    pub kind: LayerKind,
    pub extra_attrs: Vec<(String, String)>,
    loc: Location,
}

fn extra_props(tag: &str) -> &'static [&'static str] {
    match tag {
        "checksum" => &["alg", "algName", "from", "until", "verifyBeforeRead"],
        "value" => &["interfaces", "interfaceFieldName", "pseudo"],
        "custom" => &["idReplacement"],
        _ => &[],
    }
}

impl Layer {
    pub(crate) fn parse(node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<Layer> {
        let tag = node.name.as_str();
        if !SUPPORTED_LAYERS.contains(&tag) {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Unknown layer type \"{}\".", tag),
            ));
        }

        let mut props = node.props();
        xml::parse_children_as_props(node, COMMON_PROPS, ctx.logger, &mut props, true)?;
        let extra = extra_props(tag);
        if !extra.is_empty() {
            xml::parse_children_as_props(node, extra, ctx.logger, &mut props, true)?;
        }
        xml::parse_children_as_props(node, COMMON_POSSIBLE_PROPS, ctx.logger, &mut props, false)?;

        let mut layer = Layer {
            name: String::new(),
            description: String::new(),
            field: None,
            field_ref: None,
            kind: LayerKind::Payload,
            extra_attrs: Vec::new(),
            loc: node.location().clone(),
        };

        xml::validate_single_prop(node, &props, "name", ctx.logger, true)?;
        layer.name = props.get("name").cloned().unwrap_or_default();
        if !text::is_valid_name(&layer.name) {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Invalid value for name property \"{}\".", layer.name),
            ));
        }

        field::update_string_prop(node, &props, "description", &mut layer.description, true, ctx)?;
        layer.update_field(node, &props, ctx)?;

        layer.kind = match tag {
            "payload" => LayerKind::Payload,
            "id" => LayerKind::Id,
            "size" => LayerKind::Size,
            "sync" => LayerKind::Sync,
            "checksum" => LayerKind::Checksum(ChecksumLayer::parse(node, &props, &layer.name, ctx)?),
            "value" => LayerKind::Value(ValueLayer::parse(node, &props, &layer.name, ctx)?),
            "custom" => {
                let mut id_replacement = false;
                field::update_bool_prop(node, &props, "idReplacement", &mut id_replacement, ctx)?;
                LayerKind::Custom(CustomLayer { id_replacement })
            }
            _ => unreachable!("layer tag checked above"),
        };

        let must_have_field = !matches!(layer.kind, LayerKind::Payload);
        if layer.field.is_some() != must_have_field {
            let msg = if must_have_field {
                "This layer must specify field."
            } else {
                "This layer mustn't specify field."
            };
            return Err(ctx.err(ErrorKind::SchemaRule, node, msg));
        }

        let mut known: Vec<&str> = COMMON_PROPS.to_vec();
        known.extend(COMMON_POSSIBLE_PROPS);
        known.extend(extra);
        let prefixes = ctx.protocol.extra_element_prefixes();
        layer.extra_attrs = xml::extra_attrs(node, &known, prefixes, ctx.logger);

        Ok(layer)
    }

    pub fn location(&self) -> &Location {
        &self.loc
    }

    fn update_field(&mut self, node: &XmlNode, props: &PropsMap, ctx: &ParseCtx<'_>) -> Result<()> {
        xml::validate_single_prop(node, props, "field", ctx.logger, false)?;

        if let Some(value) = props.get("field") {
            let Some(target) = ctx.protocol.find_field(value) else {
                return Err(ctx.err(
                    ErrorKind::UnresolvedReference,
                    node,
                    format!(
                        "Cannot find field referenced by \"field\" property ({}).",
                        value
                    ),
                ));
            };
            self.field = Some(Box::new(target.clone()));
            self.field_ref = Some(value.clone());
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
                    "The frame layer element is expected to define only single field.",
                ));
            }
        };

        if let Some(field_node) = inline_node {
            if self.field.is_some() {
                return Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "There must be only one occurrence of \"field\" definition.",
                ));
            }

            let member_ctx = ctx.child(ParentInfo {
                kind: ParentKind::Layer,
                since: 0,
                deprecated: crate::version::NOT_YET_DEPRECATED,
            });
            self.field = Some(Box::new(Field::parse(field_node, &member_ctx)?));
        }
        Ok(())
    }

    /// Re-verification of the layer against the final layer list of the
    /// frame.
    pub(crate) fn verify(&self, layers: &[Layer], ctx: &ParseCtx<'_>) -> Result<()> {
        match &self.kind {
            LayerKind::Payload => Ok(()),
            LayerKind::Id | LayerKind::Size => {
                self.verify_single(layers, ctx)?;
                self.verify_before_payload(layers, ctx)
            }
            LayerKind::Sync | LayerKind::Custom(_) => self.verify_before_payload(layers, ctx),
            LayerKind::Value(_) => self.verify_before_payload(layers, ctx),
            LayerKind::Checksum(checksum) => {
                self.verify_before_payload(layers, ctx)?;
                checksum.verify(self, layers, ctx)
            }
        }
    }

    fn index_of(layers: &[Layer], name: &str) -> Option<usize> {
        layers.iter().position(|l| l.name == name)
    }

    fn verify_single(&self, layers: &[Layer], ctx: &ParseCtx<'_>) -> Result<()> {
        let same_kind = layers
            .iter()
            .filter(|l| l.kind.tag() == self.kind.tag())
            .count();
        if 1 < same_kind {
            let msg = format!(
                "{}: Only single \"{}\" layer can exist in the frame.",
                self.loc,
                self.kind.tag()
            );
            ctx.logger.error(&msg);
            return Err(crate::error::Error::new(ErrorKind::SchemaRule, msg));
        }
        Ok(())
    }

    fn verify_before_payload(&self, layers: &[Layer], ctx: &ParseCtx<'_>) -> Result<()> {
        let this_idx = layers
            .iter()
            .position(|l| std::ptr::eq(l, self))
            .unwrap_or(usize::MAX);
        let payload_idx = layers
            .iter()
            .position(|l| matches!(l.kind, LayerKind::Payload))
            .unwrap_or(usize::MAX);

        if payload_idx <= this_idx {
            let msg = format!(
                "{}: This layer is expected to be before the \"payload\" one.",
                self.loc
            );
            ctx.logger.error(&msg);
            return Err(crate::error::Error::new(ErrorKind::SchemaRule, msg));
        }
        Ok(())
    }
}

impl ChecksumLayer {
    fn parse(node: &XmlNode, props: &PropsMap, name: &str, ctx: &ParseCtx<'_>) -> Result<ChecksumLayer> {
        xml::validate_single_prop(node, props, "alg", ctx.logger, true)?;
        let alg_str = props.get("alg").unwrap();
        let alg = match alg_str.to_ascii_lowercase().replace('_', "-").as_str() {
            "custom" => ChecksumAlg::Custom,
            "sum" => ChecksumAlg::Sum,
            "crc-ccitt" => ChecksumAlg::CrcCcitt,
            "crc-16" => ChecksumAlg::Crc16,
            "crc-32" => ChecksumAlg::Crc32,
            _ => {
                return Err(xml::unexpected_prop_value(node, name, "alg", alg_str, ctx.logger));
            }
        };

        let mut alg_name = String::new();
        if alg == ChecksumAlg::Custom {
            xml::validate_single_prop(node, props, "algName", ctx.logger, true)?;
            alg_name = props.get("algName").cloned().unwrap_or_default();
            if !text::is_valid_name(&alg_name) {
                return Err(xml::unexpected_prop_value(node, name, "algName", &alg_name, ctx.logger));
            }
        }

        let mut checksum = ChecksumLayer {
            alg,
            alg_name,
            from: props.get("from").cloned().unwrap_or_default(),
            until: props.get("until").cloned().unwrap_or_default(),
            verify_before_read: false,
        };
        field::update_bool_prop(node, props, "verifyBeforeRead", &mut checksum.verify_before_read, ctx)?;
        Ok(checksum)
    }

    fn verify(&self, layer: &Layer, layers: &[Layer], ctx: &ParseCtx<'_>) -> Result<()> {
        let fail = |kind: ErrorKind, msg: String| -> crate::error::Error {
            let msg = format!("{}: {}", layer.loc, msg);
            ctx.logger.error(&msg);
            crate::error::Error::new(kind, msg)
        };

        if self.from.is_empty() && self.until.is_empty() {
            return Err(fail(
                ErrorKind::SchemaRule,
                "Checksum layer must set \"from\" or \"until\" property to indicate on what \
                 values checksum is calculated."
                    .to_string(),
            ));
        }

        let this_idx = layers
            .iter()
            .position(|l| std::ptr::eq(l, layer))
            .unwrap_or(usize::MAX);

        if !self.from.is_empty() {
            let Some(from_idx) = Layer::index_of(layers, &self.from) else {
                return Err(fail(
                    ErrorKind::UnresolvedReference,
                    format!("Unknown layer \"{}\" in \"from\" property.", self.from),
                ));
            };
            if this_idx <= from_idx {
                return Err(fail(
                    ErrorKind::SchemaRule,
                    format!("Layer \"{}\" must appear before the \"{}\".", self.from, layer.name),
                ));
            }
        }

        if !self.until.is_empty() {
            let Some(until_idx) = Layer::index_of(layers, &self.until) else {
                return Err(fail(
                    ErrorKind::UnresolvedReference,
                    format!("Unknown layer \"{}\" in \"until\" property.", self.until),
                ));
            };
            if until_idx <= this_idx {
                return Err(fail(
                    ErrorKind::SchemaRule,
                    format!("Layer \"{}\" must appear after the \"{}\".", self.until, layer.name),
                ));
            }
        }

        Ok(())
    }
}

impl ValueLayer {
    fn parse(node: &XmlNode, props: &PropsMap, name: &str, ctx: &ParseCtx<'_>) -> Result<ValueLayer> {
        xml::validate_single_prop(node, props, "interfaces", ctx.logger, false)?;

        let mut interfaces = Vec::new();
        if let Some(value) = props.get("interfaces") {
            if value.is_empty() {
                return Err(xml::unexpected_prop_value(node, name, "interfaces", value, ctx.logger));
            }
            for item in value.split(',') {
                let item = item.trim();
                if item.is_empty() {
                    return Err(xml::unexpected_prop_value(node, name, "interfaces", value, ctx.logger));
                }
                if ctx.protocol.find_interface(item).is_none() {
                    return Err(ctx.err(
                        ErrorKind::UnresolvedReference,
                        node,
                        format!("Unknown interface \"{}\".", item),
                    ));
                }
                interfaces.push(item.to_string());
            }
        }

        xml::validate_single_prop(node, props, "interfaceFieldName", ctx.logger, true)?;
        let field_name = props.get("interfaceFieldName").cloned().unwrap_or_default();

        let targets: Vec<&crate::interface::Interface> = if interfaces.is_empty() {
            ctx.protocol.all_interfaces()
        } else {
            interfaces
                .iter()
                .filter_map(|name| ctx.protocol.find_interface(name))
                .collect()
        };

        if targets.is_empty() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "No valid interfaces have been defined.",
            ));
        }

        for interface in &targets {
            if interface.find_field(&field_name).is_none() {
                return Err(ctx.err(
                    ErrorKind::UnresolvedReference,
                    node,
                    format!(
                        "Interface \"{}\" does not define field \"{}\".",
                        interface.name, field_name
                    ),
                ));
            }
        }

        let mut pseudo = false;
        field::update_bool_prop(node, props, "pseudo", &mut pseudo, ctx)?;

        Ok(ValueLayer {
            interfaces,
            interface_field_name: field_name,
            pseudo,
        })
    }
}
