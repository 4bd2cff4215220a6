//! `<frame>` entities: the ordered stack of layers wrapping a message.

use crate::ctx::ParseCtx;
use crate::error::{Error, ErrorKind, Result};
use crate::field;
use crate::layer::{Layer, LayerKind, SUPPORTED_LAYERS};
use crate::text;
use crate::xml::{self, Location, XmlNode};

const COMMON_PROPS: &[&str] = &["name", "description"];

#[derive(Debug, Clone)]
pub struct Frame {
    pub name: String,
    pub description: String,
    pub layers: Vec<Layer>,
    pub external_ref: String,
    loc: Location,
}

impl Frame {
    pub(crate) fn parse(node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<Frame> {
        let mut props = node.props();
        xml::parse_children_as_props(node, COMMON_PROPS, ctx.logger, &mut props, true)?;

        let mut frame = Frame {
            name: String::new(),
            description: String::new(),
            layers: Vec::new(),
            external_ref: String::new(),
            loc: node.location().clone(),
        };

        xml::validate_single_prop(node, &props, "name", ctx.logger, true)?;
        frame.name = props.get("name").cloned().unwrap_or_default();
        if !text::is_valid_name(&frame.name) {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Invalid value for name property \"{}\".", frame.name),
            ));
        }

        field::update_string_prop(node, &props, "description", &mut frame.description, true, ctx)?;
        frame.update_layers(node, ctx)?;
        Ok(frame)
    }

    pub fn location(&self) -> &Location {
        &self.loc
    }

    fn update_layers(&mut self, node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<()> {
        let layer_nodes = field::collect_member_nodes(node, "frame", "layers", SUPPORTED_LAYERS, ctx)?;
        if layer_nodes.is_empty() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                "The \"frame\" must contain at least one layer.",
            ));
        }

        for layer_node in layer_nodes {
            let layer = Layer::parse(layer_node, ctx)?;
            if self.layers.iter().any(|l| l.name == layer.name) {
                let msg = format!(
                    "{}: Layer with name \"{}\" has already been defined within the frame.",
                    layer.location(),
                    layer.name
                );
                ctx.logger.error(&msg);
                return Err(Error::new(ErrorKind::DuplicateName, msg));
            }
            self.layers.push(layer);
        }

        self.verify_layers(ctx)
    }

    /// Layer-ordering rules: exactly one payload, payload last, every other
    /// layer before it, checksum ranges resolvable. Re-run by the driver
    /// during cross-verification.
    pub(crate) fn verify_layers(&self, ctx: &ParseCtx<'_>) -> Result<()> {
        let payload_count = self
            .layers
            .iter()
            .filter(|l| matches!(l.kind, LayerKind::Payload))
            .count();
        if payload_count != 1 {
            let msg = format!(
                "{}: The frame must contain exactly one \"payload\" layer.",
                self.loc
            );
            ctx.logger.error(&msg);
            return Err(Error::new(ErrorKind::SchemaRule, msg));
        }

        for layer in &self.layers {
            layer.verify(&self.layers, ctx)?;
        }
        Ok(())
    }
}
