//! Frame emitters: one class per frame, assembling layer templates in
//! declaration order (innermost payload first in the generated stack).

use itertools::Itertools;
use wiredsl::{Frame, Layer, LayerKind, Namespace, Result};

use crate::custom::CustomOp;
use crate::emit::field::field_snippet;
use crate::generator::Generator;
use crate::template::{self, ReplacementMap};

pub(crate) fn write_all(generator: &Generator<'_>) -> Result<()> {
    for (name, ns) in generator.protocol().namespaces() {
        let path = if name.is_empty() {
            Vec::new()
        } else {
            vec![name.clone()]
        };
        write_namespace(generator, ns, &path)?;
    }
    Ok(())
}

fn write_namespace(generator: &Generator<'_>, ns: &Namespace, path: &[String]) -> Result<()> {
    for frame in ns.frames() {
        write_frame(generator, frame, path)?;
    }
    for (child_name, child) in &ns.namespaces {
        let mut child_path = path.to_vec();
        child_path.push(child_name.clone());
        write_namespace(generator, child, &child_path)?;
    }
    Ok(())
}

fn layer_class(generator: &Generator<'_>, frame: &Frame, layer: &Layer, inner: &str) -> String {
    let layer_name = generator.class_name(&layer.name);
    let field_type = layer.field.as_ref().map(|_| {
        format!(
            "typename {}Layers::{}LayerField",
            generator.class_name(&frame.name),
            layer_name
        )
    });

    match &layer.kind {
        LayerKind::Payload => "wirekit::frame::MsgDataLayer<>".to_string(),
        LayerKind::Id => format!(
            "wirekit::frame::MsgIdLayer<\n    {},\n    TMessage,\n    TAllMessages,\n    {}\n>",
            field_type.unwrap_or_default(),
            inner
        ),
        LayerKind::Size => format!(
            "wirekit::frame::MsgSizeLayer<\n    {},\n    {}\n>",
            field_type.unwrap_or_default(),
            inner
        ),
        LayerKind::Sync => format!(
            "wirekit::frame::SyncPrefixLayer<\n    {},\n    {}\n>",
            field_type.unwrap_or_default(),
            inner
        ),
        LayerKind::Checksum(checksum) => {
            let alg = match checksum.alg {
                wiredsl::ChecksumAlg::Sum => "wirekit::frame::checksum::BasicSum<>".to_string(),
                wiredsl::ChecksumAlg::CrcCcitt => "wirekit::frame::checksum::Crc_CCITT".to_string(),
                wiredsl::ChecksumAlg::Crc16 => "wirekit::frame::checksum::Crc_16".to_string(),
                wiredsl::ChecksumAlg::Crc32 => "wirekit::frame::checksum::Crc_32".to_string(),
                wiredsl::ChecksumAlg::Custom => checksum.alg_name.clone(),
            };
            let verify_opt = if checksum.verify_before_read {
                ",\n    wirekit::option::ChecksumLayerVerifyBeforeRead"
            } else {
                ""
            };
            format!(
                "wirekit::frame::ChecksumLayer<\n    {},\n    {},\n    {}{}\n>",
                field_type.unwrap_or_default(),
                alg,
                inner,
                verify_opt
            )
        }
        LayerKind::Value(value) => {
            let idx_token = format!(
                "{}TransportIdx",
                generator.class_name(&value.interface_field_name)
            );
            format!(
                "wirekit::frame::TransportValueLayer<\n    {},\n    {},\n    {}\n>",
                field_type.unwrap_or_default(),
                idx_token,
                inner
            )
        }
        LayerKind::Custom(_) => format!(
            "{}<\n    {},\n    {}\n>",
            generator.class_name(&layer.name),
            field_type.unwrap_or_default(),
            inner
        ),
    }
}

fn write_frame(generator: &Generator<'_>, frame: &Frame, path: &[String]) -> Result<()> {
    let rel = generator.header_for(&frame.external_ref, "frame");
    let out_path = generator.output_path_for(&frame.external_ref, "frame");

    if let Some(replacement) = generator.custom().read(&rel, CustomOp::Replace) {
        return generator.output().write(out_path, &replacement);
    }

    let class_name = generator.class_name(&frame.name);
    let mut includes = vec!["<wirekit/frame.h>".to_string()];
    template::merge_include("<wirekit/options.h>", &mut includes);
    template::merge_include(
        &format!("{}/AllMessages.h", generator.main_namespace()),
        &mut includes,
    );

    // Per-layer field declarations grouped in a <Frame>Layers struct.
    let mut layer_field_decls = Vec::new();
    for layer in &frame.layers {
        let Some(field) = &layer.field else {
            continue;
        };
        let layer_ref = format!("{}.{}", frame.external_ref, layer.name);
        let mut snippet = field_snippet(generator, field, &layer_ref);
        for include in snippet.includes.drain(..) {
            template::merge_include(&include, &mut includes);
        }

        layer_field_decls.push(template::indent(&snippet.decl, 4));
        layer_field_decls.push(format!(
            "    /// @brief Field of the \"{}\" layer.\n    using {}LayerField = {}<>;",
            layer.name,
            generator.class_name(&layer.name),
            generator.class_name(field.name())
        ));
    }

    // The stack is built payload-out: the last declared layer is the
    // innermost one.
    let mut stack_expr = String::new();
    let mut stack_doc = Vec::new();
    for layer in frame.layers.iter().rev() {
        stack_expr = layer_class(generator, frame, layer, &stack_expr);
        stack_doc.push(layer.name.clone());
    }

    let (begin_ns, end_ns) = generator.namespaces_for(path, "frame");

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#^#INCLUDES#$#
#^#BEG_NAMESPACE#$#
/// @brief Layer fields of the @ref #^#CLASS_NAME#$# frame.
struct #^#CLASS_NAME#$#Layers
{
#^#LAYER_FIELDS#$#
};

/// @brief Definition of the \"#^#NAME#$#\" frame class.
/// @details Wraps the message with (outermost first): #^#STACK_DOC#$#.
/// @tparam TMessage The common interface class of all the messages.
/// @tparam TAllMessages All the message types handled by the frame.
template <
    typename TMessage,
    typename TAllMessages = #^#MAIN_NS#$#::AllMessages<TMessage>
>
using #^#CLASS_NAME#$# =
#^#STACK#$#;

#^#END_NAMESPACE#$#";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("INCLUDES", template::includes_to_statements(&includes));
    repl.insert("BEG_NAMESPACE", begin_ns);
    repl.insert("END_NAMESPACE", end_ns);
    repl.insert("CLASS_NAME", class_name);
    repl.insert("NAME", frame.name.clone());
    repl.insert("LAYER_FIELDS", layer_field_decls.join("\n\n"));
    repl.insert("STACK_DOC", stack_doc.iter().rev().join(", "));
    repl.insert("STACK", template::indent(&stack_expr, 4));
    repl.insert("MAIN_NS", generator.main_namespace().to_string());

    generator.output().write(out_path, &template::process_template(TEMPL, &repl))
}
