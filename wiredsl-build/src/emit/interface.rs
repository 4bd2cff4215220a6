//! Interface emitters: the polymorphic message base class, parameterised by
//! user options and carrying the transport fields.

use itertools::Itertools;
use wiredsl::{Interface, Namespace, Result};

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
    for interface in ns.interfaces() {
        write_interface(generator, interface, path)?;
    }
    for (child_name, child) in &ns.namespaces {
        let mut child_path = path.to_vec();
        child_path.push(child_name.clone());
        write_namespace(generator, child, &child_path)?;
    }
    Ok(())
}

fn write_interface(generator: &Generator<'_>, interface: &Interface, path: &[String]) -> Result<()> {
    let rel = generator.header_for(&interface.external_ref, "");
    let out_path = generator.output_path_for(&interface.external_ref, "");

    if let Some(replacement) = generator.custom().read(&rel, CustomOp::Replace) {
        return generator.output().write(out_path, &replacement);
    }

    let class_name = generator.class_name(&interface.name);
    let mut includes = vec!["<wirekit/Message.h>".to_string()];
    template::merge_include("<wirekit/options.h>", &mut includes);
    template::merge_include(
        &format!("{}/MsgId.h", generator.main_namespace()),
        &mut includes,
    );
    if let Some(extra) = generator.custom().read(&rel, CustomOp::Inc) {
        for line in extra.lines().filter(|l| !l.trim().is_empty()) {
            template::merge_include(line.trim(), &mut includes);
        }
    }

    let mut field_decls = Vec::new();
    let mut field_names = Vec::new();
    for field in &interface.fields {
        let field_ref = format!("{}.{}", interface.external_ref, field.name());
        let snippet = field_snippet(generator, field, &field_ref);
        for include in snippet.includes {
            template::merge_include(&include, &mut includes);
        }
        field_decls.push(template::indent(&snippet.decl, 4));
        field_names.push(generator.class_name(field.name()));
    }

    let fields_struct = if field_decls.is_empty() {
        String::new()
    } else {
        format!(
            "/// @brief Transport fields of the @ref {} interface.\nstruct {}Fields\n{{\n{}\n\n    \
             /// @brief All fields bundled in @b std::tuple.\n    using All = std::tuple<\n        \
             {}\n    >;\n}};\n",
            class_name,
            class_name,
            field_decls.join("\n\n"),
            field_names.iter().map(|n| format!("{}<>", n)).join(",\n        ")
        )
    };

    let extra_fields_opt = if field_decls.is_empty() {
        String::new()
    } else {
        format!(
            ",\n        wirekit::option::ExtraTransportFields<{}Fields::All>",
            class_name
        )
    };

    let construct = generator
        .custom()
        .read(&rel, CustomOp::Construct)
        .map(|body| {
            format!(
                "public:\n    /// @brief Custom construction.\n    {}()\n    {{\n{}\n    }}\n",
                class_name,
                template::indent(&body, 8)
            )
        })
        .unwrap_or_default();

    let (begin_ns, end_ns) = generator.namespaces_for(path, "");

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#^#INCLUDES#$#
#^#BEG_NAMESPACE#$#
#^#FIELDS_STRUCT#$#
/// @brief Definition of the \"#^#NAME#$#\" common message interface.
/// @details Every message class of the protocol extends this class.#^#DESC#$#
/// @tparam TOpt Extra interface options.
template <typename... TOpt>
class #^#CLASS_NAME#$# : public
    wirekit::Message<
        wirekit::option::MsgIdType<MsgId>#^#EXTRA_FIELDS_OPT#$#,
        TOpt...
    >
{
#^#CONSTRUCT#$#
#^#APPEND_INNER#$#
};

#^#APPEND#$#
#^#END_NAMESPACE#$#";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("INCLUDES", template::includes_to_statements(&includes));
    repl.insert("BEG_NAMESPACE", begin_ns);
    repl.insert("END_NAMESPACE", end_ns);
    repl.insert("FIELDS_STRUCT", fields_struct);
    repl.insert("NAME", interface.name.clone());
    repl.insert(
        "DESC",
        if interface.description.is_empty() {
            String::new()
        } else {
            format!("\n/// {}", interface.description)
        },
    );
    repl.insert("CLASS_NAME", class_name);
    repl.insert("EXTRA_FIELDS_OPT", extra_fields_opt);
    repl.insert("CONSTRUCT", construct);
    repl.insert(
        "APPEND_INNER",
        generator
            .custom()
            .read(&rel, CustomOp::Public)
            .map(|text| format!("public:\n{}", template::indent(&text, 4)))
            .unwrap_or_default(),
    );
    repl.insert(
        "APPEND",
        generator.custom().read(&rel, CustomOp::Append).unwrap_or_default(),
    );

    generator.output().write(out_path, &template::process_template(TEMPL, &repl))
}
