//! Message emitters: the protocol-definition class of every message plus
//! its template-free plugin view.

use itertools::Itertools;
use wiredsl::{FieldKind, Message, Namespace, Prefix, Result};

use crate::custom::CustomOp;
use crate::emit::field::{cond_text, field_snippet};
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
    for message in ns.messages() {
        if !generator.message_exists(message) {
            continue;
        }
        write_message(generator, message, path)?;
        write_plugin_view(generator, message, path)?;
    }
    for (child_name, child) in &ns.namespaces {
        let mut child_path = path.to_vec();
        child_path.push(child_name.clone());
        write_namespace(generator, child, &child_path)?;
    }
    Ok(())
}

fn sender_doc(message: &Message) -> &'static str {
    match message.sender {
        wiredsl::Sender::Both => "both client and server",
        wiredsl::Sender::Client => "the client",
        wiredsl::Sender::Server => "the server",
    }
}

fn write_message(generator: &Generator<'_>, message: &Message, path: &[String]) -> Result<()> {
    let rel = generator.header_for(&message.external_ref, "message");
    let out_path = generator.output_path_for(&message.external_ref, "message");

    if let Some(replacement) = generator.custom().read(&rel, CustomOp::Replace) {
        return generator.output().write(out_path, &replacement);
    }

    let class_name = generator.class_name(&message.name);
    let mut includes = vec!["<wirekit/Message.h>".to_string()];
    template::merge_include("<wirekit/options.h>", &mut includes);
    if let Some(extra) = generator.custom().read(&rel, CustomOp::Inc) {
        for line in extra.lines().filter(|l| !l.trim().is_empty()) {
            template::merge_include(line.trim(), &mut includes);
        }
    }

    // Member field declarations.
    let mut field_decls = Vec::new();
    let mut field_names = Vec::new();
    for field in &message.fields {
        if !generator.element_exists(
            field.base.since_version,
            field.base.deprecated_since,
            field.base.deprecated_removed,
        ) {
            continue;
        }
        let field_ref = format!("{}.{}", message.external_ref, field.name());
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
            "/// @brief Fields of the @ref {} message.\ntemplate <typename TOpt = \
             wirekit::option::EmptyOption>\nstruct {}Fields\n{{\n{}\n\n    /// @brief All \
             fields bundled in @b std::tuple.\n    using All = std::tuple<\n        {}\n    \
             >;\n}};\n",
            class_name,
            class_name,
            field_decls.join("\n\n"),
            field_names.iter().map(|n| format!("{}<TOpt>", n)).join(",\n        ")
        )
    };

    let fields_opt = if field_decls.is_empty() {
        "std::tuple<>".to_string()
    } else {
        format!("typename {}Fields<TOpt>::All", class_name)
    };

    let custom_read =
        generated_read_body(message).or_else(|| generator.custom().read(&rel, CustomOp::Read));
    let mut protected = String::new();
    if let Some(read) = &custom_read {
        protected.push_str(&format!(
            "protected:\n    /// @brief Generated read functionality.\n{}\n",
            template::indent(read, 4)
        ));
    }

    let mut public_extra = String::new();
    for (op, label) in [
        (CustomOp::Public, "extra public members"),
        (CustomOp::Name, "custom name body"),
        (CustomOp::Length, "custom length body"),
        (CustomOp::Valid, "custom validity body"),
        (CustomOp::Refresh, "custom refresh body"),
        (CustomOp::Write, "custom write body"),
    ] {
        if let Some(text) = generator.custom().read(&rel, op) {
            public_extra.push_str(&format!("\n    // {}\n{}\n", label, template::indent(&text, 4)));
        }
    }

    if let Some(text) = generator.custom().read(&rel, CustomOp::Protected) {
        protected.push_str(&format!("protected:\n{}\n", template::indent(&text, 4)));
    }
    if let Some(text) = generator.custom().read(&rel, CustomOp::Private) {
        protected.push_str(&format!("private:\n{}\n", template::indent(&text, 4)));
    }

    let (begin_ns, end_ns) = generator.namespaces_for(path, "message");

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#^#INCLUDES#$#
#^#BEG_NAMESPACE#$#
#^#FIELDS_STRUCT#$#
/// @brief Definition of the \"#^#NAME#$#\" message class.
/// @details Sent by #^#SENDER#$#.#^#DESC#$#
/// @tparam TMsgBase Base (interface) class of the message.
/// @tparam TOpt Protocol definition options.
template <typename TMsgBase, typename TOpt = wirekit::option::EmptyOption>
class #^#CLASS_NAME#$# : public
    wirekit::Message<
        TMsgBase,
        wirekit::option::StaticNumIdImpl<#^#MSG_ID#$#>,
        wirekit::option::FieldsImpl<#^#FIELDS_OPT#$#>,
        wirekit::option::MsgType<#^#CLASS_NAME#$#<TMsgBase, TOpt>>,
        wirekit::option::HasName
    >
{
public:
    /// @brief Name of the message.
    static const char* doName()
    {
        return \"#^#DISPLAY_NAME#$#\";
    }
#^#PUBLIC_EXTRA#$#
#^#PROTECTED#$#
};

#^#APPEND#$#
#^#END_NAMESPACE#$#";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("INCLUDES", template::includes_to_statements(&includes));
    repl.insert("BEG_NAMESPACE", begin_ns);
    repl.insert("END_NAMESPACE", end_ns);
    repl.insert("FIELDS_STRUCT", fields_struct);
    repl.insert("NAME", message.name.clone());
    repl.insert("SENDER", sender_doc(message).to_string());
    repl.insert(
        "DESC",
        if message.description.is_empty() {
            String::new()
        } else {
            format!("\n/// {}", message.description)
        },
    );
    repl.insert("CLASS_NAME", class_name);
    repl.insert("MSG_ID", message.id.to_string());
    repl.insert("FIELDS_OPT", fields_opt);
    repl.insert(
        "DISPLAY_NAME",
        if message.display_name.is_empty() {
            message.name.clone()
        } else {
            message.display_name.clone()
        },
    );
    repl.insert("PUBLIC_EXTRA", public_extra);
    repl.insert("PROTECTED", protected);

    // "_extend" wraps the generated class with a user-derived one appended
    // after it; "_append" adds loose text.
    let mut append = generator.custom().read(&rel, CustomOp::Extend).unwrap_or_default();
    if let Some(text) = generator.custom().read(&rel, CustomOp::Append) {
        if !append.is_empty() {
            append.push('\n');
        }
        append.push_str(&text);
    }
    repl.insert("APPEND", append);

    generator.output().write(out_path, &template::process_template(TEMPL, &repl))
}

/// Messages owning optional fields with conditions or detached prefixes get
/// a generated `doRead` that re-evaluates modes and re-attaches prefixes.
fn generated_read_body(message: &Message) -> Option<String> {
    let mut steps = Vec::new();
    for field in &message.fields {
        let accessor = format!("field_{}()", field.name());
        match &field.kind {
            FieldKind::Optional(opt) => {
                if let Some(cond) = &opt.cond {
                    steps.push(format!(
                        "    // Mode of \"{}\" follows: {}\n    refresh_{}();",
                        field.name(),
                        cond_text(cond),
                        field.name()
                    ));
                }
            }
            FieldKind::List(list) => {
                for (prefix, prop) in [
                    (&list.count_prefix, "count"),
                    (&list.length_prefix, "length"),
                    (&list.elem_length_prefix, "element length"),
                ] {
                    if let Some(Prefix::Detached(name)) = prefix {
                        steps.push(format!(
                            "    // Detached {} prefix of \"{}\".\n    {}.forceReadElemCount(\
                             static_cast<std::size_t>(field_{}().value()));",
                            prop,
                            field.name(),
                            accessor,
                            name
                        ));
                    }
                }
            }
            FieldKind::Str(string) => {
                if let Some(Prefix::Detached(name)) = &string.prefix {
                    steps.push(format!(
                        "    // Detached length prefix of \"{}\".\n    {}.forceReadLength(\
                         static_cast<std::size_t>(field_{}().value()));",
                        field.name(),
                        accessor,
                        name
                    ));
                }
            }
            FieldKind::Data(data) => {
                if let Some(Prefix::Detached(name)) = &data.prefix {
                    steps.push(format!(
                        "    // Detached length prefix of \"{}\".\n    {}.forceReadLength(\
                         static_cast<std::size_t>(field_{}().value()));",
                        field.name(),
                        accessor,
                        name
                    ));
                }
            }
            _ => {}
        }
    }

    if steps.is_empty() {
        return None;
    }

    Some(format!(
        "template <typename TIter>\nwirekit::ErrorStatus doRead(TIter& iter, std::size_t len)\n\
         {{\n{}\n    return Base::doRead(iter, len);\n}}",
        steps.join("\n")
    ))
}

/// The template-free view used by tools consuming the protocol
/// dynamically.
fn write_plugin_view(generator: &Generator<'_>, message: &Message, path: &[String]) -> Result<()> {
    let class_name = generator.class_name(&message.name);
    let rel = generator.header_for(&message.external_ref, "message");
    let out_path = std::path::Path::new("include")
        .join("plugin")
        .join(generator.header_for(&message.external_ref, "message"));

    let (begin_ns, end_ns) = {
        let mut parts = vec!["plugin".to_string()];
        parts.extend(path.iter().cloned());
        generator.namespaces_for(&parts, "message")
    };

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#include \"#^#PROT_HEADER#$#\"

#^#BEG_NAMESPACE#$#
/// @brief Plugin-side view of the @ref #^#SCOPE#$# message.
template <typename TInterface>
using #^#CLASS_NAME#$# = #^#SCOPE#$#<TInterface>;

#^#END_NAMESPACE#$#";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("PROT_HEADER", rel);
    repl.insert("BEG_NAMESPACE", begin_ns);
    repl.insert("END_NAMESPACE", end_ns);
    repl.insert("SCOPE", generator.scope_for(&message.external_ref, "message"));
    repl.insert("CLASS_NAME", class_name);

    generator.output().write(out_path, &template::process_template(TEMPL, &repl))
}
