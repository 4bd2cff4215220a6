//! Project-level emitters: message aggregates (all / per-platform /
//! per-sender / extra bundles), the message-id enumeration, option sets,
//! dispatch tables, the message factory and the version header.

use itertools::Itertools;
use wiredsl::{Message, Namespace, Result, Sender};

use crate::generator::{CustomizationLevel, Generator};
use crate::template::{self, ReplacementMap};

pub(crate) fn write_all(generator: &Generator<'_>) -> Result<()> {
    write_msg_id(generator)?;
    write_version(generator)?;
    write_all_messages(generator, "AllMessages", |_| true)?;
    write_all_messages(generator, "ServerInputMessages", |m| {
        matches!(m.sender, Sender::Both | Sender::Client)
    })?;
    write_all_messages(generator, "ClientInputMessages", |m| {
        matches!(m.sender, Sender::Both | Sender::Server)
    })?;

    for platform in generator.protocol().platforms() {
        let file_name = format!("{}Messages", generator.class_name(platform));
        let platform = platform.clone();
        write_all_messages(generator, &file_name, move |m| {
            m.platforms.is_empty() || m.platforms.contains(&platform)
        })?;
    }

    for (bundle, members) in generator.extra_message_bundles() {
        let file_name = format!("{}Messages", generator.class_name(&bundle));
        write_all_messages(generator, &file_name, move |m| {
            members.contains(&m.external_ref) || members.contains(&m.name)
        })?;
    }

    write_options(generator, "DefaultOptions", "wirekit::option::EmptyOption")?;
    write_options(generator, "ClientDefaultOptions", "DefaultOptions")?;
    write_options(generator, "ServerDefaultOptions", "DefaultOptions")?;
    write_options(generator, "DataViewDefaultOptions", "DefaultOptions")?;
    write_options(generator, "BareMetalDefaultOptions", "DefaultOptions")?;
    write_options(generator, "MsgFactoryDefaultOptions", "DefaultOptions")?;

    write_dispatch(generator)?;
    write_factory(generator)?;
    Ok(())
}

fn existing_messages<'p>(generator: &Generator<'p>) -> Vec<&'p Message> {
    generator
        .protocol()
        .all_messages()
        .into_iter()
        .filter(|m| generator.message_exists(m))
        .collect()
}

/// The `MsgId` enumeration of all message numeric ids.
fn write_msg_id(generator: &Generator<'_>) -> Result<()> {
    let messages = existing_messages(generator);
    let entries = messages
        .iter()
        .map(|m| {
            format!(
                "    MsgId_{} = {},",
                m.external_ref.replace('.', "_"),
                m.id
            )
        })
        .join("\n");

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#include <cstdint>

namespace #^#MAIN_NS#$#
{

/// @brief Message ids enumeration.
enum MsgId : std::uint64_t
{
#^#ENTRIES#$#
};

} // namespace #^#MAIN_NS#$#
";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("MAIN_NS", generator.main_namespace().to_string());
    repl.insert("ENTRIES", entries);

    generator.output().write(
        std::path::Path::new("include")
            .join(generator.main_namespace())
            .join("MsgId.h"),
        &template::process_template(TEMPL, &repl),
    )
}

/// Protocol and schema version macros.
fn write_version(generator: &Generator<'_>) -> Result<()> {
    let cap = generator.main_namespace().to_uppercase();
    let semver = if generator.protocol_version().is_empty() {
        "0.0.1"
    } else {
        generator.protocol_version()
    };
    let mut parts = semver.split('.');
    let major = parts.next().unwrap_or("0");
    let minor = parts.next().unwrap_or("0");
    let patch = parts.next().unwrap_or("0");

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

/// @brief Version of the protocol schema.
#define #^#CAP#$#_SPEC_VERSION (#^#SPEC_VERSION#$#)

/// @brief Major version of the protocol library.
#define #^#CAP#$#_MAJOR_VERSION (#^#MAJOR#$#U)

/// @brief Minor version of the protocol library.
#define #^#CAP#$#_MINOR_VERSION (#^#MINOR#$#U)

/// @brief Patch version of the protocol library.
#define #^#CAP#$#_PATCH_VERSION (#^#PATCH#$#U)
";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("CAP", cap);
    repl.insert(
        "SPEC_VERSION",
        generator.protocol().schema().version.to_string(),
    );
    repl.insert("MAJOR", major.to_string());
    repl.insert("MINOR", minor.to_string());
    repl.insert("PATCH", patch.to_string());

    generator.output().write(
        std::path::Path::new("include")
            .join(generator.main_namespace())
            .join("Version.h"),
        &template::process_template(TEMPL, &repl),
    )
}

/// An aggregate "messages" tuple filtered by the given predicate.
fn write_all_messages(
    generator: &Generator<'_>,
    class_name: &str,
    filter: impl Fn(&Message) -> bool,
) -> Result<()> {
    let messages = existing_messages(generator);
    let selected: Vec<_> = messages.into_iter().filter(|m| filter(m)).collect();

    let mut includes = vec!["<tuple>".to_string()];
    template::merge_include(
        &format!("{}/DefaultOptions.h", generator.main_namespace()),
        &mut includes,
    );
    for message in &selected {
        template::merge_include(&generator.header_for(&message.external_ref, "message"), &mut includes);
    }

    let entries = selected
        .iter()
        .map(|m| format!("        {}<TBase, TOpt>", generator.scope_for(&m.external_ref, "message")))
        .join(",\n");

    const TEMPL: &str = "\
#^#GENERATED#$#
/// @file
/// @brief Contains definition of the #^#CLASS_NAME#$# bundle.

#pragma once

#^#INCLUDES#$#
namespace #^#MAIN_NS#$#
{

/// @brief Messages of the protocol in ascending id order.
/// @tparam TBase Base class of all the messages.
/// @tparam TOpt Protocol definition options.
template <typename TBase, typename TOpt = #^#MAIN_NS#$#::DefaultOptions>
using #^#CLASS_NAME#$# =
    std::tuple<
#^#MESSAGES#$#
    >;

} // namespace #^#MAIN_NS#$#
";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("CLASS_NAME", class_name.to_string());
    repl.insert("INCLUDES", template::includes_to_statements(&includes));
    repl.insert("MAIN_NS", generator.main_namespace().to_string());
    repl.insert("MESSAGES", entries);

    generator.output().write(
        std::path::Path::new("include")
            .join(generator.main_namespace())
            .join(format!("{}.h", class_name)),
        &template::process_template(TEMPL, &repl),
    )
}

fn options_for_namespace(generator: &Generator<'_>, ns: &Namespace, name: &str) -> String {
    let mut sections = Vec::new();

    let customizable_fields: Vec<_> = ns
        .fields()
        .filter(|f| {
            f.base.customizable || generator.customization() == CustomizationLevel::Full
        })
        .collect();
    if !customizable_fields.is_empty() {
        let entries = customizable_fields
            .iter()
            .map(|f| {
                format!(
                    "    /// @brief Extra options for the \"{}\" field.\n    using {} = \
                     wirekit::option::EmptyOption;",
                    f.name(),
                    generator.class_name(f.name())
                )
            })
            .join("\n\n");
        sections.push(format!("struct field\n{{\n{}\n}};", entries));
    }

    let customizable_messages: Vec<_> = ns
        .messages()
        .filter(|m| {
            generator.message_exists(m)
                && (m.customizable || generator.customization() != CustomizationLevel::None)
        })
        .collect();
    if !customizable_messages.is_empty() {
        let entries = customizable_messages
            .iter()
            .map(|m| {
                format!(
                    "    /// @brief Extra options for the \"{}\" message.\n    using {} = \
                     wirekit::option::EmptyOption;",
                    m.name,
                    generator.class_name(&m.name)
                )
            })
            .join("\n\n");
        sections.push(format!("struct message\n{{\n{}\n}};", entries));
    }

    for (child_name, child) in &ns.namespaces {
        let nested = options_for_namespace(generator, child, child_name);
        if !nested.is_empty() {
            sections.push(nested);
        }
    }

    if sections.is_empty() {
        return String::new();
    }

    let body = sections.join("\n\n");
    if name.is_empty() {
        body
    } else {
        format!(
            "/// @brief Options of the \"{}\" namespace.\nstruct {}\n{{\n{}\n}};",
            name,
            name.to_lowercase(),
            template::indent(&body, 4)
        )
    }
}

/// Option-set headers built by walking the namespace tree recursively.
fn write_options(generator: &Generator<'_>, class_name: &str, base: &str) -> Result<()> {
    let mut sections = Vec::new();
    for (name, ns) in generator.protocol().namespaces() {
        let section = options_for_namespace(generator, ns, name);
        if !section.is_empty() {
            sections.push(section);
        }
    }

    let mut body = sections.join("\n\n");
    if generator.force_main_ns_in_options() {
        body = format!(
            "/// @brief Options of the main namespace.\nstruct {}\n{{\n{}\n}};",
            generator.main_namespace(),
            template::indent(&body, 4)
        );
    }

    let mut includes = vec!["<wirekit/options.h>".to_string()];
    if base != "wirekit::option::EmptyOption" {
        template::merge_include(
            &format!("{}/DefaultOptions.h", generator.main_namespace()),
            &mut includes,
        );
    }

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#^#INCLUDES#$#
namespace #^#MAIN_NS#$#
{

/// @brief #^#CLASS_NAME#$# of the protocol.
struct #^#CLASS_NAME#$##^#BASE#$#
{
#^#BODY#$#
};

} // namespace #^#MAIN_NS#$#
";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("INCLUDES", template::includes_to_statements(&includes));
    repl.insert("MAIN_NS", generator.main_namespace().to_string());
    repl.insert("CLASS_NAME", class_name.to_string());
    repl.insert(
        "BASE",
        if base == "wirekit::option::EmptyOption" {
            String::new()
        } else {
            format!(" : public {}", base)
        },
    );
    repl.insert("BODY", template::indent(&body, 4));

    generator.output().write(
        std::path::Path::new("include")
            .join(generator.main_namespace())
            .join(format!("{}.h", class_name)),
        &template::process_template(TEMPL, &repl),
    )
}

/// Id-indexed dispatch table over all messages.
fn write_dispatch(generator: &Generator<'_>) -> Result<()> {
    let messages = existing_messages(generator);

    let mut includes = Vec::new();
    template::merge_include(
        &format!("{}/MsgId.h", generator.main_namespace()),
        &mut includes,
    );
    for message in &messages {
        template::merge_include(&generator.header_for(&message.external_ref, "message"), &mut includes);
    }

    let cases = messages
        .iter()
        .map(|m| {
            format!(
                "    case MsgId_{}:\n        return handler.handle(static_cast<{}<TMessage>&>(msg));",
                m.external_ref.replace('.', "_"),
                generator.scope_for(&m.external_ref, "message")
            )
        })
        .join("\n");

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#^#INCLUDES#$#
namespace #^#MAIN_NS#$#
{

namespace dispatch
{

/// @brief Dispatch a message object to its appropriate handling function.
/// @param[in] id Numeric message id.
/// @param[in] msg Message object held by reference to its interface class.
/// @param[in] handler Handler object with `handle()` member functions.
template <typename TMessage, typename THandler>
auto dispatchMessage(MsgId id, TMessage& msg, THandler& handler) ->
    decltype(handler.handle(msg))
{
    switch (id) {
#^#CASES#$#
    default:
        break;
    }
    return handler.handle(msg);
}

} // namespace dispatch

} // namespace #^#MAIN_NS#$#
";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("INCLUDES", template::includes_to_statements(&includes));
    repl.insert("MAIN_NS", generator.main_namespace().to_string());
    repl.insert("CASES", cases);

    generator.output().write(
        std::path::Path::new("include")
            .join(generator.main_namespace())
            .join("dispatch")
            .join("DispatchMessage.h"),
        &template::process_template(TEMPL, &repl),
    )
}

/// Allocation factory creating message objects from numeric ids.
fn write_factory(generator: &Generator<'_>) -> Result<()> {
    let messages = existing_messages(generator);

    let mut includes = vec!["<memory>".to_string()];
    template::merge_include(
        &format!("{}/MsgId.h", generator.main_namespace()),
        &mut includes,
    );
    template::merge_include(
        &format!("{}/AllMessages.h", generator.main_namespace()),
        &mut includes,
    );

    let cases = messages
        .iter()
        .map(|m| {
            format!(
                "    case MsgId_{}:\n        return MsgPtr(new {}<TInterface>());",
                m.external_ref.replace('.', "_"),
                generator.scope_for(&m.external_ref, "message")
            )
        })
        .join("\n");

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#^#INCLUDES#$#
namespace #^#MAIN_NS#$#
{

namespace factory
{

/// @brief Dynamic message factory of the protocol.
/// @tparam TInterface The common interface class of all the messages.
template <typename TInterface>
class MsgFactory
{
public:
    /// @brief Smart pointer to the allocated message object.
    using MsgPtr = std::unique_ptr<TInterface>;

    /// @brief Allocate the message object given numeric id.
    MsgPtr createMsg(MsgId id) const
    {
        switch (id) {
#^#CASES#$#
        default:
            break;
        }
        return MsgPtr();
    }
};

} // namespace factory

} // namespace #^#MAIN_NS#$#
";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("INCLUDES", template::includes_to_statements(&includes));
    repl.insert("MAIN_NS", generator.main_namespace().to_string());
    repl.insert("CASES", cases);

    generator.output().write(
        std::path::Path::new("include")
            .join(generator.main_namespace())
            .join("factory")
            .join("MsgFactory.h"),
        &template::process_template(TEMPL, &repl),
    )
}
