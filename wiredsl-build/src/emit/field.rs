//! Field emitters: one definition header per globally defined field, plus
//! a "common" header carrying template-independent value/bit name tables
//! for enums and sets.

use itertools::Itertools;
use wiredsl::{
    Endian, Field, FieldKind, IntType, Namespace, OptCond, OptMode, Prefix, Result,
};

use crate::custom::CustomOp;
use crate::generator::Generator;
use crate::template::{self, ReplacementMap};

/// Emits all field headers of every namespace.
pub(crate) fn write_all(generator: &Generator<'_>) -> Result<()> {
    for (name, ns) in generator.protocol().namespaces() {
        write_namespace(generator, ns, &ns_path(name))?;
    }
    Ok(())
}

fn ns_path(root_name: &str) -> Vec<String> {
    if root_name.is_empty() {
        Vec::new()
    } else {
        vec![root_name.to_string()]
    }
}

fn write_namespace(generator: &Generator<'_>, ns: &Namespace, path: &[String]) -> Result<()> {
    for field in ns.fields() {
        write_field(generator, field, path)?;
    }
    for (child_name, child) in &ns.namespaces {
        let mut child_path = path.to_vec();
        child_path.push(child_name.clone());
        write_namespace(generator, child, &child_path)?;
    }
    Ok(())
}

fn external_ref(path: &[String], name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path.join("."), name)
    }
}

fn write_field(generator: &Generator<'_>, field: &Field, path: &[String]) -> Result<()> {
    let ext_ref = external_ref(path, field.name());
    let rel = generator.header_for(&ext_ref, "field");
    let out_path = generator.output_path_for(&ext_ref, "field");

    if let Some(replacement) = generator.custom().read(&rel, CustomOp::Replace) {
        return generator.output().write(out_path, &replacement);
    }

    if needs_common_header(field) {
        write_common(generator, field, &ext_ref)?;
    }

    let snippet = field_snippet(generator, field, &ext_ref);

    let mut includes = snippet.includes.clone();
    template::merge_include("<wirekit/options.h>", &mut includes);
    if let Some(extra) = generator.custom().read(&rel, CustomOp::Inc) {
        for line in extra.lines().filter(|l| !l.trim().is_empty()) {
            template::merge_include(line.trim(), &mut includes);
        }
    }

    let (begin_ns, end_ns) = generator.namespaces_for(path, "field");

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#^#INCLUDES#$#
#^#BEG_NAMESPACE#$#
#^#DEF#$#
#^#APPEND#$#
#^#END_NAMESPACE#$#";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("INCLUDES", template::includes_to_statements(&includes));
    repl.insert("BEG_NAMESPACE", begin_ns);
    repl.insert("END_NAMESPACE", end_ns);
    repl.insert("DEF", snippet.decl);

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

fn needs_common_header(field: &Field) -> bool {
    matches!(field.kind, FieldKind::Enum(_) | FieldKind::Set(_))
}

/// Template-independent name tables for enums and sets.
fn write_common(generator: &Generator<'_>, field: &Field, ext_ref: &str) -> Result<()> {
    let common_ref = format!("{}Common", ext_ref);
    let out_path = generator.output_path_for(&common_ref, "field");
    let class_name = generator.class_name(field.name());

    let (begin_ns, end_ns) = {
        let parts: Vec<String> = ext_ref.split('.').map(str::to_string).collect();
        let ns_parts = &parts[..parts.len() - 1];
        generator.namespaces_for(ns_parts, "field")
    };

    let table = match &field.kind {
        FieldKind::Enum(e) => {
            let entries = e
                .values
                .iter()
                .sorted_by_key(|(_, info)| info.value)
                .map(|(name, info)| format!("        case {}: return \"{}\";", info.value, name))
                .join("\n");
            format!(
                "    static const char* valueName(long long value)\n    {{\n        \
                 switch (value) {{\n{}\n        default: break;\n        }}\n        \
                 return nullptr;\n    }}",
                entries
            )
        }
        FieldKind::Set(s) => {
            let entries = s
                .bits
                .iter()
                .sorted_by_key(|(_, bit)| bit.idx)
                .map(|(name, bit)| format!("        case {}: return \"{}\";", bit.idx, name))
                .join("\n");
            format!(
                "    static const char* bitName(unsigned idx)\n    {{\n        \
                 switch (idx) {{\n{}\n        default: break;\n        }}\n        \
                 return nullptr;\n    }}",
                entries
            )
        }
        _ => unreachable!("common header emitted only for enum/set"),
    };

    const TEMPL: &str = "\
#^#GENERATED#$#
#pragma once

#^#BEG_NAMESPACE#$#
/// @brief Common types and functions of the #^#NAME#$# field.
struct #^#CLASS_NAME#$#Common
{
#^#TABLE#$#
};

#^#END_NAMESPACE#$#";

    let mut repl = ReplacementMap::new();
    repl.insert("GENERATED", generator.generated_comment());
    repl.insert("BEG_NAMESPACE", begin_ns);
    repl.insert("END_NAMESPACE", end_ns);
    repl.insert("NAME", field.name().to_string());
    repl.insert("CLASS_NAME", class_name);
    repl.insert("TABLE", table);

    generator.output().write(out_path, &template::process_template(TEMPL, &repl))
}

pub(crate) struct FieldSnippet {
    pub decl: String,
    pub includes: Vec<String>,
}

fn endian_option(endian: Endian) -> &'static str {
    match endian {
        Endian::Big => "wirekit::option::BigEndian",
        Endian::Little => "wirekit::option::LittleEndian",
    }
}

fn int_cpp_type(type_: IntType) -> &'static str {
    match type_ {
        IntType::Int8 => "std::int8_t",
        IntType::Uint8 => "std::uint8_t",
        IntType::Int16 => "std::int16_t",
        IntType::Uint16 => "std::uint16_t",
        IntType::Int32 | IntType::Intvar => "std::int32_t",
        IntType::Uint32 | IntType::Uintvar => "std::uint32_t",
        IntType::Int64 => "std::int64_t",
        IntType::Uint64 => "std::uint64_t",
    }
}

fn struct_decl(
    generator: &Generator<'_>,
    field: &Field,
    base_expr: &str,
    extra_members: &str,
    prelude: &str,
) -> String {
    let class_name = generator.class_name(field.name());
    let doc = if field.base.description.is_empty() {
        format!("/// @brief \"{}\" field.", field.name())
    } else {
        format!(
            "/// @brief \"{}\" field.\n/// @details {}",
            field.name(),
            field.base.description
        )
    };

    let mut members = format!(
        "    /// @brief Name of the field.\n    static const char* name()\n    {{\n        \
         return \"{}\";\n    }}",
        field.name()
    );
    if !extra_members.is_empty() {
        members.push_str("\n\n");
        members.push_str(extra_members);
    }

    let mut out = String::new();
    if !prelude.is_empty() {
        out.push_str(prelude);
        out.push_str("\n\n");
    }
    out.push_str(&format!(
        "{}\ntemplate <typename TOpt = wirekit::option::EmptyOption>\nstruct {} : public\n    {}\n{{\n{}\n}};\n",
        doc, class_name, base_expr, members
    ));
    out
}

/// Produces the declaration block and include dependencies of a field.
/// Recursive for composite kinds; member declarations are nested in a
/// `<Name>Members` struct the way generated bundles/bitfields group their
/// contents.
pub(crate) fn field_snippet(generator: &Generator<'_>, field: &Field, ext_ref: &str) -> FieldSnippet {
    let class_name = generator.class_name(field.name());
    let mut includes: Vec<String> = Vec::new();

    let snippet = match &field.kind {
        FieldKind::Int(int) => {
            template::merge_include("<cstdint>", &mut includes);
            template::merge_include("<wirekit/field/IntValue.h>", &mut includes);
            let mut opts = vec![endian_option(int.endian).to_string()];
            if int.type_.is_var() {
                opts.push(format!("wirekit::option::VarLength<1, {}>", int.length));
            } else {
                opts.push(format!("wirekit::option::FixedLength<{}>", int.length));
            }
            if int.bit_length != 0 {
                opts.push(format!("wirekit::option::FixedBitLength<{}>", int.bit_length));
            }
            if int.default_value != 0 {
                opts.push(format!(
                    "wirekit::option::DefaultNumValue<{}>",
                    int.default_value
                ));
            }
            if int.ser_offset != 0 {
                opts.push(format!(
                    "wirekit::option::NumValueSerOffset<{}>",
                    int.ser_offset
                ));
            }
            if int.scaling != (1, 1) {
                opts.push(format!(
                    "wirekit::option::ScalingRatio<{}, {}>",
                    int.scaling.0, int.scaling.1
                ));
            }
            for range in &int.valid_ranges {
                opts.push(format!(
                    "wirekit::option::ValidNumValueRange<{}, {}>",
                    range.min, range.max
                ));
            }

            let base = format!(
                "wirekit::field::IntValue<\n        TOpt,\n        {},\n        {}\n    >",
                int_cpp_type(int.type_),
                opts.join(",\n        ")
            );

            let mut extra = String::new();
            if !int.specials.is_empty() {
                let specials = int
                    .specials
                    .iter()
                    .map(|(name, special)| {
                        format!(
                            "    /// @brief Special value \"{}\".\n    static constexpr \
                             {} value{}()\n    {{\n        return {};\n    }}",
                            name,
                            int_cpp_type(int.type_),
                            generator.class_name(name),
                            special.value
                        )
                    })
                    .join("\n\n");
                extra.push_str(&specials);
            }

            struct_decl(generator, field, &base, &extra, "")
        }
        FieldKind::Float(float) => {
            template::merge_include("<wirekit/field/FpValue.h>", &mut includes);
            let cpp_type = match float.length {
                4 => "float",
                _ => "double",
            };

            let mut opts = vec![endian_option(float.endian).to_string()];
            if float.default_value != 0.0 {
                opts.push(format!(
                    "wirekit::option::DefaultFpValue<{}>",
                    fp_literal(float.default_value)
                ));
            }

            let base = format!(
                "wirekit::field::FpValue<\n        TOpt,\n        {},\n        {}\n    >",
                cpp_type,
                opts.join(",\n        ")
            );

            let mut extra = String::new();
            if !float.valid_ranges.is_empty() {
                let checks = float
                    .valid_ranges
                    .iter()
                    .map(|r| {
                        format!(
                            "            ({} <= val) && (val <= {})",
                            fp_literal(r.min),
                            fp_literal(r.max)
                        )
                    })
                    .join(" ||\n");
                extra.push_str(&format!(
                    "    /// @brief Validity check against the defined ranges.\n    static bool \
                     validValue({} val)\n    {{\n        return\n{};\n    }}",
                    cpp_type, checks
                ));
            }

            struct_decl(generator, field, &base, &extra, "")
        }
        FieldKind::Enum(e) => {
            template::merge_include("<cstdint>", &mut includes);
            template::merge_include("<wirekit/field/EnumValue.h>", &mut includes);
            template::merge_include(
                &generator.header_for(&format!("{}Common", ext_ref), "field"),
                &mut includes,
            );

            let value_type = format!("{}Val", class_name);
            let format_value = |v: i64| {
                if e.hex_assign {
                    format!("0x{:X}", v)
                } else {
                    v.to_string()
                }
            };
            let entries = e
                .values
                .iter()
                .sorted_by_key(|(_, info)| info.value)
                .map(|(name, info)| format!("    {} = {},", name, format_value(info.value)))
                .join("\n");
            let prelude = format!(
                "/// @brief Values enumerator for the \"{}\" field.\nenum class {} : {}\n{{\n{}\n}};",
                field.name(),
                value_type,
                int_cpp_type(e.type_),
                entries
            );

            let mut opts = vec![endian_option(e.endian).to_string()];
            opts.push(format!("wirekit::option::FixedLength<{}>", e.length));
            if e.bit_length != 0 {
                opts.push(format!("wirekit::option::FixedBitLength<{}>", e.bit_length));
            }
            if e.default_value != 0 {
                opts.push(format!(
                    "wirekit::option::DefaultNumValue<{}>",
                    e.default_value
                ));
            }

            let base = format!(
                "wirekit::field::EnumValue<\n        TOpt,\n        {},\n        {}\n    >",
                value_type,
                opts.join(",\n        ")
            );

            let extra = format!(
                "    /// @brief Retrieve name of the enum value.\n    static const char* \
                 valueName({} value)\n    {{\n        return {}Common::valueName(\
                 static_cast<long long>(value));\n    }}",
                value_type, class_name
            );

            struct_decl(generator, field, &base, &extra, &prelude)
        }
        FieldKind::Set(s) => {
            template::merge_include("<wirekit/field/BitmaskValue.h>", &mut includes);
            template::merge_include(
                &generator.header_for(&format!("{}Common", ext_ref), "field"),
                &mut includes,
            );

            let total_bits = if s.bit_length != 0 {
                s.bit_length
            } else {
                s.length * 8
            };
            let reserved_mask: u64 = {
                let mut used: u64 = 0;
                for bit in s.bits.values() {
                    used |= 1u64 << bit.idx;
                }
                let all = if total_bits == 64 {
                    u64::MAX
                } else {
                    (1u64 << total_bits) - 1
                };
                all & !used
            };

            let mut opts = vec![endian_option(s.endian).to_string()];
            opts.push(format!("wirekit::option::FixedLength<{}>", s.length));
            if s.bit_length != 0 {
                opts.push(format!("wirekit::option::FixedBitLength<{}>", s.bit_length));
            }
            if reserved_mask != 0 {
                opts.push(format!(
                    "wirekit::option::BitmaskReservedBits<0x{:X}ULL, 0x{:X}ULL>",
                    reserved_mask,
                    if s.reserved_bit_value { reserved_mask } else { 0 }
                ));
            }

            let base = format!(
                "wirekit::field::BitmaskValue<\n        TOpt,\n        {}\n    >",
                opts.join(",\n        ")
            );

            let indices = s
                .bits
                .iter()
                .sorted_by_key(|(_, bit)| bit.idx)
                .map(|(name, bit)| format!("        BitIdx_{} = {},", name, bit.idx))
                .join("\n");
            let extra = format!(
                "    /// @brief Provide names and convenience access for the bits.\n    enum \
                 BitIdx : unsigned\n    {{\n{}\n        BitIdx_numOfValues\n    }};\n\n    \
                 /// @brief Retrieve name of the bit.\n    static const char* bitName(unsigned \
                 idx)\n    {{\n        return {}Common::bitName(idx);\n    }}",
                indices, class_name
            );

            struct_decl(generator, field, &base, &extra, "")
        }
        _ => return composite_snippet(generator, field, ext_ref, includes),
    };

    FieldSnippet {
        decl: snippet,
        includes,
    }
}

fn fp_literal(v: f64) -> String {
    if v.is_nan() {
        "std::numeric_limits<double>::quiet_NaN()".to_string()
    } else if v == f64::INFINITY {
        "std::numeric_limits<double>::infinity()".to_string()
    } else if v == f64::NEG_INFINITY {
        "-std::numeric_limits<double>::infinity()".to_string()
    } else {
        format!("{:?}", v)
    }
}

/// Renders a condition tree back to its schema notation for generated
/// documentation of optional fields.
pub(crate) fn cond_text(cond: &OptCond) -> String {
    match cond {
        OptCond::Expr(expr) => {
            if expr.left.is_empty() {
                if expr.op == "!" {
                    format!("!{}", expr.right)
                } else {
                    expr.right.clone()
                }
            } else {
                format!("{} {} {}", expr.left, expr.op, expr.right)
            }
        }
        OptCond::And(conds) => {
            let inner = conds.iter().map(cond_text).join(" AND ");
            format!("({})", inner)
        }
        OptCond::Or(conds) => {
            let inner = conds.iter().map(cond_text).join(" OR ");
            format!("({})", inner)
        }
    }
}

fn members_struct(
    generator: &Generator<'_>,
    field: &Field,
    members: &[Field],
    ext_ref: &str,
    includes: &mut Vec<String>,
) -> (String, String) {
    let class_name = generator.class_name(field.name());
    let mut decls = Vec::new();
    let mut names = Vec::new();
    for member in members {
        let member_ref = format!("{}.{}", ext_ref, member.name());
        let snippet = field_snippet(generator, member, &member_ref);
        for include in snippet.includes {
            template::merge_include(&include, includes);
        }
        decls.push(template::indent(&snippet.decl, 4));
        names.push(format!("{}<TOpt>", generator.class_name(member.name())));
    }

    let prelude = format!(
        "/// @brief Scope for all the member fields of the \"{}\" field.\ntemplate <typename \
         TOpt = wirekit::option::EmptyOption>\nstruct {}Members\n{{\n{}\n\n    /// @brief All \
         members bundled in @b std::tuple.\n    using All = std::tuple<\n        {}\n    >;\n}};",
        field.name(),
        class_name,
        decls.join("\n\n"),
        names.join(",\n        ")
    );

    (prelude, format!("typename {}Members<TOpt>::All", class_name))
}

fn prefix_option(
    generator: &Generator<'_>,
    prefix: &Option<Prefix>,
    option: &str,
    ext_ref: &str,
    prop: &str,
    opts: &mut Vec<String>,
    prelude: &mut String,
    includes: &mut Vec<String>,
) {
    match prefix {
        None => {}
        Some(Prefix::Field(prefix_field)) => {
            let prefix_ref = format!("{}{}", ext_ref, generator.class_name(prop));
            let snippet = field_snippet(generator, prefix_field, &prefix_ref);
            for include in snippet.includes {
                template::merge_include(&include, includes);
            }
            if !prelude.is_empty() {
                prelude.push_str("\n\n");
            }
            prelude.push_str(&snippet.decl);
            opts.push(format!(
                "wirekit::option::{}<{}<TOpt>>",
                option,
                generator.class_name(prefix_field.name())
            ));
        }
        Some(Prefix::Detached(name)) => {
            // Detached prefixes are wired up by the containing message's
            // generated read/refresh.
            opts.push(format!(
                "wirekit::option::DetachedPrefixFieldName<Field_{}>",
                name
            ));
        }
    }
}

fn composite_snippet(
    generator: &Generator<'_>,
    field: &Field,
    ext_ref: &str,
    mut includes: Vec<String>,
) -> FieldSnippet {
    let class_name = generator.class_name(field.name());

    let decl = match &field.kind {
        FieldKind::Bitfield(bitfield) => {
            template::merge_include("<wirekit/field/Bitfield.h>", &mut includes);
            let (prelude, members_expr) =
                members_struct(generator, field, &bitfield.members, ext_ref, &mut includes);
            let base = format!(
                "wirekit::field::Bitfield<\n        TOpt,\n        {},\n        {}\n    >",
                members_expr,
                endian_option(bitfield.endian)
            );
            struct_decl(generator, field, &base, "", &prelude)
        }
        FieldKind::Bundle(bundle) => {
            template::merge_include("<wirekit/field/Bundle.h>", &mut includes);
            let (prelude, members_expr) =
                members_struct(generator, field, &bundle.members, ext_ref, &mut includes);
            let base = format!(
                "wirekit::field::Bundle<\n        TOpt,\n        {}\n    >",
                members_expr
            );

            let extra = bundle
                .aliases
                .iter()
                .map(|alias| {
                    format!(
                        "    /// @brief Alias \"{}\" to the member field \"{}\".\n    \
                         WIREKIT_FIELD_ALIAS({}, {});",
                        alias.name,
                        alias.field_name,
                        alias.name,
                        alias.field_name.replace('.', ", ")
                    )
                })
                .join("\n\n");

            struct_decl(generator, field, &base, &extra, &prelude)
        }
        FieldKind::Str(string) => {
            template::merge_include("<wirekit/field/String.h>", &mut includes);
            let mut opts = Vec::new();
            let mut prelude = String::new();
            if string.length != 0 {
                opts.push(format!(
                    "wirekit::option::SequenceFixedSize<{}>",
                    string.length
                ));
            }
            if string.zero_term {
                opts.push("wirekit::option::SequenceTerminationFieldSuffix<ZeroTerm>".to_string());
                prelude.push_str(
                    "/// @brief Zero termination suffix of the string.\nusing ZeroTerm = \
                     wirekit::field::IntValue<wirekit::option::EmptyOption, std::uint8_t>;",
                );
                template::merge_include("<cstdint>", &mut includes);
                template::merge_include("<wirekit/field/IntValue.h>", &mut includes);
            }
            prefix_option(
                generator,
                &string.prefix,
                "SequenceSerLengthFieldPrefix",
                ext_ref,
                "lengthPrefix",
                &mut opts,
                &mut prelude,
                &mut includes,
            );
            if !string.default_value.is_empty() {
                opts.push(format!(
                    "wirekit::option::DefaultStringValue<\"{}\">",
                    string.default_value
                ));
            }

            let base = if opts.is_empty() {
                "wirekit::field::String<TOpt>".to_string()
            } else {
                format!(
                    "wirekit::field::String<\n        TOpt,\n        {}\n    >",
                    opts.join(",\n        ")
                )
            };
            struct_decl(generator, field, &base, "", &prelude)
        }
        FieldKind::Data(data) => {
            template::merge_include("<wirekit/field/RawData.h>", &mut includes);
            let mut opts = Vec::new();
            let mut prelude = String::new();
            if data.length != 0 {
                opts.push(format!("wirekit::option::SequenceFixedSize<{}>", data.length));
            }
            prefix_option(
                generator,
                &data.prefix,
                "SequenceSerLengthFieldPrefix",
                ext_ref,
                "lengthPrefix",
                &mut opts,
                &mut prelude,
                &mut includes,
            );

            let base = if opts.is_empty() {
                "wirekit::field::RawData<TOpt>".to_string()
            } else {
                format!(
                    "wirekit::field::RawData<\n        TOpt,\n        {}\n    >",
                    opts.join(",\n        ")
                )
            };

            let mut extra = String::new();
            if !data.default_value.is_empty() {
                let bytes = data
                    .default_value
                    .iter()
                    .map(|b| format!("0x{:02X}", b))
                    .join(", ");
                extra.push_str(&format!(
                    "    /// @brief Default serialized bytes.\n    static const \
                     std::uint8_t* defaultBytes(std::size_t& size)\n    {{\n        static \
                     const std::uint8_t Bytes[] = {{{}}};\n        size = \
                     std::extent<decltype(Bytes)>::value;\n        return Bytes;\n    }}",
                    bytes
                ));
                template::merge_include("<cstdint>", &mut includes);
                template::merge_include("<type_traits>", &mut includes);
            }
            struct_decl(generator, field, &base, &extra, &prelude)
        }
        FieldKind::List(list) => {
            template::merge_include("<wirekit/field/ArrayList.h>", &mut includes);
            let mut prelude = String::new();
            let mut opts = Vec::new();

            let elem_ref = format!("{}.{}", ext_ref, list.element.name());
            let elem_snippet = field_snippet(generator, &list.element, &elem_ref);
            for include in elem_snippet.includes {
                template::merge_include(&include, &mut includes);
            }
            prelude.push_str(&elem_snippet.decl);
            let elem_name = format!("{}<TOpt>", generator.class_name(list.element.name()));

            if list.count != 0 {
                opts.push(format!("wirekit::option::SequenceFixedSize<{}>", list.count));
            }
            prefix_option(
                generator,
                &list.count_prefix,
                "SequenceSizeFieldPrefix",
                ext_ref,
                "countPrefix",
                &mut opts,
                &mut prelude,
                &mut includes,
            );
            prefix_option(
                generator,
                &list.length_prefix,
                "SequenceSerLengthFieldPrefix",
                ext_ref,
                "lengthPrefix",
                &mut opts,
                &mut prelude,
                &mut includes,
            );
            let elem_length_option = if list.elem_fixed_length {
                "SequenceElemFixedSerLengthFieldPrefix"
            } else {
                "SequenceElemSerLengthFieldPrefix"
            };
            prefix_option(
                generator,
                &list.elem_length_prefix,
                elem_length_option,
                ext_ref,
                "elemLengthPrefix",
                &mut opts,
                &mut prelude,
                &mut includes,
            );

            if let Some(term) = &list.term_suffix {
                let term_ref = format!("{}TermSuffix", ext_ref);
                let snippet = field_snippet(generator, term, &term_ref);
                for include in snippet.includes {
                    template::merge_include(&include, &mut includes);
                }
                prelude.push_str("\n\n");
                prelude.push_str(&snippet.decl);
                opts.push(format!(
                    "wirekit::option::SequenceTerminationFieldSuffix<{}<TOpt>>",
                    generator.class_name(term.name())
                ));
            }

            let base = if opts.is_empty() {
                format!(
                    "wirekit::field::ArrayList<\n        TOpt,\n        {}\n    >",
                    elem_name
                )
            } else {
                format!(
                    "wirekit::field::ArrayList<\n        TOpt,\n        {},\n        {}\n    >",
                    elem_name,
                    opts.join(",\n        ")
                )
            };
            struct_decl(generator, field, &base, "", &prelude)
        }
        FieldKind::Ref(reference) => {
            template::merge_include(
                &generator.header_for(&reference.target, "field"),
                &mut includes,
            );
            let target_scope = generator.scope_for(&reference.target, "field");
            let doc = format!(
                "/// @brief \"{}\" field, an alias to @ref {}.",
                field.name(),
                target_scope
            );
            if reference.bit_length != 0 {
                format!(
                    "{}\ntemplate <typename TOpt = wirekit::option::EmptyOption>\nusing {} = \
                     {}<wirekit::option::FixedBitLength<{}>>;\n",
                    doc, class_name, target_scope, reference.bit_length
                )
            } else {
                format!(
                    "{}\ntemplate <typename TOpt = wirekit::option::EmptyOption>\nusing {} = \
                     {}<TOpt>;\n",
                    doc, class_name, target_scope
                )
            }
        }
        FieldKind::Optional(optional) => {
            template::merge_include("<wirekit/field/Optional.h>", &mut includes);
            let inner_ref = format!("{}.{}", ext_ref, optional.field.name());
            let inner_snippet = field_snippet(generator, &optional.field, &inner_ref);
            let mut prelude = String::new();
            for include in inner_snippet.includes {
                template::merge_include(&include, &mut includes);
            }
            prelude.push_str(&inner_snippet.decl);

            let mode_option = match optional.mode {
                OptMode::Tentative => "wirekit::option::TentativeByDefault",
                OptMode::Missing => "wirekit::option::MissingByDefault",
                OptMode::Exists => "wirekit::option::ExistsByDefault",
            };

            let base = format!(
                "wirekit::field::Optional<\n        {}<TOpt>,\n        {}\n    >",
                generator.class_name(optional.field.name()),
                mode_option
            );

            let extra = match &optional.cond {
                Some(cond) => format!(
                    "    /// @brief The field exists when the following condition holds:\n    \
                     /// @code {} @endcode\n    /// The mode is refreshed by the containing \
                     object.",
                    cond_text(cond)
                ),
                None => String::new(),
            };

            struct_decl(generator, field, &base, &extra, &prelude)
        }
        FieldKind::Variant(variant) => {
            template::merge_include("<wirekit/field/Variant.h>", &mut includes);
            let (prelude, members_expr) =
                members_struct(generator, field, &variant.members, ext_ref, &mut includes);
            let mut opts = Vec::new();
            if let Some(idx) = variant.default_member {
                opts.push(format!("wirekit::option::DefaultVariantIndex<{}>", idx));
            }

            let base = if opts.is_empty() {
                format!(
                    "wirekit::field::Variant<\n        TOpt,\n        {}\n    >",
                    members_expr
                )
            } else {
                format!(
                    "wirekit::field::Variant<\n        TOpt,\n        {},\n        {}\n    >",
                    members_expr,
                    opts.join(",\n        ")
                )
            };
            struct_decl(generator, field, &base, "", &prelude)
        }
        _ => unreachable!("scalar kinds handled by the caller"),
    };

    FieldSnippet { decl, includes }
}
