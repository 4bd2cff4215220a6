//! Template substitution and include merging used by every emitter.
//!
//! Templates are flat text with `#^#KEY#$#` placeholders; a missing key
//! substitutes the empty string. Nested substitution is intentionally not
//! supported.

use std::collections::BTreeMap;

pub type ReplacementMap = BTreeMap<&'static str, String>;

const PREFIX: &str = "#^#";
const SUFFIX: &str = "#$#";

/// Replaces every `#^#KEY#$#` placeholder with its mapped value.
pub fn process_template(templ: &str, replacements: &ReplacementMap) -> String {
    let mut result = String::with_capacity(templ.len());
    let mut rest = templ;

    while let Some(start) = rest.find(PREFIX) {
        result.push_str(&rest[..start]);
        let after_prefix = &rest[start + PREFIX.len()..];
        let Some(end) = after_prefix.find(SUFFIX) else {
            // Unterminated placeholder, keep the text as-is.
            result.push_str(&rest[start..]);
            return result;
        };

        let key = &after_prefix[..end];
        if let Some(value) = replacements.get(key) {
            result.push_str(value);
        }
        rest = &after_prefix[end + SUFFIX.len()..];
    }

    result.push_str(rest);
    result
}

/// Adds an include spec (`<header>` or `"header"`; a bare name means a
/// quoted include) to the list, keeping it free of duplicates.
pub fn merge_include(include: &str, list: &mut Vec<String>) {
    let normalised = if include.starts_with('<') || include.starts_with('"') {
        include.to_string()
    } else {
        format!("\"{}\"", include)
    };

    if !list.contains(&normalised) {
        list.push(normalised);
    }
}

/// Renders the include list as `#include` statements: system includes
/// first, each group sorted, duplicates (case-sensitive) removed.
pub fn includes_to_statements(includes: &[String]) -> String {
    let mut system: Vec<&String> = includes.iter().filter(|i| i.starts_with('<')).collect();
    let mut local: Vec<&String> = includes.iter().filter(|i| !i.starts_with('<')).collect();
    system.sort();
    system.dedup();
    local.sort();
    local.dedup();

    let mut result = String::new();
    for inc in &system {
        result.push_str("#include ");
        result.push_str(inc);
        result.push('\n');
    }
    if !system.is_empty() && !local.is_empty() {
        result.push('\n');
    }
    for inc in &local {
        result.push_str("#include ");
        result.push_str(inc);
        result.push('\n');
    }
    result
}

/// Joins list elements with the given separator.
pub fn list_to_string(list: &[String], sep: &str) -> String {
    list.join(sep)
}

/// Indents every non-empty line by `spaces` spaces.
pub fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn repl(pairs: &[(&'static str, &str)]) -> ReplacementMap {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn substitutes_known_keys_and_erases_unknown() {
        let out = process_template(
            "class #^#NAME#$# : #^#BASE#$# {};",
            &repl(&[("NAME", "Msg1")]),
        );
        assert_eq!("class Msg1 :  {};", out);
    }

    #[test]
    fn unterminated_placeholder_is_preserved() {
        let out = process_template("x #^#NAME", &repl(&[("NAME", "y")]));
        assert_eq!("x #^#NAME", out);
    }

    #[test]
    fn includes_sort_angle_first() {
        let mut list = Vec::new();
        merge_include("demo/field/F1.h", &mut list);
        merge_include("<tuple>", &mut list);
        merge_include("<cstdint>", &mut list);
        merge_include("demo/field/F1.h", &mut list);

        let out = includes_to_statements(&list);
        assert_eq!(
            "#include <cstdint>\n#include <tuple>\n\n#include \"demo/field/F1.h\"\n",
            out
        );
    }

    #[test]
    fn include_dedup_is_case_sensitive() {
        let mut list = Vec::new();
        merge_include("<Header>", &mut list);
        merge_include("<header>", &mut list);
        assert_eq!(2, list.len());
    }
}
