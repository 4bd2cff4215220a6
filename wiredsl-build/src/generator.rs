//! Generator façade shared by all emitters: naming scopes, output paths,
//! version/existence checks and custom-code injection lookup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use heck::ToUpperCamelCase;
use once_cell::sync::Lazy;
use wiredsl::{Interface, Message, Protocol};

use crate::custom::CustomCode;
use crate::output::OutputFs;

/// How many customisation hooks the generated classes expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomizationLevel {
    Full,
    #[default]
    Limited,
    None,
}

/// The minimal version of the `wirekit` runtime library the generated code
/// requires.
pub const MIN_WIREKIT_VERSION: &str = "2.2";

static CPP_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    // Only words that survive the UpperCamelCase conversion can collide.
    ["Export", "Import", "Module", "New", "Operator", "Register", "Template", "This", "Typename"]
        .into_iter()
        .collect()
});

pub struct Generator<'p> {
    protocol: &'p Protocol,
    output: OutputFs,
    custom: CustomCode,
    main_namespace: String,
    customization: CustomizationLevel,
    protocol_version: String,
    force_main_ns_in_options: bool,
    extra_input_bundles: Vec<String>,
}

impl<'p> Generator<'p> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        protocol: &'p Protocol,
        output_dir: PathBuf,
        input_dir: Option<PathBuf>,
        namespace_override: Option<String>,
        customization: CustomizationLevel,
        protocol_version: String,
        force_main_ns_in_options: bool,
        extra_input_bundles: Vec<String>,
    ) -> Generator<'p> {
        let main_namespace =
            namespace_override.unwrap_or_else(|| protocol.schema().name.to_lowercase());
        Generator {
            protocol,
            output: OutputFs::new(output_dir),
            custom: CustomCode::new(input_dir),
            main_namespace,
            customization,
            protocol_version,
            force_main_ns_in_options,
            extra_input_bundles,
        }
    }

    pub fn protocol(&self) -> &'p Protocol {
        self.protocol
    }

    pub fn output(&self) -> &OutputFs {
        &self.output
    }

    pub fn custom(&self) -> &CustomCode {
        &self.custom
    }

    pub fn main_namespace(&self) -> &str {
        &self.main_namespace
    }

    pub fn customization(&self) -> CustomizationLevel {
        self.customization
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn force_main_ns_in_options(&self) -> bool {
        self.force_main_ns_in_options
    }

    pub fn extra_input_bundles(&self) -> &[String] {
        &self.extra_input_bundles
    }

    /// Marker comment placed at the top of every generated file.
    pub fn generated_comment(&self) -> String {
        format!(
            "// Generated by wiredsl-gen, do not modify by hand.\n// Requires the wirekit \
             library, version {} or above.\n",
            MIN_WIREKIT_VERSION
        )
    }

    /// Does the element exist in the generated protocol version?
    pub fn element_exists(&self, since: u32, deprecated: u32, removed: bool) -> bool {
        let version = self.protocol.schema().version;
        if version < since {
            return false;
        }
        if removed && deprecated <= version {
            return false;
        }
        true
    }

    pub fn message_exists(&self, message: &Message) -> bool {
        self.element_exists(
            message.since_version,
            message.deprecated_since,
            message.deprecated_removed,
        )
    }

    /// Class name for a DSL entity name. Names that collide with a reserved
    /// word of the output language get a trailing underscore.
    pub fn class_name(&self, name: &str) -> String {
        let ident = name.to_upper_camel_case();
        if CPP_KEYWORDS.contains(ident.as_str()) {
            format!("{}_", ident)
        } else {
            ident
        }
    }

    /// Splits an external reference (`ns1.ns2.Name`) into the namespace
    /// path and the entity name.
    fn split_ref<'r>(external_ref: &'r str) -> (Vec<&'r str>, &'r str) {
        let mut parts: Vec<&str> = external_ref.split('.').collect();
        let name = parts.pop().unwrap_or_default();
        (parts, name)
    }

    /// C++ scope of an entity: `main::ns1::ns2::<subdir>::Name`.
    pub fn scope_for(&self, external_ref: &str, subdir: &str) -> String {
        let (ns_parts, name) = Self::split_ref(external_ref);
        let mut scope = vec![self.main_namespace.clone()];
        scope.extend(ns_parts.iter().map(|p| p.to_lowercase()));
        if !subdir.is_empty() {
            scope.push(subdir.to_string());
        }
        scope.push(self.class_name(name));
        scope.join("::")
    }

    /// Include-relative header path of an entity:
    /// `main/ns1/ns2/<subdir>/Name.h`.
    pub fn header_for(&self, external_ref: &str, subdir: &str) -> String {
        let (ns_parts, name) = Self::split_ref(external_ref);
        let mut parts = vec![self.main_namespace.clone()];
        parts.extend(ns_parts.iter().map(|p| p.to_lowercase()));
        if !subdir.is_empty() {
            parts.push(subdir.to_string());
        }
        parts.push(format!("{}.h", self.class_name(name)));
        parts.join("/")
    }

    /// Path of the generated header below the output directory.
    pub fn output_path_for(&self, external_ref: &str, subdir: &str) -> PathBuf {
        Path::new("include").join(self.header_for(external_ref, subdir))
    }

    /// Opening and closing namespace text for an entity scope.
    pub fn namespaces_for(&self, ns_parts: &[String], subdir: &str) -> (String, String) {
        let mut names = vec![self.main_namespace.clone()];
        names.extend(ns_parts.iter().map(|p| p.to_lowercase()));
        if !subdir.is_empty() {
            names.push(subdir.to_string());
        }

        let begin = names
            .iter()
            .map(|n| format!("namespace {}\n{{\n", n))
            .collect::<Vec<_>>()
            .join("\n");
        let end = names
            .iter()
            .rev()
            .map(|n| format!("}} // namespace {}\n", n))
            .collect::<Vec<_>>()
            .join("\n");
        (begin, end)
    }

    /// The interface all messages derive from, when the protocol defines
    /// exactly one.
    pub fn default_interface(&self) -> Option<&'p Interface> {
        let interfaces = self.protocol.all_interfaces();
        match interfaces.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }

    /// Extra message bundles requested on the command line, parsed as
    /// `BundleName=Msg1,Msg2,…`.
    pub fn extra_message_bundles(&self) -> Vec<(String, Vec<String>)> {
        self.extra_input_bundles
            .iter()
            .filter_map(|spec| {
                let (name, list) = spec.split_once('=')?;
                let messages = list
                    .split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect();
                Some((name.trim().to_string(), messages))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol() -> Protocol {
        let mut protocol = Protocol::new();
        protocol
            .parse_str(
                "t.xml",
                r#"<schema name="Demo" id="1" version="3">
                       <ns name="sub"><message name="Msg1" id="1"/></ns>
                   </schema>"#,
            )
            .unwrap();
        protocol.validate().unwrap();
        protocol
    }

    fn generator(protocol: &Protocol) -> Generator<'_> {
        Generator::new(
            protocol,
            PathBuf::from("out"),
            None,
            None,
            CustomizationLevel::Limited,
            String::new(),
            false,
            Vec::new(),
        )
    }

    #[test]
    fn scopes_and_headers() {
        let protocol = protocol();
        let generator = generator(&protocol);
        assert_eq!("demo", generator.main_namespace());
        assert_eq!("demo::sub::message::Msg1", generator.scope_for("sub.Msg1", "message"));
        assert_eq!("demo/sub/message/Msg1.h", generator.header_for("sub.Msg1", "message"));
    }

    #[test]
    fn element_existence_follows_versions() {
        let protocol = protocol();
        let generator = generator(&protocol);
        assert!(generator.element_exists(0, wiredsl::NOT_YET_DEPRECATED, false));
        assert!(!generator.element_exists(4, wiredsl::NOT_YET_DEPRECATED, false));
        assert!(!generator.element_exists(0, 2, true));
        assert!(generator.element_exists(0, 2, false));
    }
}
