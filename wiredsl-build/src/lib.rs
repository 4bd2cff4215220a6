#![doc(html_root_url = "https://docs.rs/wiredsl-build/0.4.0")]

//! `wiredsl-build` compiles wiredsl schema files into a generated protocol
//! definition tree.
//!
//! The heavy lifting (parsing, validation, IR construction) lives in the
//! [`wiredsl`] crate; this crate walks the validated IR and emits one header
//! per field/message/interface/frame plus the project-level artifacts
//! (message aggregates, option sets, dispatch tables, message factory and
//! the build manifest). Generated code targets the fixed `wirekit` runtime
//! library.
//!
//! ## Example
//!
//! ```no_run
//! fn main() {
//!     wiredsl_build::Config::new()
//!         .output_dir("out")
//!         .compile_schemas(&["schema/protocol.xml"])
//!         .unwrap();
//! }
//! ```

mod custom;
mod emit;
mod generator;
mod output;
mod template;

use std::path::{Path, PathBuf};

use wiredsl::{Error, ErrorKind, Level, Logger, Protocol, Result};

pub use custom::{CustomCode, CustomOp};
pub use generator::{CustomizationLevel, Generator, MIN_WIREKIT_VERSION};

/// Configuration options for protocol code generation.
///
/// The builder mirrors the command-line surface of `wiredsl-gen`; every
/// option has a default.
pub struct Config {
    output_dir: Option<PathBuf>,
    input_dir: Option<PathBuf>,
    input_files_prefix: String,
    namespace_override: Option<String>,
    customization: CustomizationLevel,
    protocol_version: String,
    force_main_ns_in_options: bool,
    extra_input_bundles: Vec<String>,
    min_output_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output_dir: None,
            input_dir: None,
            input_files_prefix: String::new(),
            namespace_override: None,
            customization: CustomizationLevel::default(),
            protocol_version: String::new(),
            force_main_ns_in_options: false,
            extra_input_bundles: Vec::new(),
            min_output_level: Level::Info,
        }
    }
}

impl Config {
    /// Creates a new code generator configuration with default options.
    pub fn new() -> Config {
        Config::default()
    }

    /// Directory the generated tree is written to. Defaults to the current
    /// directory.
    pub fn output_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.output_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Root of the customisation input tree with per-entity override files.
    pub fn input_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.input_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Common prefix stripped from schema paths in diagnostics.
    pub fn input_files_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.input_files_prefix = prefix.into();
        self
    }

    /// Overrides the main namespace (defaults to the schema name).
    pub fn namespace_override(&mut self, ns: impl Into<String>) -> &mut Self {
        self.namespace_override = Some(ns.into());
        self
    }

    /// How many customisation hooks the generated classes expose.
    pub fn customization_level(&mut self, level: CustomizationLevel) -> &mut Self {
        self.customization = level;
        self
    }

    /// Semantic version stamped into the generated `Version.h`.
    pub fn protocol_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.protocol_version = version.into();
        self
    }

    /// Wraps the option sets in an extra main-namespace struct.
    pub fn force_main_namespace_in_options(&mut self, force: bool) -> &mut Self {
        self.force_main_ns_in_options = force;
        self
    }

    /// Adds an extra `Name=Msg1,Msg2,…` message bundle aggregate.
    pub fn extra_input_bundle(&mut self, bundle: impl Into<String>) -> &mut Self {
        self.extra_input_bundles.push(bundle.into());
        self
    }

    /// Minimal diagnostics level forwarded to the sink.
    pub fn min_output_level(&mut self, level: Level) -> &mut Self {
        self.min_output_level = level;
        self
    }

    /// Parses and validates the schema files, then generates the protocol
    /// definition tree. No output is written when validation fails.
    pub fn compile_schemas<P: AsRef<Path>>(&self, schemas: &[P]) -> Result<()> {
        if schemas.is_empty() {
            return Err(Error::new(
                ErrorKind::SchemaRule,
                "At least one schema file must be provided",
            ));
        }

        let mut protocol = self.new_protocol();
        for schema in schemas {
            protocol.parse_file(schema.as_ref())?;
        }
        protocol.validate()?;
        self.generate(&protocol)
    }

    /// Generates from an already validated protocol; exposed for callers
    /// (and tests) that build the IR from in-memory schema text.
    pub fn generate(&self, protocol: &Protocol) -> Result<()> {
        if !protocol.is_validated() {
            return Err(Error::new(
                ErrorKind::SchemaRule,
                "The protocol must be validated before generation",
            ));
        }

        let generator = Generator::new(
            protocol,
            self.output_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            self.input_dir.clone(),
            self.namespace_override.clone(),
            self.customization,
            self.protocol_version.clone(),
            self.force_main_ns_in_options,
            self.extra_input_bundles.clone(),
        );
        emit::write_all(&generator)
    }

    /// A protocol pre-configured with this config's diagnostics settings.
    pub fn new_protocol(&self) -> Protocol {
        let prefix = self.input_files_prefix.clone();
        let logger = Logger::new(Box::new(move |level, msg| {
            let msg = msg.strip_prefix(prefix.as_str()).unwrap_or(msg);
            let msg = msg.strip_prefix('/').unwrap_or(msg);
            eprintln!("[{}]: {}", level, msg);
        }));
        logger.set_min_level(self.min_output_level);
        Protocol::with_logger(logger)
    }
}

/// Compiles wiredsl schema files with default options.
pub fn compile_schemas<P: AsRef<Path>>(schemas: &[P], output_dir: impl AsRef<Path>) -> Result<()> {
    Config::new()
        .output_dir(output_dir)
        .compile_schemas(schemas)
}
