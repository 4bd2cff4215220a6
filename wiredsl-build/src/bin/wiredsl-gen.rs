//! Command line front-end of the wiredsl protocol code generator.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use wiredsl_build::{Config, CustomizationLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LevelArg {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<LevelArg> for wiredsl::Level {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Debug => wiredsl::Level::Debug,
            LevelArg::Info => wiredsl::Level::Info,
            LevelArg::Warning => wiredsl::Level::Warning,
            LevelArg::Error => wiredsl::Level::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CustomizationArg {
    Full,
    Limited,
    None,
}

impl From<CustomizationArg> for CustomizationLevel {
    fn from(level: CustomizationArg) -> Self {
        match level {
            CustomizationArg::Full => CustomizationLevel::Full,
            CustomizationArg::Limited => CustomizationLevel::Limited,
            CustomizationArg::None => CustomizationLevel::None,
        }
    }
}

/// Compiles wiredsl schema files into a generated protocol definition.
#[derive(Debug, Parser)]
#[command(name = "wiredsl-gen", version, about)]
struct Args {
    /// Schema file(s) to compile, in processing order.
    #[arg(short = 'i', long = "input-file", value_name = "FILE")]
    input_files: Vec<PathBuf>,

    /// Schema files given as free arguments.
    #[arg(value_name = "FILE")]
    extra_files: Vec<PathBuf>,

    /// Directory the generated tree is written to.
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// Directory with custom-code injection files.
    #[arg(long = "input-dir")]
    input_dir: Option<PathBuf>,

    /// Common prefix stripped from reported schema paths.
    #[arg(long = "input-files-prefix", default_value = "")]
    input_files_prefix: String,

    /// Override the main namespace of the generated code.
    #[arg(short = 'n', long = "namespace-override")]
    namespace_override: Option<String>,

    /// Level of the generated customisation hooks.
    #[arg(long = "customization-level", value_enum, default_value = "limited")]
    customization_level: CustomizationArg,

    /// Semantic version of the generated protocol library.
    #[arg(short = 'V', long = "protocol-version", default_value = "")]
    protocol_version: String,

    /// Force an extra main-namespace wrapper in the option sets.
    #[arg(long = "force-main-namespace-in-options", default_value_t = false)]
    force_main_namespace_in_options: bool,

    /// Extra `Name=Msg1,Msg2,…` message bundle aggregates.
    #[arg(long = "extra-input-bundle", value_name = "SPEC")]
    extra_input_bundles: Vec<String>,

    /// Minimal level of the reported diagnostics.
    #[arg(long = "min-output-level", value_enum, default_value = "info")]
    min_output_level: LevelArg,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match std::panic::catch_unwind(|| run(args)) {
        Ok(code) => code,
        Err(_) => {
            eprintln!("[ERROR]: Internal error, please report.");
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> ExitCode {
    let mut schemas = args.input_files.clone();
    schemas.extend(args.extra_files.clone());
    if schemas.is_empty() {
        eprintln!("[ERROR]: No schema files provided.");
        return ExitCode::from(1);
    }

    let mut config = Config::new();
    config
        .output_dir(&args.output_dir)
        .input_files_prefix(&args.input_files_prefix)
        .customization_level(args.customization_level.into())
        .protocol_version(&args.protocol_version)
        .force_main_namespace_in_options(args.force_main_namespace_in_options)
        .min_output_level(args.min_output_level.into());
    if let Some(dir) = &args.input_dir {
        config.input_dir(dir);
    }
    if let Some(ns) = &args.namespace_override {
        config.namespace_override(ns);
    }
    for bundle in &args.extra_input_bundles {
        config.extra_input_bundle(bundle);
    }

    match config.compile_schemas(&schemas) {
        Ok(()) => ExitCode::SUCCESS,
        // Diagnostics have already been printed through the sink; every
        // reported kind is a user error.
        Err(_) => ExitCode::from(1),
    }
}
