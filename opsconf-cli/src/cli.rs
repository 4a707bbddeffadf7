//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use opsconf_core::types::Platform;

/// Settings file used when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "opsconf.toml";

/// opsconf -- generate fluent-bit and OpenTelemetry collector configs from one YAML file.
///
/// Use `opsconf <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "opsconf", version, about, long_about = None)]
pub struct Cli {
    /// Path to the opsconf.toml generator settings (defaults apply when the
    /// default file is missing).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Settings path and whether it was given explicitly.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG), false),
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Target platform override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Linux,
    Windows,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Linux => Platform::Linux,
            PlatformArg::Windows => Platform::Windows,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate fluent-bit and collector configs from a unified config.
    Generate(GenerateArgs),

    /// Parse, resolve and validate a unified config without writing anything.
    Validate(ValidateArgs),

    /// List registered component types.
    List(ListArgs),

    /// Split a log file into records with a product's multiline rules.
    Multiline(MultilineArgs),

    /// Normalize severity values through a product's severity table.
    Severity(SeverityArgs),

    /// Manage generator settings.
    Config(ConfigArgs),
}

// ---- generate ----

/// Generate configs from a unified config.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Unified config (YAML).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory to write the generated files into (default: print them).
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Override the target platform from the settings file.
    #[arg(long)]
    pub platform: Option<PlatformArg>,
}

// ---- validate ----

/// Validate a unified config.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Unified config (YAML).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Override the target platform from the settings file.
    #[arg(long)]
    pub platform: Option<PlatformArg>,
}

// ---- list ----

/// Registry selector for `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegistryKind {
    LoggingReceiver,
    LoggingProcessor,
    MetricsReceiver,
    MetricsProcessor,
}

/// List registered component types.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only types available on this platform (default: settings platform).
    #[arg(long)]
    pub platform: Option<PlatformArg>,

    /// Only this registry.
    #[arg(long)]
    pub kind: Option<RegistryKind>,
}

// ---- multiline ----

/// Preview multiline grouping and parsing over a log file.
#[derive(Args, Debug)]
pub struct MultilineArgs {
    /// Logging receiver or processor type (e.g. cassandra_system).
    #[arg(short = 't', long = "type")]
    pub type_id: String,

    /// Log file to read.
    #[arg(short, long)]
    pub file: PathBuf,
}

// ---- severity ----

/// Normalize severity values.
#[derive(Args, Debug)]
pub struct SeverityArgs {
    /// Logging receiver or processor type (e.g. kafka).
    #[arg(short = 't', long = "type")]
    pub type_id: String,

    /// Raw severity values to normalize.
    #[arg(required = true)]
    pub values: Vec<String>,
}

// ---- config ----

/// Manage opsconf generator settings.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the settings file and report errors.
    Validate,
    /// Show the effective settings (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, generator, output).
        #[arg(long)]
        section: Option<String>,
    },
}
