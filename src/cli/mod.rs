//! CLI command definitions for build-settings
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for printed settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Json,
    Yaml,
    Markdown,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => OutputFormat::Json,
            Format::Yaml => OutputFormat::Yaml,
            Format::Markdown => OutputFormat::Markdown,
        }
    }
}

/// Inspect resolved build settings for a desktop application project
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project directory (default: current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Directory with the bundled default settings
    #[arg(long, global = true, env = "BUILD_SETTINGS_DEFAULTS")]
    pub defaults: Option<PathBuf>,

    /// Extra profile to activate after the platform defaults (repeatable)
    #[arg(long = "profile", global = true, value_name = "NAME")]
    pub profiles: Vec<String>,

    /// Platform whose default profiles are used: windows, mac or linux
    #[arg(long, global = true)]
    pub platform: Option<String>,

    /// Linux distribution name, used with --platform linux
    #[arg(long, global = true)]
    pub distribution: Option<String>,

    /// Path to an engine options YAML file
    #[arg(long, global = true)]
    pub options: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the fully resolved settings
    Show {
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Print a single setting
    Get {
        /// Setting key
        key: String,

        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Resolve a forward-slash path expression against the project
    Path {
        /// Expression such as `${freeze_dir}/Contents`
        expr: String,
    },

    /// List the active profiles and the settings files they loaded
    Profiles,
}
