//! build-settings CLI
//!
//! Resolves the layered build settings of a project and prints them, so the
//! packaging steps (freezing, installers, signing) can be checked in isolation.

use anyhow::{Context, Result};
use build_settings::cli::{Cli, Command};
use build_settings::config::EngineOptions;
use build_settings::config::profiles::settings_files;
use build_settings::format::{OutputFormat, format_settings, format_value};
use build_settings::logging::{self, LogTarget};
use build_settings::platform::{Platform, PlatformName};
use build_settings::settings::Settings;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

fn resolve_platform(cli: &Cli) -> Result<Platform> {
    let mut platform = match &cli.platform {
        Some(name) => Platform::new(name.parse::<PlatformName>()?),
        None => Platform::detect()?,
    };
    if let Some(distribution) = &cli.distribution {
        platform = platform.with_distribution(distribution.clone());
    }
    Ok(platform)
}

/// Bundled defaults live next to the executable unless given explicitly.
fn defaults_root(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.defaults {
        return Ok(dir.clone());
    }
    let exe = std::env::current_exe().context("Cannot locate the executable")?;
    Ok(exe
        .parent()
        .map(|dir| dir.join("defaults"))
        .unwrap_or_else(|| PathBuf::from("defaults")))
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let options = EngineOptions::load_or_default(cli.options.as_deref())
        .context("Failed to load engine options")?;
    let platform = resolve_platform(cli)?;
    debug!(platform = %platform.name, profiles = ?platform.default_profiles(), "Resolved platform");

    let mut settings = Settings::new(defaults_root(cli)?, options);
    settings.init_for_platform(&cli.project, &platform)?;
    for profile in &cli.profiles {
        settings.activate_profile(profile)?;
    }
    Ok(settings)
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;

    match &cli.command {
        Command::Show { format } => {
            println!(
                "{}",
                format_settings(settings.values(), OutputFormat::from(*format))?
            );
        }
        Command::Get { key, format } => {
            let value = settings.get(key)?;
            println!("{}", format_value(value, OutputFormat::from(*format))?);
        }
        Command::Path { expr } => {
            println!("{}", settings.project_path(expr)?.display());
        }
        Command::Profiles => {
            let roots = settings.settings_roots()?;
            for profile in settings.loaded_profiles() {
                println!("{profile}");
                for file in settings_files(&[profile], &roots) {
                    println!("  {} ({})", file.path.display(), file.origin);
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&LogTarget::parse(&cli.log), cli.verbose) {
        eprintln!("Warning: could not initialize logging: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
