//! Error types for settings resolution.
//!
//! Every variant is a user-facing configuration error. Messages name the
//! offending file or key so the CLI can print them without a backtrace.

use serde_json::Value;
use std::path::PathBuf;

/// Errors raised while loading, merging, expanding or resolving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A settings file could not be read or is not a valid JSON object.
    #[error("Could not load settings file {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// Two configuration trees have incompatible shapes.
    #[error("Cannot merge {base} and {overlay}")]
    MergeType { base: Value, overlay: Value },

    /// Placeholder expansion did not reach a fixed point.
    #[error("Circular placeholder reference: {} (after {passes} passes)", chain.join(" -> "))]
    PlaceholderCycle { chain: Vec<String>, passes: usize },

    /// A required setting was never defined.
    #[error("Setting not found: {0}")]
    SettingNotFound(String),

    /// A setting exists but holds a different kind of value.
    #[error("Setting {key} must be {expected}, got {found}")]
    SettingType {
        key: String,
        expected: &'static str,
        found: Value,
    },

    /// Path or settings resolution was attempted before `init`.
    #[error("Cannot resolve project paths until the settings have been initialized")]
    ProjectNotInitialized,

    /// The user path-override file is malformed.
    #[error("Invalid path overrides in {}: {message}", path.display())]
    InvalidPathOverrides { path: PathBuf, message: String },

    /// A version string or `attr:` reference could not be parsed.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// The isolated evaluator failed to produce a value.
    #[error("Evaluation of {target} failed: {message}")]
    Evaluator { target: String, message: String },

    /// The host operating system is not one of Windows, Mac or Linux.
    #[error("Unknown operating system: {0}")]
    UnknownPlatform(String),

    /// An icon file name does not follow the `<size>[@<scale>x]` convention.
    #[error("Invalid icon name: {}", .0.display())]
    InvalidIconName(PathBuf),

    /// Filesystem error outside of settings file parsing.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SettingsError {
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ConfigParse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
