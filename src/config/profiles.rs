//! Profile file discovery and loading.
//!
//! A profile such as `base`, `mac` or `release` maps to up to two JSON files:
//! one under the bundled defaults root and one under the project root. Files
//! are merged in order, so project values land on top of bundled ones.

use super::merge::deep_merge;
use super::placeholders::rewrite_deferred;
use crate::error::{SettingsError, SettingsResult};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Root a settings file was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettingsOrigin {
    /// Defaults shipped with the build tool (lowest priority)
    Bundled = 0,
    /// The project's own settings
    Project = 1,
}

impl std::fmt::Display for SettingsOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsOrigin::Bundled => write!(f, "bundled"),
            SettingsOrigin::Project => write!(f, "project"),
        }
    }
}

/// A settings file that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFile {
    pub path: PathBuf,
    pub origin: SettingsOrigin,
}

/// Settings directories for each origin.
#[derive(Debug, Clone)]
pub struct SettingsRoots {
    pub bundled: PathBuf,
    pub project: PathBuf,
}

impl SettingsRoots {
    fn in_priority_order(&self) -> [(SettingsOrigin, &Path); 2] {
        [
            (SettingsOrigin::Bundled, self.bundled.as_path()),
            (SettingsOrigin::Project, self.project.as_path()),
        ]
    }
}

/// List the existing settings files for the given profiles.
///
/// For each profile, the bundled file comes before the project file.
pub fn settings_files<S: AsRef<str>>(profiles: &[S], roots: &SettingsRoots) -> Vec<SettingsFile> {
    profiles
        .iter()
        .flat_map(|profile| {
            roots
                .in_priority_order()
                .map(|(origin, dir)| SettingsFile {
                    path: dir.join(format!("{}.json", profile.as_ref())),
                    origin,
                })
        })
        .filter(|file| file.path.is_file())
        .collect()
}

/// Read one settings file. Its top level must be a JSON object.
pub fn read_settings_file(file: &SettingsFile) -> SettingsResult<Value> {
    let content = std::fs::read_to_string(&file.path)
        .map_err(|e| SettingsError::parse(&file.path, e))?;
    let value: Value =
        serde_json::from_str(&content).map_err(|e| SettingsError::parse(&file.path, e))?;

    if !value.is_object() {
        return Err(SettingsError::parse(
            &file.path,
            "top level must be a JSON object",
        ));
    }

    Ok(match file.origin {
        SettingsOrigin::Bundled => rewrite_deferred(value),
        SettingsOrigin::Project => value,
    })
}

/// Merge the given files onto `base`, in order.
///
/// Placeholders are not expanded here. Callers may still inject computed
/// values before running the expansion.
pub fn load_settings(files: &[SettingsFile], base: Value) -> SettingsResult<Value> {
    files.iter().try_fold(base, |merged, file| {
        let data = read_settings_file(file)?;
        debug!(path = %file.path.display(), origin = %file.origin, "Loaded settings file");
        deep_merge(merged, data)
    })
}
