//! Engine options.
//!
//! Tunables for the resolution engine itself, as opposed to the build settings
//! it resolves. Loaded from an optional YAML file, then environment overrides:
//! - `BUILD_SETTINGS_MAX_PASSES` - Cap on placeholder expansion commits
//! - `BUILD_SETTINGS_DIR` - Settings directory expression

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Options controlling settings resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Maximum number of committed changes during one expansion run.
    #[serde(default = "default_max_expansion_passes")]
    pub max_expansion_passes: usize,

    /// Directory holding `<profile>.json`, as a path expression relative to a root.
    #[serde(default = "default_settings_dir")]
    pub settings_dir: String,

    /// Name of the user path-override file at the project root.
    #[serde(default = "default_path_overrides_file")]
    pub path_overrides_file: String,

    /// Build system directory used when no override is configured.
    #[serde(default = "default_build_system_dir")]
    pub default_build_system_dir: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_expansion_passes: default_max_expansion_passes(),
            settings_dir: default_settings_dir(),
            path_overrides_file: default_path_overrides_file(),
            default_build_system_dir: default_build_system_dir(),
        }
    }
}

fn default_max_expansion_passes() -> usize {
    1000
}

fn default_settings_dir() -> String {
    "${build_system_dir}/build/settings".to_string()
}

fn default_path_overrides_file() -> String {
    "paths.json".to_string()
}

fn default_build_system_dir() -> String {
    "build_system".to_string()
}

impl EngineOptions {
    /// Load options from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options: EngineOptions = serde_yaml::from_str(&content)?;
        Ok(options)
    }

    /// Load options from an optional file, then apply environment overrides.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut options = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        options.apply_env_overrides();
        Ok(options)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(passes) = std::env::var("BUILD_SETTINGS_MAX_PASSES") {
            match passes.parse() {
                Ok(passes) => self.max_expansion_passes = passes,
                Err(_) => warn!(value = %passes, "Ignoring invalid BUILD_SETTINGS_MAX_PASSES"),
            }
        }

        if let Ok(dir) = std::env::var("BUILD_SETTINGS_DIR") {
            self.settings_dir = dir;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.max_expansion_passes, 1000);
        assert_eq!(options.settings_dir, "${build_system_dir}/build/settings");
        assert_eq!(options.path_overrides_file, "paths.json");
        assert_eq!(options.default_build_system_dir, "build_system");
    }

    #[test]
    fn test_load_partial_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("options.yaml");
        std::fs::write(&path, "max_expansion_passes: 10\n").unwrap();

        let options = EngineOptions::load(&path).unwrap();
        assert_eq!(options.max_expansion_passes, 10);
        assert_eq!(options.path_overrides_file, "paths.json");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        assert!(EngineOptions::load(temp.path().join("nope.yaml")).is_err());
    }
}
