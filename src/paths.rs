//! Path resolution on top of resolved settings.
//!
//! Path expressions always use forward slashes, even on Windows, and may
//! contain placeholders: `project_path("${freeze_dir}/Contents")`. Expressions
//! are expanded against the live settings and joined onto a root:
//! - project paths are relative to the project directory given to `init`
//! - default paths are relative to the bundled defaults directory
//!
//! The project may relocate its build system directory through an optional
//! `paths.json` at the project root, for example `{"build_path": "tools/build"}`.

use crate::config::placeholders::{Template, expand_str, rewrite_deferred_str};
use crate::config::profiles::SettingsRoots;
use crate::error::{SettingsError, SettingsResult};
use crate::settings::{BUILD_SYSTEM_DIR, Settings};
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Key in the override table that relocates the build system directory.
pub const BUILD_PATH_OVERRIDE: &str = "build_path";

/// User-configurable path overrides read from the project root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathOverrides {
    entries: Map<String, Value>,
}

impl PathOverrides {
    /// Read the override table. A missing file yields an empty table.
    pub fn load(path: &Path) -> SettingsResult<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }

        let invalid = |message: String| SettingsError::InvalidPathOverrides {
            path: path.to_path_buf(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        match value {
            Value::Object(entries) => {
                debug!(path = %path.display(), entries = entries.len(), "Loaded path overrides");
                Ok(Self { entries })
            }
            _ => Err(invalid("file must contain a JSON object".to_string())),
        }
    }

    /// Look up an override. Non-string entries are rejected.
    pub fn get(&self, name: &str) -> SettingsResult<Option<&str>> {
        match self.entries.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(SettingsError::SettingType {
                key: name.to_string(),
                expected: "a string path",
                found: other.clone(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Settings {
    /// Absolute path of a file in the project directory.
    ///
    /// Immediate placeholders are expanded first, then deferred ones.
    pub fn project_path(&self, expr: &str) -> SettingsResult<PathBuf> {
        let root = self.project_root()?;
        let expanded = expand_str(expr, self.values(), &Template::IMMEDIATE);
        let expanded = expand_str(&expanded, self.values(), &Template::DEFERRED);
        Ok(fix_path(root, &expanded))
    }

    /// Absolute path of a file under the bundled defaults directory.
    ///
    /// Deferred markers become immediate ones and are expanded like any other.
    /// `${build_system_dir}` always means the bundle's own layout; the
    /// project's `paths.json` override does not apply here.
    pub fn default_path(&self, expr: &str) -> PathBuf {
        let rewritten = rewrite_deferred_str(expr).replace(
            &Template::IMMEDIATE.render(BUILD_SYSTEM_DIR),
            &self.options().default_build_system_dir,
        );
        let expanded = expand_str(&rewritten, self.values(), &Template::IMMEDIATE);
        fix_path(self.defaults_root(), &expanded)
    }

    /// Settings directories for the bundled defaults and the project.
    pub fn settings_roots(&self) -> SettingsResult<SettingsRoots> {
        let settings_dir = &self.options().settings_dir;
        Ok(SettingsRoots {
            bundled: self.default_path(settings_dir),
            project: self.project_path(settings_dir)?,
        })
    }

    /// Override table, read on first use and cached for this context.
    pub fn path_overrides(&self) -> SettingsResult<&PathOverrides> {
        if let Some(overrides) = self.path_overrides_cell().get() {
            return Ok(overrides);
        }
        let file = fix_path(self.project_root()?, &self.options().path_overrides_file);
        let overrides = PathOverrides::load(&file)?;
        Ok(self.path_overrides_cell().get_or_init(|| overrides))
    }

    /// Forget the cached override table so the next lookup re-reads it.
    pub fn reset_path_overrides(&mut self) {
        self.path_overrides_cell_mut().take();
    }

    /// Build system directory relative to the project root.
    pub fn build_system_dir(&self) -> SettingsResult<String> {
        Ok(self
            .path_overrides()?
            .get(BUILD_PATH_OVERRIDE)?
            .map(str::to_string)
            .unwrap_or_else(|| self.options().default_build_system_dir.clone()))
    }
}

/// Join a forward-slash path expression onto `base` using host separators.
///
/// Absolute expressions are kept as they are. `.` and `..` are resolved
/// lexically; the file does not need to exist.
pub fn fix_path(base: &Path, expr: &str) -> PathBuf {
    let joined = if Path::new(expr).is_absolute() {
        PathBuf::from(expr)
    } else {
        expr.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(base.to_path_buf(), |path, segment| path.join(segment))
    };
    normalize_path_components(&joined)
}

/// Normalize path components without requiring the file to exist.
/// Handles `.` and `..` components.
pub fn normalize_path_components(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => {
                // Windows drive prefix (e.g., C:)
                components.push(Component::Prefix(p));
            }
            Component::RootDir => {
                components.push(Component::RootDir);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else {
                    // Can't go up from root (e.g. `/../foo`)
                    components.push(Component::ParentDir);
                }
            }
            Component::Normal(name) => {
                components.push(Component::Normal(name));
            }
        }
    }

    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fix_path_joins_segments() {
        let result = fix_path(Path::new("/project"), "src/main/icons");
        assert_eq!(result, Path::new("/project").join("src").join("main").join("icons"));
    }

    #[test]
    fn test_fix_path_normalizes_dots() {
        let result = fix_path(Path::new("/project"), "./target/../build//x");
        assert_eq!(result, PathBuf::from("/project/build/x"));
    }

    #[test]
    fn test_fix_path_keeps_absolute_expression() {
        let result = fix_path(Path::new("/project"), "/opt/tools/bin");
        assert_eq!(result, PathBuf::from("/opt/tools/bin"));
    }

    #[test]
    fn test_normalize_path_components() {
        let normalized = normalize_path_components(Path::new("/foo/bar/../baz/./qux"));
        assert_eq!(normalized, PathBuf::from("/foo/baz/qux"));
    }

    #[test]
    fn test_normalize_keeps_leading_parent() {
        let normalized = normalize_path_components(Path::new("../a/b/.."));
        assert_eq!(normalized, PathBuf::from("../a"));
    }

    #[test]
    fn test_overrides_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let overrides = PathOverrides::load(&temp.path().join("paths.json")).unwrap();
        assert!(overrides.is_empty());
        assert_eq!(overrides.get(BUILD_PATH_OVERRIDE).unwrap(), None);
    }

    #[test]
    fn test_overrides_loaded() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("paths.json");
        std::fs::write(&file, r#"{"build_path": "tools/build"}"#).unwrap();

        let overrides = PathOverrides::load(&file).unwrap();
        assert_eq!(overrides.get(BUILD_PATH_OVERRIDE).unwrap(), Some("tools/build"));
    }

    #[test]
    fn test_overrides_must_be_object() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("paths.json");
        std::fs::write(&file, r#"["build_path"]"#).unwrap();

        assert!(matches!(
            PathOverrides::load(&file),
            Err(SettingsError::InvalidPathOverrides { .. })
        ));
    }

    #[test]
    fn test_overrides_malformed_json() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("paths.json");
        std::fs::write(&file, "{").unwrap();

        assert!(PathOverrides::load(&file).is_err());
    }

    #[test]
    fn test_override_value_must_be_string() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("paths.json");
        std::fs::write(&file, r#"{"build_path": 3}"#).unwrap();

        let overrides = PathOverrides::load(&file).unwrap();
        assert!(overrides.get(BUILD_PATH_OVERRIDE).is_err());
    }
}
