//! The settings store.
//!
//! `Settings` owns the resolved settings map and the ordered list of active
//! profiles. It is an explicit context value: every caller that needs resolved
//! settings receives it by reference, and tests build a fresh one per scenario.
//!
//! Typical use:
//!
//! ```no_run
//! use build_settings::{EngineOptions, Settings};
//!
//! let mut settings = Settings::new("/opt/build-tool/defaults", EngineOptions::default());
//! settings.init("my-project", &["base", "mac"])?;
//! let app_name = settings.get_str("app_name")?;
//! let freeze_dir = settings.project_path("${freeze_dir}")?;
//! # Ok::<(), build_settings::SettingsError>(())
//! ```

use crate::config::options::EngineOptions;
use crate::config::placeholders;
use crate::config::profiles::{load_settings, settings_files};
use crate::error::{SettingsError, SettingsResult};
use crate::paths::{PathOverrides, normalize_path_components};
use crate::platform::Platform;
use serde_json::{Map, Value};
use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Core setting holding the absolute project directory.
pub const PROJECT_DIR: &str = "project_dir";

/// Configurable setting holding the build system directory.
pub const BUILD_SYSTEM_DIR: &str = "build_system_dir";

/// Resolved build settings and the profiles that produced them.
#[derive(Debug, Clone)]
pub struct Settings {
    values: Map<String, Value>,
    profiles: Vec<String>,
    project_root: Option<PathBuf>,
    defaults_root: PathBuf,
    options: EngineOptions,
    path_overrides: OnceCell<PathOverrides>,
}

impl Settings {
    /// Create an empty store. `defaults_root` holds the bundled default settings.
    pub fn new(defaults_root: impl Into<PathBuf>, options: EngineOptions) -> Self {
        Self {
            values: Map::new(),
            profiles: Vec::new(),
            project_root: None,
            defaults_root: defaults_root.into(),
            options,
            path_overrides: OnceCell::new(),
        }
    }

    /// Reset the store for a project and activate the default profiles in order.
    pub fn init<S: AsRef<str>>(
        &mut self,
        project_root: impl AsRef<Path>,
        default_profiles: &[S],
    ) -> SettingsResult<()> {
        let project_root = absolute_path(project_root.as_ref())?;
        info!(project = %project_root.display(), "Initializing build settings");

        self.values.clear();
        self.profiles.clear();
        self.path_overrides = OnceCell::new();
        self.project_root = Some(project_root);

        let base = self.base_settings()?;
        self.update(base);

        for profile in default_profiles {
            self.activate_profile(profile.as_ref())?;
        }
        Ok(())
    }

    /// `init` with the default profiles of a platform.
    pub fn init_for_platform(
        &mut self,
        project_root: impl AsRef<Path>,
        platform: &Platform,
    ) -> SettingsResult<()> {
        self.init(project_root, &platform.default_profiles())
    }

    /// Activate a profile on top of the ones already active.
    ///
    /// Every activation reloads the files of all active profiles onto a fresh
    /// copy of the core settings, overwrites the matching top-level keys, then
    /// expands placeholders. Activating a profile twice loads its files twice.
    pub fn activate_profile(&mut self, name: &str) -> SettingsResult<()> {
        let roots = self.settings_roots()?;
        let base = Value::Object(self.base_settings()?);

        self.profiles.push(name.to_string());
        let files = settings_files(&self.profiles, &roots);
        debug!(
            profile = %name,
            active = ?self.profiles,
            files = files.len(),
            "Activating profile"
        );

        if let Value::Object(merged) = load_settings(&files, base)? {
            self.update(merged);
        }
        self.expand_all()
    }

    /// Re-run placeholder expansion over the whole map.
    pub fn expand_all(&mut self) -> SettingsResult<()> {
        placeholders::expand_all(&mut self.values, self.options.max_expansion_passes)?;
        Ok(())
    }

    /// Core settings (derived from the project alone) plus configurable ones.
    fn base_settings(&self) -> SettingsResult<Map<String, Value>> {
        let project_root = self.project_root()?;
        let mut base = Map::new();
        base.insert(
            PROJECT_DIR.to_string(),
            Value::String(project_root.to_string_lossy().into_owned()),
        );
        base.insert(
            BUILD_SYSTEM_DIR.to_string(),
            Value::String(self.build_system_dir()?),
        );
        Ok(base)
    }

    /// Look up a required setting.
    pub fn get(&self, key: &str) -> SettingsResult<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| SettingsError::SettingNotFound(key.to_string()))
    }

    /// Look up a required string setting.
    pub fn get_str(&self, key: &str) -> SettingsResult<&str> {
        let value = self.get(key)?;
        value.as_str().ok_or_else(|| type_error(key, "a string", value))
    }

    /// Look up a required boolean setting.
    pub fn get_bool(&self, key: &str) -> SettingsResult<bool> {
        let value = self.get(key)?;
        value.as_bool().ok_or_else(|| type_error(key, "a boolean", value))
    }

    /// Look up a required list setting.
    pub fn get_array(&self, key: &str) -> SettingsResult<&Vec<Value>> {
        let value = self.get(key)?;
        value.as_array().ok_or_else(|| type_error(key, "a list", value))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy of the current settings map.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// Overwrite top-level keys. No expansion is performed.
    pub fn update(&mut self, partial: Map<String, Value>) {
        for (key, value) in partial {
            self.values.insert(key, value);
        }
    }

    /// Inject a computed value. Call `expand_all` afterwards to propagate it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Profiles activated so far, in activation order.
    pub fn loaded_profiles(&self) -> &[String] {
        &self.profiles
    }

    /// Project directory established by `init`.
    pub fn project_root(&self) -> SettingsResult<&Path> {
        self.project_root
            .as_deref()
            .ok_or(SettingsError::ProjectNotInitialized)
    }

    pub fn defaults_root(&self) -> &Path {
        &self.defaults_root
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub(crate) fn path_overrides_cell(&self) -> &OnceCell<PathOverrides> {
        &self.path_overrides
    }

    pub(crate) fn path_overrides_cell_mut(&mut self) -> &mut OnceCell<PathOverrides> {
        &mut self.path_overrides
    }
}

fn type_error(key: &str, expected: &'static str, found: &Value) -> SettingsError {
    SettingsError::SettingType {
        key: key.to_string(),
        expected,
        found: found.clone(),
    }
}

fn absolute_path(path: &Path) -> SettingsResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| SettingsError::io(path, e))?
            .join(path)
    };
    Ok(normalize_path_components(&absolute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        defaults: PathBuf,
        project: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let defaults = temp.path().join("defaults");
            let project = temp.path().join("project");
            std::fs::create_dir_all(defaults.join("build_system/build/settings")).unwrap();
            std::fs::create_dir_all(project.join("build_system/build/settings")).unwrap();
            Self {
                _temp: temp,
                defaults,
                project,
            }
        }

        fn write_default(&self, profile: &str, value: Value) {
            let path = self
                .defaults
                .join(format!("build_system/build/settings/{profile}.json"));
            std::fs::write(path, value.to_string()).unwrap();
        }

        fn write_project(&self, profile: &str, value: Value) {
            let path = self
                .project
                .join(format!("build_system/build/settings/{profile}.json"));
            std::fs::write(path, value.to_string()).unwrap();
        }

        fn settings(&self) -> Settings {
            Settings::new(&self.defaults, EngineOptions::default())
        }
    }

    #[test]
    fn test_get_before_init() {
        let settings = Settings::new("/defaults", EngineOptions::default());
        assert!(matches!(
            settings.get("app_name"),
            Err(SettingsError::SettingNotFound(_))
        ));
        assert!(matches!(
            settings.project_root(),
            Err(SettingsError::ProjectNotInitialized)
        ));
    }

    #[test]
    fn test_activate_before_init_records_nothing() {
        let mut settings = Settings::new("/defaults", EngineOptions::default());
        assert!(matches!(
            settings.activate_profile("base"),
            Err(SettingsError::ProjectNotInitialized)
        ));
        assert!(settings.loaded_profiles().is_empty());
    }

    #[test]
    fn test_init_core_settings() {
        let fixture = Fixture::new();
        let mut settings = fixture.settings();
        settings.init(&fixture.project, &[] as &[&str]).unwrap();

        assert_eq!(
            settings.get_str(PROJECT_DIR).unwrap(),
            fixture.project.to_string_lossy()
        );
        assert_eq!(settings.get_str(BUILD_SYSTEM_DIR).unwrap(), "build_system");
        assert!(settings.loaded_profiles().is_empty());
    }

    #[test]
    fn test_init_merges_and_expands() {
        let fixture = Fixture::new();
        fixture.write_default(
            "base",
            json!({"freeze_dir": "target/${app_name}", "hidden_imports": ["a"]}),
        );
        fixture.write_project("base", json!({"app_name": "MyApp"}));
        fixture.write_project("mac", json!({"hidden_imports": ["b"]}));

        let mut settings = fixture.settings();
        settings.init(&fixture.project, &["base", "mac"]).unwrap();

        assert_eq!(settings.get_str("freeze_dir").unwrap(), "target/MyApp");
        assert_eq!(settings.get("hidden_imports").unwrap(), &json!(["a", "b"]));
        assert_eq!(settings.loaded_profiles(), &["base", "mac"]);
    }

    #[test]
    fn test_activate_profile_overrides() {
        let fixture = Fixture::new();
        fixture.write_project("base", json!({"url": "https://staging", "app_name": "MyApp"}));
        fixture.write_project("release", json!({"url": "https://prod"}));

        let mut settings = fixture.settings();
        settings.init(&fixture.project, &["base"]).unwrap();
        assert_eq!(settings.get_str("url").unwrap(), "https://staging");

        settings.activate_profile("release").unwrap();
        assert_eq!(settings.get_str("url").unwrap(), "https://prod");
        assert_eq!(settings.loaded_profiles(), &["base", "release"]);
    }

    #[test]
    fn test_activate_twice_duplicates_lists() {
        let fixture = Fixture::new();
        fixture.write_project("base", json!({"hidden_imports": ["a"]}));

        let mut settings = fixture.settings();
        settings.init(&fixture.project, &["base"]).unwrap();
        settings.activate_profile("base").unwrap();

        assert_eq!(settings.get("hidden_imports").unwrap(), &json!(["a", "a"]));
        assert_eq!(settings.loaded_profiles(), &["base", "base"]);
    }

    #[test]
    fn test_set_then_expand() {
        let fixture = Fixture::new();
        fixture.write_project("base", json!({"installer": "Setup-${version}.exe"}));

        let mut settings = fixture.settings();
        settings.init(&fixture.project, &["base"]).unwrap();
        assert_eq!(settings.get_str("installer").unwrap(), "Setup-${version}.exe");

        settings.set("version", "1.2.3");
        settings.expand_all().unwrap();
        assert_eq!(settings.get_str("installer").unwrap(), "Setup-1.2.3.exe");
    }

    #[test]
    fn test_injected_value_survives_activation() {
        let fixture = Fixture::new();
        fixture.write_project("base", json!({"app_name": "MyApp"}));
        fixture.write_project("release", json!({"title": "${app_name} ${version}"}));

        let mut settings = fixture.settings();
        settings.init(&fixture.project, &["base"]).unwrap();
        settings.set("version", "2.0");
        settings.activate_profile("release").unwrap();

        assert_eq!(settings.get_str("title").unwrap(), "MyApp 2.0");
    }

    #[test]
    fn test_cycle_in_profile_fails() {
        let fixture = Fixture::new();
        fixture.write_project("base", json!({"a": "${b}", "b": "${a}"}));

        let mut settings = fixture.settings();
        let err = settings.init(&fixture.project, &["base"]).unwrap_err();
        assert!(matches!(err, SettingsError::PlaceholderCycle { .. }));
    }

    #[test]
    fn test_typed_getters() {
        let fixture = Fixture::new();
        fixture.write_project(
            "base",
            json!({"show_console_window": false, "depends": ["libc"], "n": 1}),
        );

        let mut settings = fixture.settings();
        settings.init(&fixture.project, &["base"]).unwrap();

        assert!(!settings.get_bool("show_console_window").unwrap());
        assert_eq!(settings.get_array("depends").unwrap().len(), 1);
        assert!(matches!(
            settings.get_str("n"),
            Err(SettingsError::SettingType { .. })
        ));
    }

    #[test]
    fn test_reinit_resets_state() {
        let fixture = Fixture::new();
        fixture.write_project("base", json!({"app_name": "MyApp"}));
        fixture.write_project("mac", json!({"mac_only": true}));

        let mut settings = fixture.settings();
        settings.init(&fixture.project, &["base", "mac"]).unwrap();
        settings.set("extra", 1);
        settings.init(&fixture.project, &["base"]).unwrap();

        assert!(!settings.contains("mac_only"));
        assert!(!settings.contains("extra"));
        assert_eq!(settings.loaded_profiles(), &["base"]);
    }
}
