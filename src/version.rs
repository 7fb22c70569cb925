//! Application version resolution.
//!
//! The `version` setting is either a literal version string or a reference of
//! the form `attr: my_app.__version__`. References are resolved by an
//! [`IsolatedEvaluator`], which runs the lookup in a fresh environment so the
//! caller's own state is never touched.
//!
//! Resolving the version also fills in the `major`, `minor` and `patch`
//! settings, which installers use for their own version fields.

use crate::error::{SettingsError, SettingsResult};
use crate::settings::Settings;
use regex_lite::Regex;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Prefix marking a version that must be looked up.
pub const ATTR_PREFIX: &str = "attr:";

/// A lookup to run in isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalRequest {
    /// Module containing the attribute.
    pub module: String,
    /// Attribute name within the module.
    pub attribute: String,
    /// Directory to make the module importable from, if needed.
    pub search_path: Option<PathBuf>,
}

impl EvalRequest {
    /// Dotted `module.attribute` form.
    pub fn target(&self) -> String {
        format!("{}.{}", self.module, self.attribute)
    }
}

/// Runs a lookup in a fresh environment and returns a single string.
///
/// Implementations must not rely on any state shared with the caller.
pub trait IsolatedEvaluator {
    fn evaluate(&self, request: &EvalRequest) -> SettingsResult<String>;
}

/// Evaluator that spawns a short-lived process per lookup.
///
/// The dotted target is appended to `args`; the search path, when present,
/// becomes the working directory. The trimmed stdout is the result.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandEvaluator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl IsolatedEvaluator for CommandEvaluator {
    fn evaluate(&self, request: &EvalRequest) -> SettingsResult<String> {
        let target = request.target();
        let failed = |message: String| SettingsError::Evaluator {
            target: target.clone(),
            message,
        };

        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(&target);
        if let Some(dir) = &request.search_path {
            command.current_dir(dir);
        }

        debug!(program = %self.program, target = %target, "Running isolated lookup");
        let output = command.output().map_err(|e| failed(e.to_string()))?;
        if !output.status.success() {
            return Err(failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            return Err(failed("lookup produced no output".to_string()));
        }
        Ok(value)
    }
}

/// Parse an `attr:` reference into a lookup request.
pub fn parse_attr_reference(
    reference: &str,
    search_path: Option<PathBuf>,
) -> SettingsResult<EvalRequest> {
    let attr_path = reference
        .strip_prefix(ATTR_PREFIX)
        .unwrap_or(reference)
        .trim_start();

    match attr_path.rsplit_once('.') {
        Some((module, attribute)) if !module.is_empty() && !attribute.is_empty() => {
            Ok(EvalRequest {
                module: module.to_string(),
                attribute: attribute.to_string(),
                search_path,
            })
        }
        _ => Err(SettingsError::InvalidVersion(format!(
            "{ATTR_PREFIX} format must name a module attribute, e.g. my_app.__version__; got {reference}"
        ))),
    }
}

/// Resolve the `version` setting, looking it up first if it is a reference.
///
/// `major`, `minor` and `patch` are filled in when missing.
pub fn resolve_version(
    settings: &mut Settings,
    evaluator: &dyn IsolatedEvaluator,
) -> SettingsResult<String> {
    let version = settings.get_str("version")?.to_string();

    if version.starts_with(ATTR_PREFIX) {
        let search_path = match settings.get_str("python_path") {
            Ok(expr) => Some(settings.project_path(expr)?),
            Err(SettingsError::SettingNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let request = parse_attr_reference(&version, search_path)?;
        let resolved = evaluator.evaluate(&request)?;
        info!(target = %request.target(), version = %resolved, "Resolved version reference");
        set_version(settings, &resolved)?;
    }

    if !settings.contains("major") {
        let version = settings.get_str("version")?.to_string();
        set_version(settings, &version)?;
    }

    Ok(settings.get_str("version")?.to_string())
}

/// Release segments of a version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionParts {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*v?(?:\d+!)?(\d+(?:\.\d+)*)(?:[-_.]?(?:a|b|c|rc|alpha|beta|pre|preview)[-_.]?\d*)?(?:-\d+|[-_.]?(?:post|rev|r)[-_.]?\d*)?(?:[-_.]?dev[-_.]?\d*)?(?:\+[a-z0-9]+(?:[-_.][a-z0-9]+)*)?\s*$",
        )
        .expect("version regex")
    })
}

/// Parse a version such as `1.2.3`, `2.0rc1` or `1.0.post2+local`.
pub fn parse_version(text: &str) -> SettingsResult<VersionParts> {
    let invalid = || {
        SettingsError::InvalidVersion(format!(
            "version must be a release number such as 1.2.3, got {text}"
        ))
    };

    let caps = version_pattern().captures(text).ok_or_else(invalid)?;
    let segments = caps[1]
        .split('.')
        .map(|s| s.parse::<u64>().map_err(|_| invalid()))
        .collect::<SettingsResult<Vec<u64>>>()?;
    let segment = |i: usize| segments.get(i).copied().unwrap_or(0);

    Ok(VersionParts {
        major: segment(0),
        minor: segment(1),
        patch: segment(2),
    })
}

/// Store a version and its release segments in the settings.
pub fn set_version(settings: &mut Settings, text: &str) -> SettingsResult<()> {
    let parts = parse_version(text)?;
    settings.set("version", text);
    settings.set("major", Value::from(parts.major));
    settings.set("minor", Value::from(parts.minor));
    settings.set("patch", Value::from(parts.patch));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options::EngineOptions;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct FixedEvaluator {
        value: String,
        seen: RefCell<Vec<EvalRequest>>,
    }

    impl IsolatedEvaluator for FixedEvaluator {
        fn evaluate(&self, request: &EvalRequest) -> SettingsResult<String> {
            self.seen.borrow_mut().push(request.clone());
            Ok(self.value.clone())
        }
    }

    fn settings_with(values: Value) -> (TempDir, Settings) {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::new(temp.path().join("defaults"), EngineOptions::default());
        settings.init(temp.path(), &[] as &[&str]).unwrap();
        if let Value::Object(map) = values {
            settings.update(map);
        }
        (temp, settings)
    }

    #[test]
    fn test_parse_version_variants() {
        let parts = parse_version("1.2.3").unwrap();
        assert_eq!((parts.major, parts.minor, parts.patch), (1, 2, 3));

        let parts = parse_version("2.0rc1").unwrap();
        assert_eq!((parts.major, parts.minor, parts.patch), (2, 0, 0));

        let parts = parse_version("v3").unwrap();
        assert_eq!((parts.major, parts.minor, parts.patch), (3, 0, 0));

        let parts = parse_version("1.4.2.post1.dev0+local.7").unwrap();
        assert_eq!((parts.major, parts.minor, parts.patch), (1, 4, 2));
    }

    #[test]
    fn test_parse_version_invalid() {
        assert!(parse_version("one.two").is_err());
        assert!(parse_version("").is_err());
        assert!(parse_version("1.2.x").is_err());
    }

    #[test]
    fn test_parse_attr_reference() {
        let request = parse_attr_reference("attr: my_app.__version__", None).unwrap();
        assert_eq!(request.module, "my_app");
        assert_eq!(request.attribute, "__version__");
        assert_eq!(request.target(), "my_app.__version__");

        let request = parse_attr_reference("attr:pkg.sub.VERSION", None).unwrap();
        assert_eq!(request.module, "pkg.sub");
    }

    #[test]
    fn test_parse_attr_reference_invalid() {
        assert!(parse_attr_reference("attr: version", None).is_err());
        assert!(parse_attr_reference("attr: .x", None).is_err());
        assert!(parse_attr_reference("attr: pkg.", None).is_err());
    }

    #[test]
    fn test_resolve_literal_version() {
        let (_temp, mut settings) = settings_with(json!({"version": "1.5.0"}));
        let evaluator = FixedEvaluator {
            value: "unused".into(),
            seen: RefCell::new(Vec::new()),
        };

        let version = resolve_version(&mut settings, &evaluator).unwrap();
        assert_eq!(version, "1.5.0");
        assert_eq!(settings.get("major").unwrap(), &json!(1));
        assert_eq!(settings.get("minor").unwrap(), &json!(5));
        assert_eq!(settings.get("patch").unwrap(), &json!(0));
        assert!(evaluator.seen.borrow().is_empty());
    }

    #[test]
    fn test_resolve_attr_version() {
        let (temp, mut settings) = settings_with(json!({
            "version": "attr: my_app.__version__",
            "python_path": "src"
        }));
        let evaluator = FixedEvaluator {
            value: "2.1.7".into(),
            seen: RefCell::new(Vec::new()),
        };

        let version = resolve_version(&mut settings, &evaluator).unwrap();
        assert_eq!(version, "2.1.7");
        assert_eq!(settings.get("patch").unwrap(), &json!(7));

        let seen = evaluator.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].search_path, Some(temp.path().join("src")));
    }

    #[test]
    fn test_resolve_version_then_expand() {
        let (_temp, mut settings) = settings_with(json!({
            "version": "3.0.1",
            "installer": "${app}-${major}.${minor}.exe",
            "app": "MyApp"
        }));
        let evaluator = FixedEvaluator {
            value: String::new(),
            seen: RefCell::new(Vec::new()),
        };

        resolve_version(&mut settings, &evaluator).unwrap();
        settings.expand_all().unwrap();
        assert_eq!(settings.get_str("installer").unwrap(), "MyApp-3.0.exe");
    }

    #[test]
    fn test_resolve_missing_version() {
        let (_temp, mut settings) = settings_with(json!({}));
        let evaluator = FixedEvaluator {
            value: String::new(),
            seen: RefCell::new(Vec::new()),
        };
        assert!(matches!(
            resolve_version(&mut settings, &evaluator),
            Err(SettingsError::SettingNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_evaluator_echo() {
        let evaluator = CommandEvaluator::new("echo").with_args(["-n"]);
        let request = parse_attr_reference("attr: my_app.VERSION", None).unwrap();
        assert_eq!(evaluator.evaluate(&request).unwrap(), "my_app.VERSION");
    }

    #[test]
    fn test_command_evaluator_missing_program() {
        let evaluator = CommandEvaluator::new("definitely-not-a-real-program-xyz");
        let request = parse_attr_reference("attr: a.b", None).unwrap();
        assert!(matches!(
            evaluator.evaluate(&request),
            Err(SettingsError::Evaluator { .. })
        ));
    }
}
