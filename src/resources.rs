//! Resource copying with placeholder filtering, and icon discovery.

use crate::config::placeholders::{Template, expand_str, rewrite_deferred_str, value_to_text};
use crate::error::{SettingsError, SettingsResult};
use crate::paths::normalize_path_components;
use crate::settings::Settings;
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;
use walkdir::WalkDir;

/// Options for [`copy_with_filtering`].
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Files whose contents get placeholders replaced. `@{..}` markers in
    /// these paths are turned into `${..}` first. A directory entry covers
    /// every file below it.
    pub files_to_filter: Vec<PathBuf>,
    /// Files that are not copied at all. A directory entry covers every file
    /// below it.
    pub exclude: Vec<PathBuf>,
    /// Marker pattern used inside filtered files.
    pub template: Template,
}

/// Resolved paths compared by prefix.
///
/// Relative entries are taken against the working directory, `.` and `..`
/// are resolved, and symlinks are followed when the path exists.
struct PathSet {
    paths: Vec<PathBuf>,
}

impl PathSet {
    fn new<P: AsRef<Path>>(entries: impl IntoIterator<Item = P>) -> SettingsResult<Self> {
        let paths = entries
            .into_iter()
            .map(|p| resolve_path(p.as_ref()))
            .collect::<SettingsResult<Vec<_>>>()?;
        Ok(Self { paths })
    }

    fn contains(&self, path: &Path) -> SettingsResult<bool> {
        let path = resolve_path(path)?;
        Ok(self.paths.iter().any(|p| path.starts_with(p)))
    }
}

fn resolve_path(path: &Path) -> SettingsResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| SettingsError::io(path, e))?
            .join(path)
    };
    let normalized = normalize_path_components(&absolute);
    Ok(normalized.canonicalize().unwrap_or(normalized))
}

/// Copy a file or directory into `dest_dir`, filtering selected files.
///
/// A single file is copied into `dest_dir` under its own name. A directory is
/// copied recursively, keeping its layout. Filtered files also get their
/// destination path expanded. Returns the written paths.
pub fn copy_with_filtering(
    src: &Path,
    dest_dir: &Path,
    replacements: &Map<String, Value>,
    options: &CopyOptions,
) -> SettingsResult<Vec<PathBuf>> {
    let to_filter = PathSet::new(
        options
            .files_to_filter
            .iter()
            .map(|p| PathBuf::from(rewrite_deferred_str(&p.to_string_lossy()))),
    )?;
    let excluded = PathSet::new(&options.exclude)?;

    let mut written = Vec::new();
    for (from, to) in files_to_copy(src, dest_dir)? {
        if excluded.contains(&from)? {
            continue;
        }
        let to = if to_filter.contains(&from)? {
            let to = PathBuf::from(expand_str(
                &to.to_string_lossy(),
                replacements,
                &options.template,
            ));
            filter_file(&from, &to, replacements, &options.template)?;
            debug!(src = %from.display(), dest = %to.display(), "Copied with filtering");
            to
        } else {
            create_parent(&to)?;
            std::fs::copy(&from, &to).map_err(|e| SettingsError::io(&from, e))?;
            to
        };
        written.push(to);
    }
    Ok(written)
}

impl Settings {
    /// [`copy_with_filtering`] with the live settings as replacements.
    ///
    /// `src`, `dest_dir` and the option paths are project path expressions.
    pub fn copy_resources(
        &self,
        src: &str,
        dest_dir: &str,
        options: &CopyOptions,
    ) -> SettingsResult<Vec<PathBuf>> {
        let resolve = |paths: &[PathBuf]| {
            paths
                .iter()
                .map(|p| self.project_path(&rewrite_deferred_str(&p.to_string_lossy())))
                .collect::<SettingsResult<Vec<_>>>()
        };
        let resolved = CopyOptions {
            files_to_filter: resolve(&options.files_to_filter)?,
            exclude: resolve(&options.exclude)?,
            template: options.template.clone(),
        };
        copy_with_filtering(
            &self.project_path(src)?,
            &self.project_path(dest_dir)?,
            self.values(),
            &resolved,
        )
    }
}

fn create_parent(path: &Path) -> SettingsResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SettingsError::io(parent, e))?;
    }
    Ok(())
}

/// Replace markers byte-wise so files in any encoding pass through intact.
fn filter_file(
    from: &Path,
    to: &Path,
    replacements: &Map<String, Value>,
    template: &Template,
) -> SettingsResult<()> {
    let mut content = std::fs::read(from).map_err(|e| SettingsError::io(from, e))?;
    for (key, value) in replacements {
        let marker = template.render(key);
        content = replace_bytes(&content, marker.as_bytes(), value_to_text(value).as_bytes());
    }
    create_parent(to)?;
    std::fs::write(to, content).map_err(|e| SettingsError::io(to, e))?;
    let permissions = std::fs::metadata(from)
        .map_err(|e| SettingsError::io(from, e))?
        .permissions();
    std::fs::set_permissions(to, permissions).map_err(|e| SettingsError::io(to, e))
}

fn replace_bytes(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() {
        return haystack.to_vec();
    }
    let mut result = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = rest.windows(from.len()).position(|w| w == from) {
        result.extend_from_slice(&rest[..pos]);
        result.extend_from_slice(to);
        rest = &rest[pos + from.len()..];
    }
    result.extend_from_slice(rest);
    result
}

fn files_to_copy(src: &Path, dest_dir: &Path) -> SettingsResult<Vec<(PathBuf, PathBuf)>> {
    if src.is_file() {
        let name = src.file_name().unwrap_or(src.as_os_str());
        return Ok(vec![(src.to_path_buf(), dest_dir.join(name))]);
    }

    let mut pairs = Vec::new();
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            SettingsError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        pairs.push((entry.path().to_path_buf(), dest_dir.join(relative)));
    }
    Ok(pairs)
}

/// An application icon for the current profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub size: u32,
    pub scale: u32,
    pub path: PathBuf,
}

fn icon_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)(?:@(\d+)x)?").expect("icon name regex"))
}

impl Settings {
    /// Icons under `${build_system_dir}/icons/<profile>` for each loaded profile.
    ///
    /// File names are `<size>.ico` or `<size>@<scale>x.ico`. A later profile
    /// replaces an icon of the same size and scale from an earlier one.
    pub fn icons(&self) -> SettingsResult<Vec<Icon>> {
        let mut found: BTreeMap<(u32, u32), PathBuf> = BTreeMap::new();

        for profile in self.loaded_profiles() {
            let dir = self.project_path(&format!("${{build_system_dir}}/icons/{profile}"))?;
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };

            let mut paths: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "ico"))
                .collect();
            paths.sort();

            for path in paths {
                let (size, scale) = parse_icon_name(&path)?;
                found.insert((size, scale), path);
            }
        }

        Ok(found
            .into_iter()
            .map(|((size, scale), path)| Icon { size, scale, path })
            .collect())
    }
}

fn parse_icon_name(path: &Path) -> SettingsResult<(u32, u32)> {
    let invalid = || SettingsError::InvalidIconName(path.to_path_buf());
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    let caps = icon_name_pattern().captures(stem).ok_or_else(invalid)?;

    let size = caps[1].parse().map_err(|_| invalid())?;
    let scale = match caps.get(2) {
        Some(scale) => scale.as_str().parse().map_err(|_| invalid())?,
        None => 1,
    };
    Ok((size, scale))
}
