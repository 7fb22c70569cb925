//! Layered settings configuration.
//!
//! Settings are resolved from two roots, each holding one JSON file per profile:
//! 1. **Bundled** - defaults shipped with the build tool
//! 2. **Project** - `<project>/${build_system_dir}/build/settings/`
//!
//! ## Merge Strategy
//! - Objects merge key-by-key, recursively
//! - Lists concatenate, so profiles can add hidden imports or dependencies
//! - Scalars from the later file replace earlier ones
//!
//! ## Placeholders
//! - `${key}` is replaced with the value of `key` once all profiles are merged
//! - `@{key}` in bundled files is left for the project to fill in, then
//!   treated like `${key}`
//!
//! ## Environment Variables
//! - `BUILD_SETTINGS_MAX_PASSES` - Cap on placeholder expansion passes
//! - `BUILD_SETTINGS_DIR` - Settings directory expression

pub mod merge;
pub mod options;
pub mod placeholders;
pub mod profiles;

pub use merge::{deep_merge, merge_all};
pub use options::EngineOptions;
pub use placeholders::{Template, expand, expand_all};
pub use profiles::{SettingsFile, SettingsOrigin, SettingsRoots, load_settings, settings_files};
