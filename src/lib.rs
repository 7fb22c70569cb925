//! Build Settings Library
//!
//! Resolves layered, profile-based build settings for desktop application
//! projects: JSON files merged per profile, placeholders expanded to a fixed
//! point, and path expressions turned into host paths.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod paths;
pub mod platform;
pub mod resources;
pub mod settings;
pub mod version;

pub use config::{EngineOptions, Template};
pub use error::{SettingsError, SettingsResult};
pub use platform::{Platform, PlatformName};
pub use settings::Settings;
