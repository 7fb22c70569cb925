//! Host platform detection and the default profiles it implies.

use crate::error::{SettingsError, SettingsResult};
use std::fmt;
use std::path::Path;

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformName {
    Windows,
    Mac,
    Linux,
}

impl PlatformName {
    /// Profile activated by default on this platform.
    pub fn profile(&self) -> &'static str {
        match self {
            PlatformName::Windows => "windows",
            PlatformName::Mac => "mac",
            PlatformName::Linux => "linux",
        }
    }
}

impl fmt::Display for PlatformName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformName::Windows => write!(f, "Windows"),
            PlatformName::Mac => write!(f, "Mac"),
            PlatformName::Linux => write!(f, "Linux"),
        }
    }
}

impl std::str::FromStr for PlatformName {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win32" => Ok(PlatformName::Windows),
            "mac" | "macos" | "darwin" => Ok(PlatformName::Mac),
            "linux" => Ok(PlatformName::Linux),
            other => Err(SettingsError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Host platform, optionally with its Linux distribution name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub name: PlatformName,
    pub linux_distribution: Option<String>,
}

impl Platform {
    pub fn new(name: PlatformName) -> Self {
        Self {
            name,
            linux_distribution: None,
        }
    }

    pub fn with_distribution(mut self, distribution: impl Into<String>) -> Self {
        self.linux_distribution = Some(distribution.into());
        self
    }

    /// Detect the platform this process runs on.
    pub fn detect() -> SettingsResult<Self> {
        let name: PlatformName = std::env::consts::OS.parse()?;
        let mut platform = Self::new(name);
        if name == PlatformName::Linux {
            platform.linux_distribution = Some(
                read_os_release_name(Path::new("/etc/os-release"))
                    .unwrap_or_else(|| "<unknown>".to_string()),
            );
        }
        Ok(platform)
    }

    pub fn is_windows(&self) -> bool {
        self.name == PlatformName::Windows
    }

    pub fn is_mac(&self) -> bool {
        self.name == PlatformName::Mac
    }

    pub fn is_linux(&self) -> bool {
        self.name == PlatformName::Linux
    }

    pub fn is_ubuntu(&self) -> bool {
        self.distribution_in(&["Ubuntu", "Linux Mint", "Pop!_OS"])
    }

    pub fn is_arch_linux(&self) -> bool {
        self.distribution_in(&["Arch Linux", "Manjaro Linux"])
    }

    pub fn is_fedora(&self) -> bool {
        self.distribution_in(&["Fedora", "CentOS Linux"])
    }

    fn distribution_in(&self, names: &[&str]) -> bool {
        self.is_linux()
            && self
                .linux_distribution
                .as_deref()
                .is_some_and(|d| names.contains(&d))
    }

    /// Profiles activated by `init`: `base`, the OS, then the distribution.
    pub fn default_profiles(&self) -> Vec<String> {
        let mut profiles = vec!["base".to_string(), self.name.profile().to_string()];
        if self.is_ubuntu() {
            profiles.push("ubuntu".to_string());
        } else if self.is_arch_linux() {
            profiles.push("arch".to_string());
        } else if self.is_fedora() {
            profiles.push("fedora".to_string());
        }
        profiles
    }
}

/// `NAME=` entry of an os-release file, without quotes.
fn read_os_release_name(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_os_release_name(&content)
}

fn parse_os_release_name(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.trim_end().strip_prefix("NAME="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
