//! Configuration file management
//!
//! Reads weld's TOML configuration from a project or user location and
//! resolves each setting against command-line flags and the environment.
//! Precedence is always: flag, then environment, then file, then default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project-local configuration file
pub const LOCAL_CONFIG: &str = ".weld.toml";

/// Default build directory, relative to the working directory
pub const DEFAULT_BUILD_DIR: &str = "build";

/// Application configuration loaded from TOML files
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Build directory holding workspaces, objects and logs
    #[serde(default)]
    pub build_dir: Option<String>,

    /// Include directories added to every build
    #[serde(default)]
    pub include_dirs: Vec<String>,

    /// Library directories added to every build
    #[serde(default)]
    pub library_dirs: Vec<String>,

    /// Libraries linked into every build
    #[serde(default)]
    pub libraries: Vec<String>,

    /// Whether to reuse up-to-date artifacts (default true)
    #[serde(default)]
    pub cache: Option<bool>,

    /// C++ compiler to invoke
    #[serde(default)]
    pub compiler: Option<String>,
}

impl Config {
    /// Load configuration from TOML files.
    /// Priority: ./.weld.toml -> ~/.config/weld/config.toml
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config file cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_with_options(None, false)
    }

    /// Load configuration with custom options.
    ///
    /// # Arguments
    /// * `custom_path` - Optional custom path to config file (overrides defaults)
    /// * `skip_rc` - If true, skip loading config files (return default config)
    ///
    /// # Errors
    ///
    /// Returns an error if config file reading or parsing fails.
    pub fn load_with_options(custom_path: Option<&Path>, skip_rc: bool) -> Result<Self> {
        if skip_rc {
            return Ok(Self::default());
        }

        if let Some(path) = custom_path {
            return Self::load_from(path);
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.is_file() {
            return Self::load_from(local);
        }

        if let Some(config_dir) = Self::user_config_dir() {
            let config_path = config_dir.join("config.toml");
            if config_path.is_file() {
                return Self::load_from(&config_path);
            }
        }

        Ok(Self::default())
    }

    fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn user_config_dir() -> Option<PathBuf> {
        // Check XDG_CONFIG_HOME first
        if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg_config).join("weld"));
        }

        // Fall back to ~/.config/weld
        dirs::home_dir().map(|home| home.join(".config").join("weld"))
    }
}

/// Resolve the build directory: flag -> `WELD_BUILD_DIR` -> config -> `build`.
#[must_use]
pub fn build_dir(flag: Option<&Path>, config: &Config) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }

    if let Some(dir) = crate::env_vars::weld_build_dir() {
        return PathBuf::from(dir);
    }

    config
        .build_dir
        .as_deref()
        .map_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR), PathBuf::from)
}

/// Resolve whether the cache is on: `--no-cache` -> `WELD_NO_CACHE` -> config.
#[must_use]
pub fn cache_enabled(no_cache_flag: bool, config: &Config) -> bool {
    if no_cache_flag || crate::env_vars::weld_no_cache() {
        return false;
    }
    config.cache.unwrap_or(true)
}

/// Resolve the compiler: `CXX` -> config. `None` means the platform default.
#[must_use]
pub fn compiler(config: &Config) -> Option<String> {
    crate::env_vars::cxx().or_else(|| config.compiler.clone())
}

/// Flag values first, then configured values not already present
#[must_use]
pub fn merge_list<T: Clone + PartialEq>(flags: &[T], configured: &[T]) -> Vec<T> {
    let mut merged = flags.to_vec();
    for item in configured {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}
