//! Configuration loading and discovery for `extpack.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::ExtpackConfig;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for when locating a project.
pub const CONFIG_FILENAME: &str = "extpack.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse extpack.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override source directory
    pub src: Option<PathBuf>,
    /// Override artifact store directory
    pub out: Option<PathBuf>,
    /// Override package store directory
    pub package: Option<PathBuf>,
    /// Enable production mode
    pub production: Option<bool>,
    /// Dependency vendoring mode (0, 1 or 2)
    pub include_dependencies: Option<u8>,
    /// Disable desktop notifications
    pub no_notify: bool,
}

/// Find extpack.toml by walking up from a specific directory.
///
/// # Returns
/// - `Some(path)` for the nearest extpack.toml
/// - `None` if the filesystem root is reached without finding one
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a specific extpack.toml file.
///
/// The file is parsed and validated; validation problems are collected into
/// a single [`ConfigError::Validation`].
pub fn load_config(path: &Path) -> Result<ExtpackConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: ExtpackConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Locate and load the project configuration.
///
/// An explicit path wins (relative paths are taken from `start`); otherwise
/// the directory tree is searched upwards from `start`. Returns the configuration together with the project root
/// (the directory holding the config file, or `start` when none exists).
pub fn load_project(
    start: &Path,
    explicit: Option<&Path>,
) -> Result<(ExtpackConfig, PathBuf), ConfigError> {
    let config_path = match explicit {
        Some(p) => Some(resolve_path(start, p)),
        None => find_config_from(start.to_path_buf()),
    };

    match config_path {
        Some(path) => {
            let config = load_config(&path)?;
            let root = project_root(&path).map(Path::to_path_buf).unwrap_or_else(|| start.into());
            tracing::debug!(config = %path.display(), "loaded project configuration");
            Ok((config, root))
        }
        None => {
            tracing::debug!("no {} found, using defaults", CONFIG_FILENAME);
            Ok((default_config(), start.to_path_buf()))
        }
    }
}

/// Create a default configuration when no extpack.toml is found.
pub fn default_config() -> ExtpackConfig {
    ExtpackConfig::default()
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. The merged
/// configuration is validated again so a bad flag is reported like a bad
/// config value.
pub fn merge_cli_overrides(
    config: &mut ExtpackConfig,
    overrides: &CliOverrides,
) -> Result<(), ConfigError> {
    if let Some(ref src) = overrides.src {
        config.project.src = src.clone();
    }
    if let Some(ref out) = overrides.out {
        config.project.out = out.clone();
    }
    if let Some(ref package) = overrides.package {
        config.project.package = package.clone();
    }
    if let Some(production) = overrides.production {
        config.build.production = production;
    }
    if let Some(mode) = overrides.include_dependencies {
        config.build.include_dependencies = mode;
    }
    if overrides.no_notify {
        config.notify.enabled = false;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }
    Ok(())
}

/// Get the project root directory from a config file path.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
