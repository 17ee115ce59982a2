//! Configuration schema types for `extpack.toml`
//!
//! Defines the structure and validation rules for extension project configuration.
//! Every section is optional; a missing file behaves like an empty one.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Icon sizes rasterized from the vector icon when nothing else is configured.
pub const DEFAULT_ICON_SIZES: [u32; 5] = [16, 24, 32, 48, 128];

/// Where the project's directories live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Source tree (manifest, locales, images, markup, styles, scripts)
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Artifact store: the unpacked, loadable build
    #[serde(default = "default_out")]
    pub out: PathBuf,
    /// Package store: accumulates installer archives
    #[serde(default = "default_package")]
    pub package: PathBuf,
    /// Installed third-party packages
    #[serde(default = "default_node_modules")]
    pub node_modules: PathBuf,
    /// Package descriptor declaring the dependencies to vendor
    #[serde(default = "default_package_json")]
    pub package_json: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("dist")
}

fn default_package() -> PathBuf {
    PathBuf::from("package")
}

fn default_node_modules() -> PathBuf {
    PathBuf::from("node_modules")
}

fn default_package_json() -> PathBuf {
    PathBuf::from("package.json")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            src: default_src(),
            out: default_out(),
            package: default_package(),
            node_modules: default_node_modules(),
            package_json: default_package_json(),
        }
    }
}

/// Build flags
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuildFlagsConfig {
    /// Ask the collaborators for production-grade minification
    #[serde(default)]
    pub production: bool,
    /// Dependency vendoring: 0 = off, 1 = `public/libs`, 2 = `js/libs`
    #[serde(default)]
    pub include_dependencies: u8,
}

/// Icon fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconsConfig {
    /// File name of the vector icon inside `img/`
    #[serde(default = "default_icon_source")]
    pub source: String,
    /// Square sizes to rasterize, in pixels
    #[serde(default = "default_icon_sizes")]
    pub sizes: Vec<u32>,
}

fn default_icon_source() -> String {
    "icon.svg".to_string()
}

fn default_icon_sizes() -> Vec<u32> {
    DEFAULT_ICON_SIZES.to_vec()
}

impl Default for IconsConfig {
    fn default() -> Self {
        Self { source: default_icon_source(), sizes: default_icon_sizes() }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: false }
    }
}

/// Which engine compiles the style sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StyleEngine {
    /// In-process Sass compilation (grass), then lightningcss
    #[default]
    Lightningcss,
    /// External Dart Sass CLI
    Sass,
}

/// External collaborator commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Script minifier
    #[serde(default = "default_esbuild")]
    pub esbuild: String,
    /// Markup minifier
    #[serde(default = "default_html_minifier")]
    pub html_minifier: String,
    /// Vector image optimizer
    #[serde(default = "default_svgo")]
    pub svgo: String,
    /// Vector to raster converter used for icons
    #[serde(default = "default_resvg")]
    pub resvg: String,
    /// Style engine
    #[serde(default)]
    pub styles: StyleEngine,
    /// Sass CLI, used when `styles = "sass"`
    #[serde(default = "default_sass")]
    pub sass: String,
}

fn default_esbuild() -> String {
    "esbuild".to_string()
}

fn default_html_minifier() -> String {
    "html-minifier-terser".to_string()
}

fn default_svgo() -> String {
    "svgo".to_string()
}

fn default_resvg() -> String {
    "resvg".to_string()
}

fn default_sass() -> String {
    "sass".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            esbuild: default_esbuild(),
            html_minifier: default_html_minifier(),
            svgo: default_svgo(),
            resvg: default_resvg(),
            styles: StyleEngine::default(),
            sass: default_sass(),
        }
    }
}

/// Completion notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Send desktop notifications when a command finishes
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Complete extpack.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtpackConfig {
    /// Directory layout
    #[serde(default)]
    pub project: ProjectConfig,
    /// Build flags
    #[serde(default)]
    pub build: BuildFlagsConfig,
    /// Icon fan-out
    #[serde(default)]
    pub icons: IconsConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// External tools
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Notifications
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "icons.sizes")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "extpack.toml: '{}' {}", self.field, self.message)
    }
}

impl ExtpackConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.build.include_dependencies > 2 {
            errors.push(ConfigValidationError {
                field: "build.include_dependencies".to_string(),
                message: "must be 0, 1 or 2".to_string(),
            });
        }

        if self.icons.sizes.is_empty() {
            errors.push(ConfigValidationError {
                field: "icons.sizes".to_string(),
                message: "must contain at least one size".to_string(),
            });
        }
        if self.icons.sizes.contains(&0) {
            errors.push(ConfigValidationError {
                field: "icons.sizes".to_string(),
                message: "sizes must be positive".to_string(),
            });
        }

        if self.icons.source.is_empty() {
            errors.push(ConfigValidationError {
                field: "icons.source".to_string(),
                message: "must be a non-empty file name".to_string(),
            });
        }

        if self.watch.debounce_ms < 10 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be at least 10".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
