//! Content transformation collaborators.
//!
//! The pipeline decides *when* a file is transformed and *where* the result
//! goes; the collaborators here decide *how*. Each one implements
//! [`Transform`] (one source file in, one or more output files out) or
//! [`Rasterize`] for the icon fan-out, so any tool can be plugged in:
//!
//! - styles: in-process grass + lightningcss ([`css::LightningCss`]) or the Sass CLI
//! - scripts: esbuild CLI
//! - markup: html-minifier-terser CLI
//! - vector images: svgo CLI
//! - icons: resvg CLI, size-checked with the `image` crate
//!
//! A [`Toolchain`] bundles one collaborator per role and is built from the
//! `[tools]` configuration; tests swap in in-process fakes.

pub mod command;
pub mod css;
pub mod icons;

use crate::config::{StyleEngine, ToolsConfig};
use std::path::{Path, PathBuf};

pub use command::{CommandTool, Esbuild, HtmlMinifier, Resvg, SassCli, Svgo};
pub use css::LightningCss;
pub use icons::{icon_file_name, rasterize_icons};

/// Error raised by a collaborator for a single input.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransformError {
    /// The external tool is not installed
    #[error("'{tool}' not found (looked in node_modules/.bin and PATH)")]
    ToolNotFound {
        /// Tool name as configured
        tool: String,
    },
    /// The external tool ran and reported failure
    #[error("'{tool}' failed on {input} ({status}): {stderr}")]
    ToolFailed {
        /// Tool name
        tool: String,
        /// Input file
        input: String,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },
    /// The input could not be processed
    #[error("{input}: {message}")]
    InvalidInput {
        /// Input file
        input: String,
        /// What went wrong
        message: String,
    },
    /// File system error while reading input or writing output
    #[error("{path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
}

impl TransformError {
    /// Build an [`TransformError::InvalidInput`] for a path.
    pub fn invalid(input: &Path, message: impl Into<String>) -> Self {
        TransformError::InvalidInput { input: input.display().to_string(), message: message.into() }
    }

    /// Build an [`TransformError::Io`] for a path.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        TransformError::Io { path: path.display().to_string(), source }
    }
}

/// One unit of work for a [`Transform`].
#[derive(Debug, Clone, Copy)]
pub struct TransformJob<'a> {
    /// Source file (read-only)
    pub source: &'a Path,
    /// Primary output file; its parent directory already exists
    pub dest: &'a Path,
    /// Production-grade minification requested
    pub production: bool,
}

/// A file-to-file content transformation.
pub trait Transform: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Transform `job.source` into `job.dest` (and possibly sibling files).
    ///
    /// Returns every file written.
    fn transform(&self, job: &TransformJob<'_>) -> Result<Vec<PathBuf>, TransformError>;
}

/// Vector to raster conversion for a single square size.
pub trait Rasterize: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Render `svg` as a `size`x`size` PNG at `dest`.
    fn rasterize(&self, svg: &Path, size: u32, dest: &Path) -> Result<(), TransformError>;
}

/// One collaborator per transformation role.
pub struct Toolchain {
    /// HTML minification
    pub markup: Box<dyn Transform>,
    /// Style compilation and minification
    pub styles: Box<dyn Transform>,
    /// Script minification
    pub scripts: Box<dyn Transform>,
    /// SVG optimization
    pub vectors: Box<dyn Transform>,
    /// Icon rasterization
    pub rasterizer: Box<dyn Rasterize>,
}

impl Toolchain {
    /// Build the default toolchain from the `[tools]` section.
    ///
    /// External tools are looked up lazily, so a missing tool only fails the
    /// steps that need it.
    pub fn from_config(tools: &ToolsConfig, project_root: &Path) -> Self {
        let tool = |program: &str| CommandTool::new(program, project_root);

        let styles: Box<dyn Transform> = match tools.styles {
            StyleEngine::Lightningcss => {
                Box::new(LightningCss::new().with_load_path(project_root.join("node_modules")))
            }
            StyleEngine::Sass => Box::new(SassCli::new(tool(&tools.sass))),
        };

        Self {
            markup: Box::new(HtmlMinifier::new(tool(&tools.html_minifier))),
            styles,
            scripts: Box::new(Esbuild::new(tool(&tools.esbuild))),
            vectors: Box::new(Svgo::new(tool(&tools.svgo))),
            rasterizer: Box::new(Resvg::new(tool(&tools.resvg))),
        }
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain")
            .field("markup", &self.markup.name())
            .field("styles", &self.styles.name())
            .field("scripts", &self.scripts.name())
            .field("vectors", &self.vectors.name())
            .field("rasterizer", &self.rasterizer.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toolchain_from_default_config() {
        let chain = Toolchain::from_config(&ToolsConfig::default(), Path::new("/project"));

        assert_eq!(chain.styles.name(), "lightningcss");
        assert_eq!(chain.scripts.name(), "esbuild");
        assert_eq!(chain.markup.name(), "html-minifier-terser");
        assert_eq!(chain.vectors.name(), "svgo");
        assert_eq!(chain.rasterizer.name(), "resvg");
    }

    #[test]
    fn test_toolchain_sass_engine() {
        let tools = ToolsConfig { styles: StyleEngine::Sass, ..ToolsConfig::default() };
        let chain = Toolchain::from_config(&tools, Path::new("/project"));
        assert_eq!(chain.styles.name(), "sass");
    }

    #[test]
    fn test_transform_error_display() {
        let err = TransformError::invalid(Path::new("scss/main.scss"), "unexpected token");
        assert_eq!(err.to_string(), "scss/main.scss: unexpected token");

        let err = TransformError::ToolNotFound { tool: "esbuild".to_string() };
        assert!(err.to_string().contains("esbuild"));
    }
}
