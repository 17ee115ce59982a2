//! Source file discovery for the build steps.
//!
//! Each step names its inputs as glob patterns relative to the source tree.
//! Discovery expands them, keeps regular files only and filters out the
//! inputs a step must not process on its own (Sass partials, test scripts,
//! the background script among content scripts).

use glob::{glob, Pattern};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Pattern as written
        pattern: String,
        /// Underlying error
        source: glob::PatternError,
    },
}

/// Discover source files matching a glob pattern.
///
/// # Arguments
/// - `base_dir` - Base directory to resolve patterns from
/// - `pattern` - Glob pattern to match
///
/// # Returns
/// Sorted list of matching regular files. A missing base directory yields
/// an empty list.
pub fn discover_files(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let full_pattern = format!("{}/{}", Pattern::escape(&base_dir.to_string_lossy()), pattern);

    let paths = glob(&full_pattern).map_err(|source| DiscoveryError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("error reading path: {}", e);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Discover files for several patterns, deduplicated and sorted.
pub fn discover_all(base_dir: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = Vec::new();
    for pattern in patterns {
        files.extend(discover_files(base_dir, pattern)?);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Sass partials (`_name.scss`) are only compiled through an import.
pub fn is_partial(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with('_'))
}

/// Script test files (`*.test.js`) are never shipped.
pub fn is_test_script(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(".test.js"))
}

/// Style sources under `scss/`, without partials.
pub fn style_sources(src_dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    Ok(discover_files(src_dir, "scss/**/*.scss")?.into_iter().filter(|p| !is_partial(p)).collect())
}

/// Content scripts under `js/`, without tests and without the background
/// script (given relative to the source tree, as returned by
/// [`ExtensionManifest::background_script`](crate::manifest::ExtensionManifest::background_script)).
pub fn content_script_sources(
    src_dir: &Path,
    background: Option<&str>,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let background = background.map(|b| src_dir.join(b));
    Ok(discover_files(src_dir, "js/**/*.js")?
        .into_iter()
        .filter(|p| !is_test_script(p))
        .filter(|p| Some(p) != background.as_ref())
        .collect())
}

/// `path` relative to `base`, or the file name if it lies outside `base`.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default())
}
