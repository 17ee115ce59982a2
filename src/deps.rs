//! Dependency vendoring.
//!
//! Third-party packages declared in `package.json` are resolved against
//! `node_modules/` and, depending on the [`PackagingMode`], copied into the
//! artifact store. Resolution follows the npm "dist" convention: a package
//! that ships a `dist/` directory contributes only that directory, any other
//! package contributes all its files. Either way source maps, sources, docs,
//! tests and metadata are left out.

use crate::build::BuildContext;
use glob::{MatchOptions, Pattern};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Distribution directory name stripped from vendored paths.
const DIST_DIR: &str = "dist";

/// Files never vendored, matched relative to the walked directory and by file name.
const EXCLUDED: &[&str] = &[
    "node_modules/**",
    "src/**",
    "test/**",
    "tests/**",
    "__tests__/**",
    "docs/**",
    "doc/**",
    "example/**",
    "examples/**",
    "demo/**",
    "spec/**",
    "benchmark/**",
    "*.map",
    "*.md",
    "*.markdown",
    "*.ts",
    "*.scss",
    "*.sass",
    "*.less",
    "*.coffee",
    "*.yml",
    "*.yaml",
    "*.log",
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "LICENSE*",
    "LICENCE*",
    "README*",
    "CHANGELOG*",
    ".*",
];

/// Where, if anywhere, dependency files are vendored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackagingMode {
    /// No vendoring; neither destination is touched
    #[default]
    Disabled,
    /// Vendor into `public/libs/`
    PublicAssets,
    /// Vendor into `js/libs/`
    ContentScripts,
}

impl PackagingMode {
    /// Map the numeric flag (`0`, `1`, `2`) to a mode.
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(PackagingMode::Disabled),
            1 => Some(PackagingMode::PublicAssets),
            2 => Some(PackagingMode::ContentScripts),
            _ => None,
        }
    }

    /// Destination root relative to the artifact store.
    pub fn destination(self) -> Option<PathBuf> {
        match self {
            PackagingMode::Disabled => None,
            PackagingMode::PublicAssets => Some(Path::new("public").join("libs")),
            PackagingMode::ContentScripts => Some(Path::new("js").join("libs")),
        }
    }
}

impl std::fmt::Display for PackagingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackagingMode::Disabled => write!(f, "disabled"),
            PackagingMode::PublicAssets => write!(f, "public/libs"),
            PackagingMode::ContentScripts => write!(f, "js/libs"),
        }
    }
}

/// Error while resolving or vendoring dependencies.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DependencyError {
    /// `package.json` exists but is not valid
    #[error("Invalid package descriptor {path}: {source}")]
    Descriptor {
        /// Descriptor path
        path: String,
        /// Underlying error
        source: serde_json::Error,
    },
    /// A declared dependency is not installed
    #[error("Dependency '{name}' is not installed (run 'npm install')")]
    NotInstalled {
        /// Package name
        name: String,
    },
    /// File system error
    #[error("{path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
}

impl DependencyError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        DependencyError::Io { path: path.display().to_string(), source }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PackageDescriptor {
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

/// One resolved third-party file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendoredFile {
    /// Absolute path inside `node_modules/`
    pub source: PathBuf,
    /// Path relative to `node_modules/`, `/`-separated
    pub relative: String,
}

impl VendoredFile {
    /// Destination relative to the vendoring root.
    pub fn destination(&self) -> PathBuf {
        strip_dist(&self.relative)
    }
}

/// Remove the first `dist` segment from a distribution-relative path.
///
/// Both `/` and `\` are accepted as separators, so the result does not
/// depend on the host that produced the path.
///
/// ```
/// use extpack::deps::strip_dist;
/// use std::path::PathBuf;
///
/// assert_eq!(strip_dist("jquery/dist/jquery.min.js"), PathBuf::from("jquery/jquery.min.js"));
/// assert_eq!(strip_dist("lodash\\lodash.js"), PathBuf::from("lodash/lodash.js"));
/// ```
pub fn strip_dist(relative: &str) -> PathBuf {
    let mut stripped = false;
    relative
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .filter(|segment| {
            if !stripped && *segment == DIST_DIR {
                stripped = true;
                false
            } else {
                true
            }
        })
        .collect()
}

/// Resolve the dependency set declared in `package_json`.
///
/// A missing descriptor is an empty set. Files are returned sorted by
/// their relative path.
pub fn resolve_dependencies(
    package_json: &Path,
    node_modules: &Path,
) -> Result<Vec<VendoredFile>, DependencyError> {
    let contents = match fs::read_to_string(package_json) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %package_json.display(), "no package descriptor");
            return Ok(vec![]);
        }
        Err(e) => return Err(DependencyError::io(package_json, e)),
    };
    let descriptor: PackageDescriptor = serde_json::from_str(&contents).map_err(|source| {
        DependencyError::Descriptor { path: package_json.display().to_string(), source }
    })?;

    let excluded: Vec<Pattern> = EXCLUDED.iter().filter_map(|p| Pattern::new(p).ok()).collect();
    let mut files = Vec::new();

    for name in descriptor.dependencies.keys() {
        let package_dir = node_modules.join(name);
        if !package_dir.is_dir() {
            return Err(DependencyError::NotInstalled { name: name.clone() });
        }

        let dist_dir = package_dir.join(DIST_DIR);
        let walk_root = if dist_dir.is_dir() { dist_dir } else { package_dir.clone() };

        for entry in WalkDir::new(&walk_root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&walk_root).to_path_buf();
                DependencyError::io(&path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            if is_excluded(&relative_slashed(entry.path(), &walk_root), &excluded) {
                continue;
            }

            files.push(VendoredFile {
                source: entry.path().to_path_buf(),
                relative: relative_slashed(entry.path(), node_modules),
            });
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

fn relative_slashed(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_excluded(relative: &str, patterns: &[Pattern]) -> bool {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    patterns
        .iter()
        .any(|p| p.matches_with(relative, options) || p.matches_with(file_name, options))
}

/// Vendor the resolved dependency set into the artifact store.
///
/// Returns the files written. With [`PackagingMode::Disabled`] nothing is
/// read or written; an empty dependency set is reported and is not an
/// error.
pub fn vendor(ctx: &BuildContext) -> Result<Vec<PathBuf>, DependencyError> {
    let Some(destination) = ctx.packaging_mode().destination() else {
        tracing::debug!("dependency vendoring disabled");
        return Ok(vec![]);
    };

    let files = resolve_dependencies(ctx.package_json(), ctx.node_modules())?;
    if files.is_empty() {
        tracing::info!("There is no dependency to be included.");
        tracing::info!("Use 'npm i <package_name>' to install dependencies.");
        return Ok(vec![]);
    }

    let root = ctx.out_dir().join(destination);
    let mut written = Vec::with_capacity(files.len());
    for file in &files {
        let dest = root.join(file.destination());
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| DependencyError::io(parent, e))?;
        }
        fs::copy(&file.source, &dest).map_err(|e| DependencyError::io(&file.source, e))?;
        written.push(dest);
    }

    tracing::debug!(count = written.len(), mode = %ctx.packaging_mode(), "vendored dependencies");
    Ok(written)
}
