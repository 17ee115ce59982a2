//! Extension manifest (`manifest.json`) reading.
//!
//! Only the fields the pipeline needs are modelled: the name and version
//! that name the packages, and the background service worker that is
//! bundled separately from content scripts. Unknown fields are ignored.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// File name of the extension manifest, both in the source tree and the store.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Error while reading an extension manifest.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// The manifest could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Manifest path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
    /// The manifest is not valid JSON or lacks required fields
    #[error("Invalid manifest {path}: {source}")]
    Json {
        /// Manifest path
        path: String,
        /// Underlying error
        source: serde_json::Error,
    },
}

impl ManifestError {
    /// Whether the manifest file does not exist at all.
    pub fn is_missing(&self) -> bool {
        matches!(self, ManifestError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// `background` section of a manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Background {
    /// Background service worker script (Manifest V3)
    #[serde(default)]
    pub service_worker: Option<String>,
}

/// The subset of `manifest.json` used by the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionManifest {
    /// Extension name
    pub name: String,
    /// Extension version
    pub version: String,
    /// Background declaration, if any
    #[serde(default)]
    pub background: Option<Background>,
}

impl ExtensionManifest {
    /// Load and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = fs::read_to_string(path)
            .map_err(|source| ManifestError::Io { path: path.display().to_string(), source })?;
        Self::parse(&contents)
            .map_err(|source| ManifestError::Json { path: path.display().to_string(), source })
    }

    /// Parse manifest JSON.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Path of the background service worker relative to the extension
    /// root, if declared. Leading `./` and `/` are dropped.
    pub fn background_script(&self) -> Option<&str> {
        self.background
            .as_ref()
            .and_then(|b| b.service_worker.as_deref())
            .map(extension_relative)
            .filter(|s| !s.is_empty())
    }

    /// Archive file stem: `{name}_{version}`.
    ///
    /// Path separators in the name are replaced so the archive always lands
    /// directly in the package store.
    pub fn package_stem(&self) -> String {
        let name: String =
            self.name.chars().map(|c| if c == '/' || c == '\\' { '_' } else { c }).collect();
        format!("{}_{}", name, self.version)
    }
}

/// Strip the `./` and `/` prefixes a manifest may use for root-relative paths.
fn extension_relative(mut path: &str) -> &str {
    loop {
        let trimmed = path.trim_start_matches("./").trim_start_matches('/');
        if trimmed == path {
            return path;
        }
        path = trimmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_manifest_with_background() {
        let manifest = ExtensionManifest::parse(
            r#"{
                "manifest_version": 3,
                "name": "ext",
                "version": "1.2.3",
                "background": { "service_worker": "background.js" },
                "permissions": ["storage"]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.name, "ext");
        assert_eq!(manifest.version, "1.2.3");
        assert_eq!(manifest.background_script(), Some("background.js"));
        assert_eq!(manifest.package_stem(), "ext_1.2.3");
    }

    #[test]
    fn test_background_script_is_extension_relative() {
        for (declared, expected) in [
            ("/background.js", Some("background.js")),
            ("./js/bg.js", Some("js/bg.js")),
            ("/./js/bg.js", Some("js/bg.js")),
            ("js/bg.js", Some("js/bg.js")),
            ("/", None),
        ] {
            let json = format!(
                r#"{{"name": "ext", "version": "1", "background": {{"service_worker": "{}"}}}}"#,
                declared
            );
            let manifest = ExtensionManifest::parse(&json).unwrap();
            assert_eq!(manifest.background_script(), expected, "declared {}", declared);
        }
    }

    #[test]
    fn test_parse_manifest_without_background() {
        let manifest = ExtensionManifest::parse(r#"{"name": "ext", "version": "0.1"}"#).unwrap();
        assert_eq!(manifest.background_script(), None);
    }

    #[test]
    fn test_empty_service_worker_is_none() {
        let manifest = ExtensionManifest::parse(
            r#"{"name": "ext", "version": "0.1", "background": {"service_worker": ""}}"#,
        )
        .unwrap();
        assert_eq!(manifest.background_script(), None);
    }

    #[test]
    fn test_parse_manifest_missing_version() {
        assert!(ExtensionManifest::parse(r#"{"name": "ext"}"#).is_err());
    }

    #[test]
    fn test_package_stem_replaces_separators() {
        let manifest = ExtensionManifest::parse(r#"{"name": "a/b\\c", "version": "2"}"#).unwrap();
        assert_eq!(manifest.package_stem(), "a_b_c_2");
    }

    #[test]
    fn test_load_missing_manifest() {
        let temp = TempDir::new().unwrap();
        let err = ExtensionManifest::load(&temp.path().join(MANIFEST_FILENAME)).unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_load_invalid_manifest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MANIFEST_FILENAME);
        fs::write(&path, "{ not json").unwrap();

        let err = ExtensionManifest::load(&path).unwrap_err();
        assert!(!err.is_missing());
        assert!(matches!(err, ManifestError::Json { .. }));
    }
}
