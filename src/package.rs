//! Installer archives.
//!
//! The whole artifact store is compressed into one archive per
//! [`ArchiveFormat`]. The archive is named from the manifest already copied
//! into the store, so packaging a store without a manifest is refused
//! before anything is written.
//!
//! Entries are added in sorted order with a fixed timestamp and fixed
//! permissions, which makes every format produced from one store snapshot
//! byte-identical.

use crate::build::BuildContext;
use crate::manifest::{ExtensionManifest, ManifestError};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Installer format to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Browser store upload (`.zip`)
    Browser,
    /// Mail client add-on (`.xpi`)
    MailClient,
}

impl ArchiveFormat {
    /// Every format produced by `package`.
    pub const ALL: [ArchiveFormat; 2] = [ArchiveFormat::Browser, ArchiveFormat::MailClient];

    /// File extension including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Browser => ".zip",
            ArchiveFormat::MailClient => ".xpi",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveFormat::Browser => write!(f, "browser"),
            ArchiveFormat::MailClient => write!(f, "mail client"),
        }
    }
}

/// Error while producing an archive.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PackageError {
    /// The store has no manifest; the build has not run (or failed)
    #[error("No manifest in {}; run a build before packaging", .path.display())]
    MissingManifest {
        /// Expected manifest path
        path: PathBuf,
    },
    /// The store manifest could not be read
    #[error(transparent)]
    Manifest(ManifestError),
    /// Archive writer error
    #[error("Failed to write archive {path}: {source}")]
    Zip {
        /// Archive path
        path: String,
        /// Underlying error
        source: zip::result::ZipError,
    },
    /// File system error
    #[error("{path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying error
        source: io::Error,
    },
}

impl PackageError {
    fn io(path: &Path, source: io::Error) -> Self {
        PackageError::Io { path: path.display().to_string(), source }
    }
}

/// Archive file name for a manifest: `{name}_{version}{extension}`.
pub fn archive_name(manifest: &ExtensionManifest, format: ArchiveFormat) -> String {
    format!("{}{}", manifest.package_stem(), format.extension())
}

/// Read the manifest from the artifact store.
fn built_manifest(ctx: &BuildContext) -> Result<ExtensionManifest, PackageError> {
    let path = ctx.built_manifest();
    ExtensionManifest::load(&path).map_err(|e| {
        if e.is_missing() {
            PackageError::MissingManifest { path }
        } else {
            PackageError::Manifest(e)
        }
    })
}

/// Produce one archive of the artifact store.
///
/// Returns the path of the archive in the package store.
pub fn package(ctx: &BuildContext, format: ArchiveFormat) -> Result<PathBuf, PackageError> {
    let manifest = built_manifest(ctx)?;
    let package_dir = ctx.package_dir();
    fs::create_dir_all(package_dir).map_err(|e| PackageError::io(package_dir, e))?;

    let name = archive_name(&manifest, format);
    let archive = package_dir.join(&name);
    let partial = package_dir.join(format!("{}.partial", name));

    if let Err(e) = write_archive(ctx.out_dir(), package_dir, &partial) {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }
    fs::rename(&partial, &archive).map_err(|e| PackageError::io(&archive, e))?;

    tracing::info!(format = %format, path = %archive.display(), "package written");
    Ok(archive)
}

/// Produce every [`ArchiveFormat`] from the same store snapshot.
pub fn package_all(ctx: &BuildContext) -> Result<Vec<PathBuf>, PackageError> {
    ArchiveFormat::ALL.iter().map(|&format| package(ctx, format)).collect()
}

/// Sorted store files as `(absolute, archive name)` pairs.
fn store_entries(store: &Path, skip: &Path) -> Result<Vec<(PathBuf, String)>, PackageError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(store).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(store).to_path_buf();
            PackageError::io(&path, e.into())
        })?;
        if !entry.file_type().is_file() || entry.path().starts_with(skip) {
            continue;
        }
        let relative = entry.path().strip_prefix(store).unwrap_or(entry.path());
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((entry.path().to_path_buf(), name));
    }
    entries.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(entries)
}

fn write_archive(store: &Path, package_dir: &Path, dest: &Path) -> Result<(), PackageError> {
    let zip_err =
        |source: zip::result::ZipError| PackageError::Zip { path: dest.display().to_string(), source };

    let entries = store_entries(store, package_dir)?;
    let file = File::create(dest).map_err(|e| PackageError::io(dest, e))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    for (path, name) in &entries {
        tracing::trace!(entry = %name, "adding to archive");
        writer.start_file(name.as_str(), options).map_err(zip_err)?;
        let mut source = File::open(path).map_err(|e| PackageError::io(path, e))?;
        io::copy(&mut source, &mut writer).map_err(|e| PackageError::io(path, e))?;
    }

    let mut inner = writer.finish().map_err(zip_err)?;
    io::Write::flush(&mut inner).map_err(|e| PackageError::io(dest, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::io::Read;
    use tempfile::TempDir;

    fn create_test_file(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn context(temp: &TempDir) -> BuildContext {
        BuildContext::new(&default_config(), temp.path().to_path_buf())
    }

    #[test]
    fn test_archive_format_extension() {
        assert_eq!(ArchiveFormat::Browser.extension(), ".zip");
        assert_eq!(ArchiveFormat::MailClient.extension(), ".xpi");
    }

    #[test]
    fn test_archive_name() {
        let manifest = ExtensionManifest::parse(r#"{"name": "ext", "version": "1.2.3"}"#).unwrap();
        assert_eq!(archive_name(&manifest, ArchiveFormat::Browser), "ext_1.2.3.zip");
        assert_eq!(archive_name(&manifest, ArchiveFormat::MailClient), "ext_1.2.3.xpi");
    }

    #[test]
    fn test_package_without_manifest_writes_nothing() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "dist/js/content.js", "x");
        let ctx = context(&temp);

        let err = package(&ctx, ArchiveFormat::Browser).unwrap_err();

        assert!(matches!(err, PackageError::MissingManifest { .. }));
        let archives = fs::read_dir(ctx.package_dir()).map(|d| d.count()).unwrap_or(0);
        assert_eq!(archives, 0);
    }

    #[test]
    fn test_package_invalid_manifest() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "dist/manifest.json", "{}");

        let err = package(&context(&temp), ArchiveFormat::Browser).unwrap_err();
        assert!(matches!(err, PackageError::Manifest(_)));
    }

    #[test]
    fn test_package_contains_whole_store() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "dist/manifest.json", r#"{"name":"ext","version":"1.2.3"}"#);
        create_test_file(temp.path(), "dist/js/content.js", "console.log(1)");
        create_test_file(temp.path(), "dist/img/icons/icon16.png", "png");
        let ctx = context(&temp);

        let path = package(&ctx, ArchiveFormat::Browser).unwrap();
        assert_eq!(path, temp.path().join("package/ext_1.2.3.zip"));

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(names, vec!["img/icons/icon16.png", "js/content.js", "manifest.json"]);

        let mut content = String::new();
        archive.by_name("js/content.js").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "console.log(1)");
    }

    #[test]
    fn test_package_all_formats_identical() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "dist/manifest.json", r#"{"name":"ext","version":"1.2.3"}"#);
        create_test_file(temp.path(), "dist/background.js", "bg");

        let paths = package_all(&context(&temp)).unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("ext_1.2.3.zip"));
        assert!(paths[1].ends_with("ext_1.2.3.xpi"));
        assert_eq!(fs::read(&paths[0]).unwrap(), fs::read(&paths[1]).unwrap());
    }

    #[test]
    fn test_package_store_inside_artifact_store_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut config = default_config();
        config.project.package = PathBuf::from("dist/package");
        create_test_file(temp.path(), "dist/manifest.json", r#"{"name":"ext","version":"1"}"#);
        let ctx = BuildContext::new(&config, temp.path().to_path_buf());

        package(&ctx, ArchiveFormat::Browser).unwrap();
        let path = package(&ctx, ArchiveFormat::MailClient).unwrap();

        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }
}
