//! Build context: the resolved, immutable settings of one invocation.

use crate::config::{resolve_path, ExtpackConfig, WatchConfig};
use crate::deps::PackagingMode;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// Constructed once per command from the loaded configuration and CLI
/// overrides, then passed by reference to every step. Paths are absolute
/// (resolved against the project root).
#[derive(Debug, Clone)]
pub struct BuildContext {
    project_root: PathBuf,
    src_dir: PathBuf,
    out_dir: PathBuf,
    package_dir: PathBuf,
    node_modules: PathBuf,
    package_json: PathBuf,
    production: bool,
    packaging_mode: PackagingMode,
    icon_source: String,
    icon_sizes: Vec<u32>,
    watch: WatchConfig,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The loaded (and validated) configuration
    /// - `project_root` - The project root directory
    pub fn new(config: &ExtpackConfig, project_root: PathBuf) -> Self {
        let project = &config.project;
        Self {
            src_dir: resolve_path(&project_root, &project.src),
            out_dir: resolve_path(&project_root, &project.out),
            package_dir: resolve_path(&project_root, &project.package),
            node_modules: resolve_path(&project_root, &project.node_modules),
            package_json: resolve_path(&project_root, &project.package_json),
            production: config.build.production,
            packaging_mode: PackagingMode::from_flag(config.build.include_dependencies)
                .unwrap_or_default(),
            icon_source: config.icons.source.clone(),
            icon_sizes: config.icons.sizes.clone(),
            watch: config.watch.clone(),
            project_root,
        }
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Source tree root.
    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    /// Artifact store root.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Package store directory.
    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    /// Installed third-party packages.
    pub fn node_modules(&self) -> &Path {
        &self.node_modules
    }

    /// Package descriptor listing dependencies.
    pub fn package_json(&self) -> &Path {
        &self.package_json
    }

    /// Whether production-grade minification is requested.
    pub fn is_production(&self) -> bool {
        self.production
    }

    /// Active dependency vendoring mode.
    pub fn packaging_mode(&self) -> PackagingMode {
        self.packaging_mode
    }

    /// File name of the vector icon inside `img/`.
    pub fn icon_source(&self) -> &str {
        &self.icon_source
    }

    /// Icon sizes, ascending.
    pub fn icon_sizes(&self) -> &[u32] {
        &self.icon_sizes
    }

    /// Watch settings.
    pub fn watch_config(&self) -> &WatchConfig {
        &self.watch
    }

    /// Path of the manifest in the source tree.
    pub fn source_manifest(&self) -> PathBuf {
        self.src_dir.join(crate::manifest::MANIFEST_FILENAME)
    }

    /// Path of the manifest in the artifact store.
    pub fn built_manifest(&self) -> PathBuf {
        self.out_dir.join(crate::manifest::MANIFEST_FILENAME)
    }

    /// Set production mode.
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Set the dependency vendoring mode.
    pub fn with_packaging_mode(mut self, mode: PackagingMode) -> Self {
        self.packaging_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    #[test]
    fn test_build_context_resolves_defaults() {
        let ctx = BuildContext::new(&default_config(), PathBuf::from("/project"));

        assert_eq!(ctx.project_root(), Path::new("/project"));
        assert_eq!(ctx.src_dir(), Path::new("/project/src"));
        assert_eq!(ctx.out_dir(), Path::new("/project/dist"));
        assert_eq!(ctx.package_dir(), Path::new("/project/package"));
        assert_eq!(ctx.node_modules(), Path::new("/project/node_modules"));
        assert_eq!(ctx.package_json(), Path::new("/project/package.json"));
        assert_eq!(ctx.built_manifest(), PathBuf::from("/project/dist/manifest.json"));
        assert!(!ctx.is_production());
        assert_eq!(ctx.packaging_mode(), PackagingMode::Disabled);
        assert_eq!(ctx.icon_sizes(), &[16, 24, 32, 48, 128]);
    }

    #[test]
    fn test_build_context_absolute_paths_kept() {
        let mut config = default_config();
        config.project.out = PathBuf::from("/tmp/out");
        let ctx = BuildContext::new(&config, PathBuf::from("/project"));

        assert_eq!(ctx.out_dir(), Path::new("/tmp/out"));
    }

    #[test]
    fn test_build_context_flags() {
        let mut config = default_config();
        config.build.production = true;
        config.build.include_dependencies = 2;
        let ctx = BuildContext::new(&config, PathBuf::from("/project"));

        assert!(ctx.is_production());
        assert_eq!(ctx.packaging_mode(), PackagingMode::ContentScripts);
    }

    #[test]
    fn test_build_context_builders() {
        let ctx = BuildContext::new(&default_config(), PathBuf::from("/project"))
            .with_production(true)
            .with_packaging_mode(PackagingMode::PublicAssets);

        assert!(ctx.is_production());
        assert_eq!(ctx.packaging_mode(), PackagingMode::PublicAssets);
    }
}
