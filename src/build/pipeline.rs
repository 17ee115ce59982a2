//! Build pipeline orchestration.
//!
//! The pipeline sequences the phases and exposes the composite operations:
//!
//! - **clear**: delete the artifact store
//! - **basic build**: manifest phase, then asset phase, then dependency phase
//! - **build**: clear, basic build, completion signal
//! - **package**: clear, basic build, one archive per format, completion signal
//! - **run steps**: re-run a subset of steps into the existing store (watch)
//!
//! A failure in the manifest phase stops the run; failures inside the asset
//! phase are isolated to their step and reported in the [`BuildResult`].

use crate::build::phase::{PhaseRunner, ASSET_PHASE, DEPENDENCY_PHASE, MANIFEST_PHASE};
use crate::build::{BuildContext, BuildResult, StepKind};
use crate::notifier::{Completion, CompletionSink, LogNotifier};
use crate::package::{self, PackageError};
use crate::transform::Toolchain;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Error that ends a build invocation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// The artifact or package store could not be deleted
    #[error("Failed to clear {}: {source}", .path.display())]
    Clear {
        /// Directory being cleared
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// A phase other steps depend on failed
    #[error("Phase '{phase}' failed, later phases not run: {message}")]
    PhaseFailed {
        /// Phase name
        phase: &'static str,
        /// Failure details
        message: String,
    },
    /// Packaging was refused because the build is incomplete
    #[error("Not packaging an incomplete build ({failed} failed steps)")]
    IncompleteBuild {
        /// Number of failed steps
        failed: usize,
        /// The build that failed
        result: BuildResult,
    },
    /// Archive creation failed
    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Outcome of the package operation.
#[derive(Debug)]
pub struct PackageOutcome {
    /// The build that was packaged
    pub build: BuildResult,
    /// Archives written, one per format
    pub archives: Vec<PathBuf>,
}

/// Delete a directory tree. A missing directory is not an error.
pub fn clear_dir(path: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "cleared");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BuildError::Clear { path: path.to_path_buf(), source }),
    }
}

/// Build pipeline for executing builds.
pub struct BuildPipeline {
    /// Build context
    context: BuildContext,
    /// Transformation collaborators
    toolchain: Toolchain,
    /// Completion signal receiver
    sink: Box<dyn CompletionSink>,
    /// Worker threads per phase (None = available parallelism)
    jobs: Option<usize>,
}

impl BuildPipeline {
    /// Create a new build pipeline that signals completion to the log.
    pub fn new(context: BuildContext, toolchain: Toolchain) -> Self {
        Self { context, toolchain, sink: Box::new(LogNotifier), jobs: None }
    }

    /// Set the completion sink.
    pub fn with_sink(mut self, sink: Box<dyn CompletionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set the number of worker threads per phase.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Get the build context.
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    fn runner(&self) -> PhaseRunner<'_> {
        let runner = PhaseRunner::new(&self.context, &self.toolchain);
        match self.jobs {
            Some(jobs) => runner.with_jobs(jobs),
            None => runner,
        }
    }

    /// Delete the artifact store.
    pub fn clear(&self) -> Result<(), BuildError> {
        clear_dir(self.context.out_dir())
    }

    /// Delete the package store.
    pub fn clear_packages(&self) -> Result<(), BuildError> {
        clear_dir(self.context.package_dir())
    }

    /// Run the three phases into the current store, without clearing.
    pub fn basic_build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let runner = self.runner();
        let mut result = BuildResult::new();

        let manifest = runner.run(MANIFEST_PHASE);
        if let Some(failed) = manifest.iter().find(|r| r.status.is_failure()) {
            return Err(BuildError::PhaseFailed {
                phase: "manifest",
                message: failed.status.to_string(),
            });
        }
        result.extend(manifest);

        result.extend(runner.run(ASSET_PHASE));
        result.extend(runner.run(DEPENDENCY_PHASE));

        Ok(result.with_duration(start.elapsed()))
    }

    fn clean_build(&self) -> Result<BuildResult, BuildError> {
        self.clear()?;
        self.basic_build()
    }

    /// Clear, build, then signal `completion`.
    pub fn build_with(&self, completion: Completion) -> Result<BuildResult, BuildError> {
        let result = self.clean_build()?;
        self.sink.complete(completion);
        Ok(result)
    }

    /// Clear and build, signalling "Build done!".
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        self.build_with(Completion::BUILD)
    }

    /// Clear, build and produce every archive format.
    ///
    /// Nothing is archived when any step failed; the completion signal is
    /// sent only after all archives exist.
    pub fn package(&self) -> Result<PackageOutcome, BuildError> {
        let build = self.clean_build()?;
        if !build.is_success() {
            return Err(BuildError::IncompleteBuild { failed: build.failed_count(), result: build });
        }

        let archives = package::package_all(&self.context)?;
        self.sink.complete(Completion::PACKAGE);
        Ok(PackageOutcome { build, archives })
    }

    /// Re-run `steps` concurrently into the existing store.
    ///
    /// Used by watch mode: the store is not cleared and outputs of other
    /// steps are left alone.
    pub fn run_steps(&self, steps: &[StepKind]) -> BuildResult {
        let start = Instant::now();
        let mut result = BuildResult::new();
        result.extend(self.runner().run(steps));
        result.with_duration(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::transform::{Rasterize, Transform, TransformError, TransformJob};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct CopyTool;

    impl Transform for CopyTool {
        fn name(&self) -> &str {
            "copy"
        }

        fn transform(&self, job: &TransformJob<'_>) -> Result<Vec<PathBuf>, TransformError> {
            fs::copy(job.source, job.dest).map_err(|e| TransformError::io(job.source, e))?;
            Ok(vec![job.dest.to_path_buf()])
        }
    }

    struct Broken;

    impl Transform for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn transform(&self, job: &TransformJob<'_>) -> Result<Vec<PathBuf>, TransformError> {
            Err(TransformError::invalid(job.source, "broken"))
        }
    }

    impl Rasterize for CopyTool {
        fn name(&self) -> &str {
            "copy"
        }

        fn rasterize(&self, svg: &Path, _size: u32, _dest: &Path) -> Result<(), TransformError> {
            Err(TransformError::invalid(svg, "no rasterizer in this test"))
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl CompletionSink for Recorder {
        fn notify(&self, title: &str, _message: &str) {
            self.0.lock().unwrap().push(title.to_string());
        }
    }

    fn toolchain(styles: Box<dyn Transform>) -> Toolchain {
        Toolchain {
            markup: Box::new(CopyTool),
            styles,
            scripts: Box::new(CopyTool),
            vectors: Box::new(CopyTool),
            rasterizer: Box::new(CopyTool),
        }
    }

    fn create_test_file(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "src/manifest.json", r#"{"name":"ext","version":"1.2.3"}"#);
        create_test_file(temp.path(), "src/html/popup.html", "<p></p>");
        create_test_file(temp.path(), "src/scss/main.scss", "a{}");
        temp
    }

    fn pipeline(temp: &TempDir, styles: Box<dyn Transform>, recorder: &Recorder) -> BuildPipeline {
        let ctx = BuildContext::new(&default_config(), temp.path().to_path_buf());
        BuildPipeline::new(ctx, toolchain(styles)).with_sink(Box::new(recorder.clone()))
    }

    #[test]
    fn test_clear_dir_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        assert!(clear_dir(&temp.path().join("dist")).is_ok());
    }

    #[test]
    fn test_build_removes_stale_files() {
        let temp = project();
        create_test_file(temp.path(), "dist/stale.txt", "old");
        let recorder = Recorder::default();

        let result = pipeline(&temp, Box::new(CopyTool), &recorder).build().unwrap();

        assert!(result.is_success());
        assert!(!temp.path().join("dist/stale.txt").exists());
        assert!(temp.path().join("dist/html/popup.html").is_file());
        assert_eq!(recorder.0.lock().unwrap().as_slice(), &["Build done!".to_string()]);
    }

    #[test]
    fn test_manifest_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "src/html/popup.html", "<p></p>");
        let recorder = Recorder::default();

        let err = pipeline(&temp, Box::new(CopyTool), &recorder).build().unwrap_err();

        assert!(matches!(err, BuildError::PhaseFailed { phase: "manifest", .. }));
        assert!(!temp.path().join("dist/html").exists());
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_asset_failure_is_isolated() {
        let temp = project();
        let recorder = Recorder::default();

        let result = pipeline(&temp, Box::new(Broken), &recorder).build().unwrap();

        assert_eq!(result.failed_count(), 1);
        assert!(result.step(StepKind::Styles).unwrap().status.is_failure());
        assert!(temp.path().join("dist/html/popup.html").is_file());
    }

    #[test]
    fn test_package_refuses_failed_build() {
        let temp = project();
        let recorder = Recorder::default();

        let err = pipeline(&temp, Box::new(Broken), &recorder).package().unwrap_err();

        assert!(matches!(err, BuildError::IncompleteBuild { failed: 1, .. }));
        assert!(!temp.path().join("package").exists());
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_package_writes_both_formats() {
        let temp = project();
        let recorder = Recorder::default();

        let outcome = pipeline(&temp, Box::new(CopyTool), &recorder).package().unwrap();

        assert_eq!(outcome.archives.len(), 2);
        assert!(temp.path().join("package/ext_1.2.3.zip").is_file());
        assert!(temp.path().join("package/ext_1.2.3.xpi").is_file());
        assert_eq!(recorder.0.lock().unwrap().as_slice(), &["Packages are zipped.".to_string()]);
    }

    #[test]
    fn test_run_steps_does_not_clear() {
        let temp = project();
        create_test_file(temp.path(), "dist/keep.txt", "keep");
        let recorder = Recorder::default();

        let result = pipeline(&temp, Box::new(CopyTool), &recorder).run_steps(&[StepKind::Styles]);

        assert!(result.is_success());
        assert!(temp.path().join("dist/keep.txt").is_file());
        assert!(temp.path().join("dist/css/main.min.css").is_file());
        assert!(!temp.path().join("dist/html").exists());
    }

    #[test]
    fn test_clear_packages() {
        let temp = project();
        create_test_file(temp.path(), "package/old_1.0.zip", "zip");
        let recorder = Recorder::default();

        pipeline(&temp, Box::new(CopyTool), &recorder).clear_packages().unwrap();
        assert!(!temp.path().join("package").exists());
    }
}
