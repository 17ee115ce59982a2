//! Build steps.
//!
//! A step turns one family of source files into store outputs. Steps never
//! return errors to the scheduler: every failure is captured in the
//! [`StepResult`], so a broken stylesheet cannot stop the icons from being
//! written. Multi-file steps keep going after a bad file and report all
//! failures together.

use crate::build::discovery::{self, DiscoveryError};
use crate::build::{BuildContext, StepResult};
use crate::deps::{self, DependencyError};
use crate::manifest::{ExtensionManifest, ManifestError, MANIFEST_FILENAME};
use crate::transform::{rasterize_icons, Toolchain, Transform, TransformError, TransformJob};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Every step of the build graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepKind {
    /// `manifest.json` into the store root
    CopyManifest,
    /// `_locales/**/messages.json` into `_locales/`
    Locales,
    /// `img/*.{png,jpg}` into `img/`
    CopyImages,
    /// `img/*.svg`, optimized, into `img/`
    OptimizeSvg,
    /// Icon source rasterized into `img/icons/`
    Icons,
    /// `html/*.html`, minified, into `html/`
    Markup,
    /// `scss/**/*.scss` compiled into `css/*.min.css`
    Styles,
    /// `js/**/*.js` minified into `js/`
    ContentScripts,
    /// Background service worker minified into the store root
    BackgroundScript,
    /// Third-party files vendored per packaging mode
    Dependencies,
}

impl StepKind {
    /// Short name used in logs and summaries.
    pub fn name(self) -> &'static str {
        match self {
            StepKind::CopyManifest => "manifest",
            StepKind::Locales => "locales",
            StepKind::CopyImages => "images",
            StepKind::OptimizeSvg => "svg",
            StepKind::Icons => "icons",
            StepKind::Markup => "markup",
            StepKind::Styles => "styles",
            StepKind::ContentScripts => "content-scripts",
            StepKind::BackgroundScript => "background-script",
            StepKind::Dependencies => "dependencies",
        }
    }

    /// Run the step and capture its outcome.
    pub fn execute(self, ctx: &BuildContext, tools: &Toolchain) -> StepResult {
        let start = Instant::now();
        tracing::debug!(step = self.name(), "starting");

        let result = match self.run(ctx, tools) {
            Ok(Outcome::Skipped(reason)) => {
                tracing::info!(step = self.name(), "skipped: {}", reason);
                StepResult::skipped(self)
            }
            Ok(Outcome::Done(batch)) if batch.errors.is_empty() => {
                StepResult::success(self, batch.outputs, start.elapsed())
            }
            Ok(Outcome::Done(batch)) => {
                let message =
                    batch.errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
                StepResult::failed(self, message, batch.outputs, start.elapsed())
            }
            Err(e) => {
                tracing::error!(step = self.name(), "{}", e);
                StepResult::failed(self, e.to_string(), vec![], start.elapsed())
            }
        };

        tracing::debug!(
            step = self.name(),
            status = %result.status,
            elapsed = ?result.duration,
            "finished"
        );
        result
    }

    fn run(self, ctx: &BuildContext, tools: &Toolchain) -> Result<Outcome, StepError> {
        match self {
            StepKind::CopyManifest => copy_manifest(ctx),
            StepKind::Locales => locales(ctx),
            StepKind::CopyImages => copy_images(ctx),
            StepKind::OptimizeSvg => optimize_svg(ctx, tools),
            StepKind::Icons => icons(ctx, tools),
            StepKind::Markup => markup(ctx, tools),
            StepKind::Styles => styles(ctx, tools),
            StepKind::ContentScripts => content_scripts(ctx, tools),
            StepKind::BackgroundScript => background_script(ctx, tools),
            StepKind::Dependencies => dependencies(ctx),
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error raised inside a step.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepError {
    /// Source discovery failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// A collaborator failed on one input
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// Dependency vendoring failed
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    /// The source manifest is missing or invalid
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// File system error
    #[error("{path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },
}

impl StepError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StepError::Io { path: path.display().to_string(), source }
    }
}

enum Outcome {
    Done(Batch),
    Skipped(String),
}

/// Outputs and per-file failures of one step.
#[derive(Default)]
struct Batch {
    outputs: Vec<PathBuf>,
    errors: Vec<StepError>,
}

impl Batch {
    fn record(&mut self, step: &str, result: Result<Vec<PathBuf>, StepError>) {
        match result {
            Ok(outputs) => self.outputs.extend(outputs),
            Err(e) => {
                tracing::error!(step, "{}", e);
                self.errors.push(e);
            }
        }
    }
}

fn ensure_parent(dest: &Path) -> Result<(), StepError> {
    match dest.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|e| StepError::io(parent, e)),
        None => Ok(()),
    }
}

fn copy_into(source: &Path, dest: &Path) -> Result<Vec<PathBuf>, StepError> {
    ensure_parent(dest)?;
    fs::copy(source, dest).map_err(|e| StepError::io(source, e))?;
    Ok(vec![dest.to_path_buf()])
}

fn apply(
    tool: &dyn Transform,
    source: &Path,
    dest: &Path,
    production: bool,
) -> Result<Vec<PathBuf>, StepError> {
    ensure_parent(dest)?;
    Ok(tool.transform(&TransformJob { source, dest, production })?)
}

fn file_name(path: &Path) -> PathBuf {
    path.file_name().map(PathBuf::from).unwrap_or_default()
}

/// Background script declared by the source manifest.
fn declared_background(ctx: &BuildContext) -> Result<Option<String>, StepError> {
    let manifest = ExtensionManifest::load(&ctx.source_manifest())?;
    Ok(manifest.background_script().map(str::to_string))
}

fn copy_manifest(ctx: &BuildContext) -> Result<Outcome, StepError> {
    let source = ctx.source_manifest();
    ExtensionManifest::load(&source)?;
    let outputs = copy_into(&source, &ctx.out_dir().join(MANIFEST_FILENAME))?;
    Ok(Outcome::Done(Batch { outputs, errors: vec![] }))
}

fn locales(ctx: &BuildContext) -> Result<Outcome, StepError> {
    let base = ctx.src_dir().join("_locales");
    let dest_root = ctx.out_dir().join("_locales");
    let mut batch = Batch::default();

    for source in discovery::discover_files(&base, "**/messages.json")? {
        let dest = dest_root.join(discovery::relative_to(&source, &base));
        batch.record("locales", copy_into(&source, &dest));
    }
    Ok(Outcome::Done(batch))
}

fn copy_images(ctx: &BuildContext) -> Result<Outcome, StepError> {
    let dest_root = ctx.out_dir().join("img");
    let mut batch = Batch::default();

    for source in discovery::discover_all(ctx.src_dir(), &["img/*.png", "img/*.jpg"])? {
        batch.record("images", copy_into(&source, &dest_root.join(file_name(&source))));
    }
    Ok(Outcome::Done(batch))
}

fn optimize_svg(ctx: &BuildContext, tools: &Toolchain) -> Result<Outcome, StepError> {
    let dest_root = ctx.out_dir().join("img");
    let mut batch = Batch::default();

    for source in discovery::discover_files(ctx.src_dir(), "img/*.svg")? {
        let dest = dest_root.join(file_name(&source));
        batch.record("svg", apply(tools.vectors.as_ref(), &source, &dest, ctx.is_production()));
    }
    Ok(Outcome::Done(batch))
}

fn icons(ctx: &BuildContext, tools: &Toolchain) -> Result<Outcome, StepError> {
    let source = ctx.src_dir().join("img").join(ctx.icon_source());
    if !source.is_file() {
        return Ok(Outcome::Skipped(format!("no icon source at {}", source.display())));
    }

    let dest_root = ctx.out_dir().join("img").join("icons");
    fs::create_dir_all(&dest_root).map_err(|e| StepError::io(&dest_root, e))?;

    tracing::info!("Attempting to create the following icon sizes: {:?}", ctx.icon_sizes());
    let mut batch = Batch::default();
    for result in rasterize_icons(tools.rasterizer.as_ref(), &source, ctx.icon_sizes(), &dest_root)
    {
        batch.record("icons", result.map(|path| vec![path]).map_err(StepError::from));
    }
    Ok(Outcome::Done(batch))
}

fn markup(ctx: &BuildContext, tools: &Toolchain) -> Result<Outcome, StepError> {
    let dest_root = ctx.out_dir().join("html");
    let mut batch = Batch::default();

    for source in discovery::discover_files(ctx.src_dir(), "html/*.html")? {
        let dest = dest_root.join(file_name(&source));
        batch.record("markup", apply(tools.markup.as_ref(), &source, &dest, ctx.is_production()));
    }
    Ok(Outcome::Done(batch))
}

/// `scss/pages/popup.scss` becomes `css/pages/popup.min.css`.
fn style_destination(ctx: &BuildContext, source: &Path) -> PathBuf {
    let relative = discovery::relative_to(source, &ctx.src_dir().join("scss"));
    let stem = relative.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    ctx.out_dir().join("css").join(relative.with_file_name(format!("{}.min.css", stem)))
}

fn styles(ctx: &BuildContext, tools: &Toolchain) -> Result<Outcome, StepError> {
    let mut batch = Batch::default();

    for source in discovery::style_sources(ctx.src_dir())? {
        let dest = style_destination(ctx, &source);
        batch.record("styles", apply(tools.styles.as_ref(), &source, &dest, ctx.is_production()));
    }
    Ok(Outcome::Done(batch))
}

fn content_scripts(ctx: &BuildContext, tools: &Toolchain) -> Result<Outcome, StepError> {
    let background = declared_background(ctx)?;
    let base = ctx.src_dir().join("js");
    let dest_root = ctx.out_dir().join("js");
    let mut batch = Batch::default();

    for source in discovery::content_script_sources(ctx.src_dir(), background.as_deref())? {
        let dest = dest_root.join(discovery::relative_to(&source, &base));
        batch.record(
            "content-scripts",
            apply(tools.scripts.as_ref(), &source, &dest, ctx.is_production()),
        );
    }
    Ok(Outcome::Done(batch))
}

fn background_script(ctx: &BuildContext, tools: &Toolchain) -> Result<Outcome, StepError> {
    let Some(declared) = declared_background(ctx)? else {
        return Ok(Outcome::Skipped("manifest declares no background script".to_string()));
    };

    let source = ctx.src_dir().join(&declared);
    if !source.is_file() {
        return Ok(Outcome::Skipped(format!("background script {} not found", declared)));
    }

    // Must match the path declared by the copied manifest
    let dest = ctx.out_dir().join(&declared);
    let outputs = apply(tools.scripts.as_ref(), &source, &dest, ctx.is_production())?;
    Ok(Outcome::Done(Batch { outputs, errors: vec![] }))
}

fn dependencies(ctx: &BuildContext) -> Result<Outcome, StepError> {
    if ctx.packaging_mode().destination().is_none() {
        return Ok(Outcome::Skipped("dependency vendoring disabled".to_string()));
    }
    tracing::info!("Dependencies will be packed with build ({}).", ctx.packaging_mode());
    let outputs = deps::vendor(ctx)?;
    Ok(Outcome::Done(Batch { outputs, errors: vec![] }))
}
