//! Watch mode for incremental rebuilds on file changes
//!
//! After the initial build the source tree is observed with a debounced
//! watcher. Each changed path is looked up in an explicit [`WatchTable`] of
//! `(pattern -> steps)` rows and only the union of the matching steps is
//! re-run, into the existing store and without clearing it. A failed
//! rebuild is reported and the session keeps watching.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

use crate::build::{BuildPipeline, BuildResult, StepKind};
use glob::{MatchOptions, Pattern};

/// Error during watch mode
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    /// Source directory not found
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// One row of the watch table.
#[derive(Debug, Clone)]
pub struct WatchRule {
    patterns: Vec<Pattern>,
    steps: &'static [StepKind],
}

impl WatchRule {
    fn new(patterns: &[&str], steps: &'static [StepKind]) -> Self {
        Self { patterns: patterns.iter().filter_map(|p| Pattern::new(p).ok()).collect(), steps }
    }

    /// Steps re-run when this row matches.
    pub fn steps(&self) -> &[StepKind] {
        self.steps
    }

    fn matches(&self, relative: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.patterns.iter().any(|p| p.matches_with(relative, options))
    }
}

/// Mapping from source paths to the steps that must re-run.
///
/// | pattern (relative to the source tree) | steps                          |
/// |---------------------------------------|--------------------------------|
/// | `manifest.json`                       | manifest                       |
/// | `_locales/**/messages.json`           | locales                        |
/// | `img/**/*.png`, `img/**/*.jpg`        | images                         |
/// | `img/**/*.svg`                        | svg                            |
/// | `img/<icon source>`                   | svg, icons                     |
/// | `html/**/*.html`                      | markup                         |
/// | `scss/**/*.scss`                      | styles                         |
/// | `**/*.js`                             | content-scripts, background    |
#[derive(Debug, Clone)]
pub struct WatchTable {
    rules: Vec<WatchRule>,
}

impl WatchTable {
    /// Build the table for a project whose vector icon is `img/<icon_source>`.
    pub fn new(icon_source: &str) -> Self {
        let icon = format!("img/{}", Pattern::escape(icon_source));
        Self {
            rules: vec![
                WatchRule::new(&["manifest.json"], &[StepKind::CopyManifest]),
                WatchRule::new(&["_locales/**/messages.json"], &[StepKind::Locales]),
                WatchRule::new(&["img/**/*.png", "img/**/*.jpg"], &[StepKind::CopyImages]),
                WatchRule::new(&["img/**/*.svg"], &[StepKind::OptimizeSvg]),
                WatchRule::new(&[icon.as_str()], &[StepKind::OptimizeSvg, StepKind::Icons]),
                WatchRule::new(&["html/**/*.html"], &[StepKind::Markup]),
                WatchRule::new(&["scss/**/*.scss"], &[StepKind::Styles]),
                WatchRule::new(
                    &["**/*.js"],
                    &[StepKind::ContentScripts, StepKind::BackgroundScript],
                ),
            ],
        }
    }

    /// Table rows.
    pub fn rules(&self) -> &[WatchRule] {
        &self.rules
    }

    /// Steps for one path relative to the source tree.
    pub fn steps_for(&self, relative: &Path) -> BTreeSet<StepKind> {
        let relative = slashed(relative);
        self.rules
            .iter()
            .filter(|rule| rule.matches(&relative))
            .flat_map(|rule| rule.steps.iter().copied())
            .collect()
    }

    /// Union of the steps for every changed path under `src_dir`.
    ///
    /// Paths outside `src_dir` are ignored.
    pub fn steps_for_changes(&self, src_dir: &Path, paths: &[PathBuf]) -> Vec<StepKind> {
        let mut steps = BTreeSet::new();
        for path in paths {
            if let Ok(relative) = path.strip_prefix(src_dir) {
                steps.extend(self.steps_for(relative));
            }
        }
        steps.into_iter().collect()
    }
}

fn slashed(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Tracks failing steps across rebuilds for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Steps that failed the last time they ran
    failing: BTreeSet<StepKind>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a build result, returns the steps that recovered.
    ///
    /// Steps that did not run in `result` keep their previous state.
    pub fn update(&mut self, result: &BuildResult) -> Vec<StepKind> {
        let mut fixed = Vec::new();
        for step in &result.steps {
            if step.status.is_failure() {
                self.failing.insert(step.step);
            } else if self.failing.remove(&step.step) {
                fixed.push(step.step);
            }
        }
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }

    /// Get the number of failing steps
    pub fn error_count(&self) -> usize {
        self.failing.len()
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// A running watch session over one pipeline.
pub struct WatchSession<'a> {
    pipeline: &'a BuildPipeline,
    table: WatchTable,
    tracker: ErrorTracker,
}

impl<'a> WatchSession<'a> {
    /// Create a session; `initial` is the result of the build that preceded it.
    pub fn new(pipeline: &'a BuildPipeline, initial: Option<&BuildResult>) -> Self {
        let table = WatchTable::new(pipeline.context().icon_source());
        let mut tracker = ErrorTracker::new();
        if let Some(result) = initial {
            tracker.update(result);
        }
        Self { pipeline, table, tracker }
    }

    /// Failure tracker of this session.
    pub fn tracker(&self) -> &ErrorTracker {
        &self.tracker
    }

    /// Re-run the steps affected by `paths`.
    ///
    /// Returns `None` when no watched pattern matches.
    pub fn handle_changes(&mut self, paths: &[PathBuf]) -> Option<BuildResult> {
        let src_dir = self.pipeline.context().src_dir();
        let steps = self.table.steps_for_changes(src_dir, paths);
        if steps.is_empty() {
            tracing::debug!(?paths, "no watched pattern matches");
            return None;
        }

        for path in paths {
            let shown = path.strip_prefix(src_dir).unwrap_or(path);
            tracing::info!("Changed: {}", shown.display());
        }
        if self.pipeline.context().watch_config().clear_screen {
            clear_screen();
        }

        let names: Vec<_> = steps.iter().map(|s| s.name()).collect();
        tracing::info!("Rebuilding: {}", names.join(", "));
        let result = self.pipeline.run_steps(&steps);

        for step in self.tracker.update(&result) {
            tracing::info!("Fixed: {}", step);
        }
        report(&result);
        Some(result)
    }

    /// Observe the source tree until the process is terminated.
    pub fn run(mut self) -> Result<(), WatchError> {
        let src_dir = self.pipeline.context().src_dir().to_path_buf();
        if !src_dir.exists() {
            return Err(WatchError::SourceNotFound(src_dir));
        }

        let (tx, rx) = channel();
        let debounce =
            Duration::from_millis(u64::from(self.pipeline.context().watch_config().debounce_ms));
        let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;
        debouncer.watcher().watch(&src_dir, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;

        tracing::info!("Watching {} for changes...", src_dir.display());

        loop {
            match rx.recv() {
                Ok(Ok(events)) => {
                    let mut paths: Vec<PathBuf> = events
                        .into_iter()
                        .filter(|e| {
                            matches!(
                                e.kind,
                                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                            )
                        })
                        .map(|e| e.path)
                        .collect();
                    paths.sort();
                    paths.dedup();

                    if self.handle_changes(&paths).is_some() {
                        tracing::info!("Watching {} for changes...", src_dir.display());
                    }
                }
                Ok(Err(error)) => {
                    // Watch error (non-fatal) - log but continue watching
                    tracing::error!("Watch error: {:?}", error);
                    tracing::info!("Continuing to watch...");
                }
                Err(e) => {
                    return Err(WatchError::ChannelError(e.to_string()));
                }
            }
        }
    }
}

/// Log a rebuild result.
fn report(result: &BuildResult) {
    if result.is_success() {
        tracing::info!(
            "Rebuild complete ({}) - {} files",
            format_duration(result.total_duration),
            result.all_outputs().len()
        );
    } else {
        let failed = result.failed_count();
        tracing::error!(
            "Rebuild failed ({}) - {} step{} failed",
            format_duration(result.total_duration),
            failed,
            if failed == 1 { "" } else { "s" }
        );
        for step in result.failures() {
            tracing::error!("{}: {}", step.step, step.status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::StepResult;

    fn steps(table: &WatchTable, path: &str) -> Vec<StepKind> {
        table.steps_for(Path::new(path)).into_iter().collect()
    }

    #[test]
    fn test_watch_table_rows() {
        let table = WatchTable::new("icon.svg");

        assert_eq!(steps(&table, "manifest.json"), vec![StepKind::CopyManifest]);
        assert_eq!(steps(&table, "_locales/en/messages.json"), vec![StepKind::Locales]);
        assert_eq!(steps(&table, "img/photo.jpg"), vec![StepKind::CopyImages]);
        assert_eq!(steps(&table, "img/logo.png"), vec![StepKind::CopyImages]);
        assert_eq!(steps(&table, "img/logo.svg"), vec![StepKind::OptimizeSvg]);
        assert_eq!(steps(&table, "html/popup.html"), vec![StepKind::Markup]);
        assert_eq!(steps(&table, "scss/pages/popup.scss"), vec![StepKind::Styles]);
    }

    #[test]
    fn test_watch_table_scripts_rerun_together() {
        let table = WatchTable::new("icon.svg");
        let expected = vec![StepKind::ContentScripts, StepKind::BackgroundScript];

        assert_eq!(steps(&table, "background.js"), expected);
        assert_eq!(steps(&table, "js/content/main.js"), expected);
    }

    #[test]
    fn test_watch_table_icon_source() {
        let table = WatchTable::new("cursor.svg");
        assert_eq!(steps(&table, "img/cursor.svg"), vec![StepKind::OptimizeSvg, StepKind::Icons]);
        assert_eq!(steps(&table, "img/other.svg"), vec![StepKind::OptimizeSvg]);
    }

    #[test]
    fn test_watch_table_unwatched_paths() {
        let table = WatchTable::new("icon.svg");
        assert!(steps(&table, "README.md").is_empty());
        assert!(steps(&table, "_locales/en/other.json").is_empty());
        assert!(steps(&table, "styles.scss").is_empty());
    }

    #[test]
    fn test_steps_for_changes_union() {
        let table = WatchTable::new("icon.svg");
        let src = Path::new("/project/src");
        let paths = vec![
            src.join("scss/main.scss"),
            src.join("html/popup.html"),
            src.join("scss/other.scss"),
            PathBuf::from("/elsewhere/x.js"),
        ];

        assert_eq!(table.steps_for_changes(src, &paths), vec![StepKind::Markup, StepKind::Styles]);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1000)), "1.00s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_error_tracker_detects_fixed_steps() {
        let mut tracker = ErrorTracker::new();

        let mut first = BuildResult::new();
        first.add_result(StepResult::failed(StepKind::Styles, "e".into(), vec![], Duration::ZERO));
        first.add_result(StepResult::failed(StepKind::Markup, "e".into(), vec![], Duration::ZERO));
        assert!(tracker.update(&first).is_empty());
        assert_eq!(tracker.error_count(), 2);

        let mut second = BuildResult::new();
        second.add_result(StepResult::success(StepKind::Styles, vec![], Duration::ZERO));
        let fixed = tracker.update(&second);

        assert_eq!(fixed, vec![StepKind::Styles]);
        assert!(tracker.has_errors());
        assert_eq!(tracker.error_count(), 1);
    }

    #[test]
    fn test_error_tracker_success_without_prior_failure() {
        let mut tracker = ErrorTracker::new();
        let mut result = BuildResult::new();
        result.add_result(StepResult::success(StepKind::Locales, vec![], Duration::ZERO));

        assert!(tracker.update(&result).is_empty());
        assert!(!tracker.has_errors());
    }
}
