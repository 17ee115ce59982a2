//! Build result types.
//!
//! Contains types for representing the outcome of build steps and runs.

use crate::build::StepKind;
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// Step ran and wrote its outputs
    Success,
    /// Step had nothing to do (optional input absent)
    Skipped,
    /// Step failed with error
    Failed(String),
}

impl StepStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed(_))
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Skipped => write!(f, "skipped"),
            StepStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of running a single step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Step that ran
    pub step: StepKind,
    /// Outcome
    pub status: StepStatus,
    /// Files written into the artifact store
    pub outputs: Vec<PathBuf>,
    /// Step duration
    pub duration: Duration,
}

impl StepResult {
    /// Create a successful result.
    pub fn success(step: StepKind, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { step, status: StepStatus::Success, outputs, duration }
    }

    /// Create a skipped result.
    pub fn skipped(step: StepKind) -> Self {
        Self { step, status: StepStatus::Skipped, outputs: vec![], duration: Duration::ZERO }
    }

    /// Create a failed result. Outputs written before the failure are kept.
    pub fn failed(step: StepKind, error: String, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { step, status: StepStatus::Failed(error), outputs, duration }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete build run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each step, in scheduling order
    pub steps: Vec<StepResult>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step result.
    pub fn add_result(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    /// Add several step results.
    pub fn extend(&mut self, results: impl IntoIterator<Item = StepResult>) {
        self.steps.extend(results);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Get the number of successful steps.
    pub fn success_count(&self) -> usize {
        self.steps.iter().filter(|r| matches!(r.status, StepStatus::Success)).count()
    }

    /// Get the number of skipped steps.
    pub fn skipped_count(&self) -> usize {
        self.steps.iter().filter(|r| matches!(r.status, StepStatus::Skipped)).count()
    }

    /// Get the number of failed steps.
    pub fn failed_count(&self) -> usize {
        self.steps.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.steps.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get failed step results.
    pub fn failures(&self) -> Vec<&StepResult> {
        self.steps.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Result of a particular step, if it ran.
    pub fn step(&self, kind: StepKind) -> Option<&StepResult> {
        self.steps.iter().find(|r| r.step == kind)
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.steps.len();

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} succeeded, {} skipped, {} failed ({} total)",
                success, skipped, failed, total
            ));
            for step in self.failures() {
                lines.push(format!("  - {}: {}", step.step, step.status));
            }
        } else {
            lines.push(format!(
                "Build succeeded: {} steps run, {} skipped ({} total, {} files) in {:?}",
                success,
                skipped,
                total,
                self.all_outputs().len(),
                self.total_duration
            ));
        }

        lines.join("\n")
    }
}
