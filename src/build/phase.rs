//! Phase execution.
//!
//! A phase is a set of steps with no ordering among them. The runner hands
//! the steps to a small pool of scoped worker threads and returns once every
//! step has either finished or failed. Steps write to disjoint paths in the
//! store, so workers share nothing but the read-only context.
//!
//! Results come back in the order the steps were given, whatever order
//! they completed in.

use crate::build::{BuildContext, StepKind, StepResult};
use crate::transform::Toolchain;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Phase 1: the manifest, read by later steps and by packaging.
pub const MANIFEST_PHASE: &[StepKind] = &[StepKind::CopyManifest];

/// Phase 2: independent asset steps.
pub const ASSET_PHASE: &[StepKind] = &[
    StepKind::Locales,
    StepKind::CopyImages,
    StepKind::OptimizeSvg,
    StepKind::Icons,
    StepKind::Markup,
    StepKind::Styles,
    StepKind::ContentScripts,
    StepKind::BackgroundScript,
];

/// Phase 3: dependency vendoring.
pub const DEPENDENCY_PHASE: &[StepKind] = &[StepKind::Dependencies];

/// Default number of parallel jobs (uses available parallelism).
fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn panicked(step: StepKind) -> StepResult {
    tracing::error!(step = step.name(), "step panicked");
    StepResult::failed(step, "step panicked".to_string(), vec![], Duration::ZERO)
}

/// Run one step, turning a panic into a failed result.
fn run_isolated(step: StepKind, ctx: &BuildContext, tools: &Toolchain) -> StepResult {
    panic::catch_unwind(AssertUnwindSafe(|| step.execute(ctx, tools)))
        .unwrap_or_else(|_| panicked(step))
}

/// Runs the steps of one phase.
pub struct PhaseRunner<'a> {
    ctx: &'a BuildContext,
    tools: &'a Toolchain,
    jobs: usize,
}

impl<'a> PhaseRunner<'a> {
    /// Create a runner using all available cores.
    pub fn new(ctx: &'a BuildContext, tools: &'a Toolchain) -> Self {
        Self { ctx, tools, jobs: default_jobs() }
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Get the number of parallel jobs.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run `steps` and wait for all of them.
    pub fn run(&self, steps: &[StepKind]) -> Vec<StepResult> {
        if steps.is_empty() {
            return vec![];
        }

        // For single-threaded or single-step phases, just execute sequentially
        if self.jobs == 1 || steps.len() == 1 {
            return steps.iter().map(|&step| run_isolated(step, self.ctx, self.tools)).collect();
        }

        let next_idx = AtomicUsize::new(0);
        let mut slots: Vec<Option<StepResult>> = vec![None; steps.len()];

        std::thread::scope(|s| {
            let num_workers = self.jobs.min(steps.len());
            let handles: Vec<_> = (0..num_workers)
                .map(|_| {
                    let next_idx = &next_idx;
                    s.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                            if idx >= steps.len() {
                                break;
                            }
                            done.push((idx, run_isolated(steps[idx], self.ctx, self.tools)));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                if let Ok(done) = handle.join() {
                    for (idx, result) in done {
                        slots[idx] = Some(result);
                    }
                }
            }
        });

        slots
            .into_iter()
            .zip(steps)
            .map(|(slot, &step)| slot.unwrap_or_else(|| panicked(step)))
            .collect()
    }
}
