//! Cycle runner.
//!
//! Runs exactly one engine step under a timeout and logs the outcome.
//! Nothing is retried here: a rate-limited cycle is simply over, and the
//! next tick tries again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::DecisionEngine;
use crate::error::{CycleError, FailureClass};
use crate::types::{StepOptions, StepReport};

/// A completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub elapsed: Duration,
    pub step: StepReport,
}

/// Running totals across all cycles.
#[derive(Debug, Default)]
pub struct CycleStats {
    completed: AtomicU64,
    rate_limited: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    posts_published: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub completed: u64,
    pub rate_limited: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub posts_published: u64,
}

impl StatsSnapshot {
    pub fn total(&self) -> u64 {
        self.completed + self.rate_limited + self.failed + self.timed_out
    }
}

impl CycleStats {
    fn record(&self, outcome: &Result<CycleReport, CycleError>) {
        let counter = match outcome {
            Ok(report) => {
                self.posts_published
                    .fetch_add(report.step.posts_published as u64, Ordering::Relaxed);
                &self.completed
            }
            Err(CycleError::RateLimited(_)) => &self.rate_limited,
            Err(CycleError::Failed(_)) => &self.failed,
            Err(CycleError::TimedOut(_)) => &self.timed_out,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            posts_published: self.posts_published.load(Ordering::Relaxed),
        }
    }
}

pub struct CycleRunner {
    engine: Arc<dyn DecisionEngine>,
    options: StepOptions,
    timeout: Duration,
    stats: CycleStats,
}

impl CycleRunner {
    pub fn new(engine: Arc<dyn DecisionEngine>, options: StepOptions, timeout: Duration) -> Self {
        Self {
            engine,
            options,
            timeout,
            stats: CycleStats::default(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one step. Every failure is logged here before being returned.
    pub async fn run(&self) -> Result<CycleReport, CycleError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", id = %cycle_id);

        let outcome = self.run_inner(cycle_id).instrument(span.clone()).await;
        self.stats.record(&outcome);
        span.in_scope(|| log_outcome(&outcome));
        outcome
    }

    async fn run_inner(&self, cycle_id: Uuid) -> Result<CycleReport, CycleError> {
        info!("Running agent step");
        let started = Instant::now();

        let step = tokio::time::timeout(self.timeout, self.engine.step(self.options))
            .await
            .map_err(|_| CycleError::TimedOut(self.timeout))?
            .map_err(CycleError::from_step)?;

        Ok(CycleReport {
            cycle_id,
            elapsed: started.elapsed(),
            step,
        })
    }
}

fn log_outcome(outcome: &Result<CycleReport, CycleError>) {
    match outcome {
        Ok(report) => info!(
            function = %report.step.function,
            posts = report.step.posts_published,
            skipped = report.step.skipped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cycle complete"
        ),
        Err(e) => match e.class() {
            FailureClass::RateLimited => {
                warn!(error = %e, "Rate limited during cycle, expected; will try again next interval")
            }
            _ => error!(error = %e, "Cycle failed, skipping until next interval"),
        },
    }
}
