//! Scheduler with backoff.
//!
//! Initializes the decision engine, retrying rate-limited failures with
//! exponential backoff and a long cooldown once retries run out, then runs
//! one cycle immediately followed by one per interval tick. A tick that
//! lands while the previous cycle is still running is skipped.
//!
//! Sleeping during backoff goes through [`Sleeper`] so tests can record
//! delays instead of waiting.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::cycle::{CycleReport, CycleRunner};
use super::supervisor::panic_message;
use super::DecisionEngine;
use crate::config::{AppConfig, BackoffConfig};
use crate::error::{classify_init_error, CycleError, FailureClass, SchedulerError};
use crate::types::StepOptions;

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
    pub cooldown: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(cfg: &BackoffConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            max_retries: cfg.max_retries,
            cooldown: Duration::from_secs(cfg.cooldown_secs),
        }
    }
}

impl BackoffPolicy {
    /// `min(base * 2^retry_count, max)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Something that can wait.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Starting,
    Running,
    Backoff,
    Failed,
}

/// Retry bookkeeping, touched only while initializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleState {
    pub retry_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub check_interval: Duration,
    pub cycle_timeout: Duration,
    pub step_options: StepOptions,
    pub backoff: BackoffPolicy,
}

impl SchedulerSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            check_interval: cfg.agent.check_interval(),
            cycle_timeout: cfg.agent.cycle_timeout(),
            step_options: StepOptions {
                verbose: cfg.agent.verbose,
            },
            backoff: BackoffPolicy::from(&cfg.backoff),
        }
    }
}

type CycleOutcome = Result<CycleReport, CycleError>;

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    engine: Arc<dyn DecisionEngine>,
    runner: Arc<CycleRunner>,
    sleeper: Arc<dyn Sleeper>,
    policy: BackoffPolicy,
    check_interval: Duration,
    state: CycleState,
    phase: SchedulerPhase,
}

impl Scheduler {
    pub fn new(engine: Arc<dyn DecisionEngine>, settings: SchedulerSettings) -> Self {
        let runner = Arc::new(CycleRunner::new(
            engine.clone(),
            settings.step_options,
            settings.cycle_timeout,
        ));
        Self {
            engine,
            runner,
            sleeper: Arc::new(TokioSleeper),
            policy: settings.backoff,
            check_interval: settings.check_interval,
            state: CycleState::default(),
            phase: SchedulerPhase::Starting,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn runner(&self) -> Arc<CycleRunner> {
        self.runner.clone()
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Initialize the engine, backing off on rate limits indefinitely.
    ///
    /// Returns only on success or on a failure that isn't a rate limit.
    pub async fn initialize(&mut self) -> Result<(), SchedulerError> {
        loop {
            self.phase = SchedulerPhase::Starting;
            info!(retry_count = self.state.retry_count, "Initializing agent");

            let err = match self.engine.initialize().await {
                Ok(()) => {
                    self.state.retry_count = 0;
                    self.phase = SchedulerPhase::Running;
                    info!("Agent initialized");
                    return Ok(());
                }
                Err(e) => e,
            };

            if classify_init_error(&err) != FailureClass::RateLimited {
                self.phase = SchedulerPhase::Failed;
                error!(error = %format!("{err:#}"), "Initialization failed, not retrying");
                return Err(SchedulerError::FatalInit(err));
            }

            self.phase = SchedulerPhase::Backoff;
            self.state.retry_count += 1;

            if self.state.retry_count >= self.policy.max_retries {
                warn!(
                    retries = self.state.retry_count,
                    cooldown_secs = self.policy.cooldown.as_secs(),
                    "Max retries reached, cooling down before trying again"
                );
                self.sleeper.sleep(self.policy.cooldown).await;
                self.state.retry_count = 0;
            } else {
                // retry_count is already incremented; the first retry waits base_delay.
                let delay = self.policy.delay_for(self.state.retry_count - 1);
                warn!(
                    retry = self.state.retry_count,
                    max_retries = self.policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Rate limited during initialization, backing off"
                );
                self.sleeper.sleep(delay).await;
            }
        }
    }

    /// Initialize, then run cycles until `shutdown` changes.
    ///
    /// Cycle failures never end the loop. Only a fatal init error or a
    /// panicking cycle returns `Err`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), SchedulerError> {
        tokio::select! {
            res = self.initialize() => res?,
            _ = shutdown.changed() => {
                info!("Shutdown requested during initialization");
                return Ok(());
            }
        }

        info!("Running first cycle");
        let first = self.spawn_cycle();
        tokio::select! {
            joined = first => settle(joined)?,
            _ = shutdown.changed() => {
                info!("Shutdown requested, not waiting for the running cycle");
                return Ok(());
            }
        }

        let mut ticker = interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.check_interval.as_secs(), "Scheduler running");

        let mut in_flight: Option<JoinHandle<CycleOutcome>> = None;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if in_flight.is_some() {
                        warn!("Previous cycle still running, skipping this tick");
                        continue;
                    }
                    in_flight = Some(self.spawn_cycle());
                }
                joined = join_in_flight(&mut in_flight) => {
                    in_flight = None;
                    settle(joined)?;
                }
                _ = shutdown.changed() => {
                    info!("Shutdown requested, scheduler stopping");
                    return Ok(());
                }
            }
        }
    }

    fn spawn_cycle(&self) -> JoinHandle<CycleOutcome> {
        let runner = self.runner.clone();
        tokio::spawn(async move { runner.run().await })
    }
}

/// Wait on the running cycle, or forever when there is none.
async fn join_in_flight(slot: &mut Option<JoinHandle<CycleOutcome>>) -> Result<CycleOutcome, JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn settle(joined: Result<CycleOutcome, JoinError>) -> Result<(), SchedulerError> {
    match joined {
        // The runner already logged it.
        Ok(outcome) => {
            drop(outcome);
            Ok(())
        }
        Err(e) if e.is_panic() => Err(SchedulerError::Uncaught(panic_message(e.into_panic()))),
        Err(e) => {
            warn!(error = %e, "Cycle task cancelled");
            Ok(())
        }
    }
}
