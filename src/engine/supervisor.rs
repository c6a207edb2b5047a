//! Process supervision: signals, fatal diagnostics and exit codes.
//!
//! The process never restarts itself. Uncaught failures end in a non-zero
//! exit and the process manager brings it back; rate-limit failures wait
//! longer first so the restart doesn't hit the same limit.

use std::any::Any;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::SupervisorConfig;
use crate::error::{classify_init_error, message_signals_rate_limit, FailureClass, SchedulerError};

/// Shown after a fatal initialization failure.
pub const COMMON_FIXES: &[&str] = &[
    "Check that the language-model API key is set and valid",
    "Check that the X API bearer token is valid, or enable publisher.dry_run",
    "Check network connectivity",
    "Check that the Polymarket Gamma API is reachable",
];

/// How the process should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPlan {
    /// Termination signal or clean stop. Exit 0 at once.
    Shutdown,
    /// Rate-limited crash. Wait out the limit, then exit non-zero.
    Restart { delay: Duration },
    /// Anything else. Exit non-zero after `delay`.
    Fatal { delay: Duration },
}

impl ExitPlan {
    pub fn code(&self) -> i32 {
        match self {
            ExitPlan::Shutdown => 0,
            ExitPlan::Restart { .. } | ExitPlan::Fatal { .. } => 1,
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            ExitPlan::Shutdown => Duration::ZERO,
            ExitPlan::Restart { delay } | ExitPlan::Fatal { delay } => *delay,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Supervisor {
    rate_limit_restart: Duration,
    fatal_delay: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::from_config(&SupervisorConfig::default())
    }
}

impl Supervisor {
    pub fn from_config(cfg: &SupervisorConfig) -> Self {
        Self {
            rate_limit_restart: Duration::from_secs(cfg.rate_limit_restart_secs),
            fatal_delay: Duration::from_millis(cfg.fatal_exit_delay_ms),
        }
    }

    /// Decide how to exit once the scheduler has stopped.
    pub fn plan(&self, outcome: &Result<(), SchedulerError>) -> ExitPlan {
        match outcome {
            Ok(()) => ExitPlan::Shutdown,
            Err(SchedulerError::FatalInit(e)) => {
                report_fatal_init(e);
                ExitPlan::Fatal { delay: Duration::ZERO }
            }
            Err(SchedulerError::Uncaught(message)) => self.plan_uncaught(message),
        }
    }

    /// Exit plan for a failure nothing else handled.
    pub fn plan_uncaught(&self, message: &str) -> ExitPlan {
        if message_signals_rate_limit(message) {
            warn!(
                error = message,
                wait_secs = self.rate_limit_restart.as_secs(),
                "Uncaught rate-limit failure, waiting before exit"
            );
            ExitPlan::Restart { delay: self.rate_limit_restart }
        } else {
            error!(error = message, "Uncaught failure, exiting");
            ExitPlan::Fatal { delay: self.fatal_delay }
        }
    }
}

/// Exit plan for an error raised before the scheduler started.
pub fn plan_startup_failure(err: &anyhow::Error) -> ExitPlan {
    match classify_init_error(err) {
        FailureClass::FatalConfig => {
            error!(error = %err, "Set it in the environment or in a .env file");
        }
        _ => error!(error = %format!("{err:#}"), "Startup failed"),
    }
    ExitPlan::Fatal { delay: Duration::ZERO }
}

/// Race a running scheduler against a termination signal and return the
/// exit code.
///
/// A signal wins at any point, including while an exit delay is being
/// waited out, and always yields 0.
pub async fn drive<S>(
    mut handle: JoinHandle<Result<(), SchedulerError>>,
    shutdown_tx: watch::Sender<bool>,
    signal: S,
    supervisor: &Supervisor,
) -> i32
where
    S: Future<Output = &'static str>,
{
    tokio::pin!(signal);

    let outcome = tokio::select! {
        name = &mut signal => {
            info!(signal = name, "Shutdown signal received");
            let _ = shutdown_tx.send(true);
            return ExitPlan::Shutdown.code();
        }
        joined = &mut handle => joined.unwrap_or_else(|e| {
            let message = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            Err(SchedulerError::Uncaught(message))
        }),
    };

    let plan = supervisor.plan(&outcome);
    tokio::select! {
        code = carry_out(plan) => code,
        name = &mut signal => {
            info!(signal = name, "Shutdown signal received while exiting");
            ExitPlan::Shutdown.code()
        }
    }
}

/// Sleep out the plan's delay and return the exit code.
pub async fn carry_out(plan: ExitPlan) -> i32 {
    let delay = plan.delay();
    if !delay.is_zero() {
        info!(delay_ms = delay.as_millis() as u64, code = plan.code(), "Exiting after delay");
        tokio::time::sleep(delay).await;
    }
    plan.code()
}

/// Log the full diagnostic and common fixes for a fatal init error.
pub fn report_fatal_init(err: &anyhow::Error) {
    error!(error = %format!("{err:#}"), details = ?err, "Initialization failed");
    for fix in COMMON_FIXES {
        error!("  - {fix}");
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(s) => (*s).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

/// Resolves on SIGINT or SIGTERM, returning the signal name.
pub async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = interrupt() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            },
            Err(e) => {
                warn!(error = %e, "Could not install SIGTERM handler");
                interrupt().await;
                "SIGINT"
            }
        }
    }

    #[cfg(not(unix))]
    {
        interrupt().await;
        "SIGINT"
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
