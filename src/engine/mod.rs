//! Core engine: the decision engine and the loop that drives it.
//!
//! `scheduler` owns initialization with backoff and the fixed-interval
//! cycle loop; `cycle` wraps one engine step; `agent` is the production
//! engine; `supervisor` decides how the process exits.

pub mod agent;
pub mod cycle;
pub mod scheduler;
pub mod supervisor;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{StepOptions, StepReport};

/// An agent that can be initialized once and then stepped repeatedly.
///
/// What a step actually does is opaque to the scheduler; only success or
/// failure matters, and failures may carry an HTTP status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    async fn step(&self, options: StepOptions) -> Result<StepReport>;
}
