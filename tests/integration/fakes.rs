//! Deterministic fakes for the collaborator traits.
//!
//! All state is in-memory and fully controllable from test code.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use wisdom::engine::scheduler::Sleeper;
use wisdom::engine::DecisionEngine;
use wisdom::error::ApiError;
use wisdom::llm::{ChatModel, Completion};
use wisdom::platforms::{MarketQuery, MarketSource};
use wisdom::publisher::Publisher;
use wisdom::types::{MarketSnapshot, PostReceipt, StepOptions, StepReport};

pub fn rate_limited() -> anyhow::Error {
    ApiError::new("openrouter", 429, "Too Many Requests").into()
}

pub fn snapshot(question: &str, p: f64, volume: f64, category: &str) -> MarketSnapshot {
    MarketSnapshot::from_raw(question, Some(p), Some(volume), Some(category.to_string()), None)
}

/// A small market board covering every classifier view.
pub fn board() -> Vec<MarketSnapshot> {
    vec![
        snapshot("Will the Fed cut rates in March?", 0.67, 80_000.0, "Economics"),
        snapshot("Will BTC close above $100k this year?", 0.50, 45_000.0, "Crypto"),
        snapshot("Will it snow in Miami in July?", 0.02, 9_000.0, "Weather"),
        snapshot("Will the incumbent win?", 0.88, 120_000.0, "Politics"),
        snapshot("Will a tiny market matter?", 0.51, 100.0, "Politics"),
    ]
}

// ---------------------------------------------------------------------------
// Decision engine
// ---------------------------------------------------------------------------

/// Engine whose `initialize` replays a script, then succeeds.
#[derive(Default)]
pub struct ScriptedEngine {
    init_script: Mutex<VecDeque<Result<()>>>,
    pub init_calls: AtomicUsize,
    pub steps: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(init_script: Vec<Result<()>>) -> Self {
        Self {
            init_script: Mutex::new(init_script.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DecisionEngine for ScriptedEngine {
    async fn initialize(&self) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.init_script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn step(&self, _options: StepOptions) -> Result<StepReport> {
        self.steps.fetch_add(1, Ordering::SeqCst);
        Ok(StepReport {
            function: "get_trending_markets".into(),
            posts_published: 0,
            skipped: true,
        })
    }
}

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn millis(&self) -> Vec<u128> {
        self.slept.lock().unwrap().iter().map(|d| d.as_millis()).collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

// ---------------------------------------------------------------------------
// Market source, model and publisher
// ---------------------------------------------------------------------------

pub struct FixedSource {
    markets: Vec<MarketSnapshot>,
    pub queries: Mutex<Vec<MarketQuery>>,
}

impl FixedSource {
    pub fn new(markets: Vec<MarketSnapshot>) -> Self {
        Self {
            markets,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MarketSource for FixedSource {
    async fn fetch_markets(&self, query: MarketQuery) -> Result<Vec<MarketSnapshot>> {
        self.queries.lock().unwrap().push(query);
        Ok(self.markets.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Model that answers from a queue of canned replies.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<Completion> {
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "SKIP".to_string());
        Ok(Completion {
            text,
            tokens_used: 0,
            cost: 0.0,
        })
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub posts: Mutex<Vec<String>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn verify(&self) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, text: &str) -> Result<PostReceipt> {
        self.posts.lock().unwrap().push(text.to_string());
        Ok(PostReceipt::dry_run())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
