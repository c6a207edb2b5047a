//! The WISDOM agent.
//!
//! A two-call decision engine: the model first picks one worker function,
//! then writes up to two posts about what that function returned. The
//! model is only trusted with wording; function choice falls back to a
//! fixed rotation whenever its reply can't be parsed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::DecisionEngine;
use crate::classifier::shorten_question;
use crate::format::{confidence_emoji, format_percentage, format_relative_date, format_volume};
use crate::llm::ChatModel;
use crate::publisher::{Publisher, MAX_POST_CHARS};
use crate::types::{StepOptions, StepReport};
use crate::worker::{FunctionOutput, MarketFunction, WisdomWorker, WORKER_DESCRIPTION};

/// Upper bound on posts per step.
pub const MAX_POSTS_PER_STEP: usize = 2;

pub const GOAL: &str = "You run a social account that shares what \"the crowd thinks\" on \
Polymarket. Each check, look at the prediction markets and post about what the collective \
is predicting. Mix the content: trending markets, confident calls, split decisions and \
category spotlights. Make predictions accessible to a general audience. Post one or two \
times per check, choosing the most interesting markets.";

pub const DESCRIPTION: &str = r#"You are an informative, neutral reporter of collective intelligence.

Voice: professional but accessible, fact-based, curious about crowd wisdom. Emojis sparingly.

Formats you can use (vary them):
- Simple prediction: "The crowd says: 78% chance <event>"
- Confidence call: "💪 HIGH CONFIDENCE: '<question>' - 84% YES"
- Trending: "🔥 TRENDING: <question> / Crowd prediction: 72% / 24hr volume: $1.2M"
- Category roundup: "📊 Politics predictions:" followed by two or three bullet lines
- Split: "🤷 The crowd is split on: <question> / 51% YES vs 49% NO"

Rules:
- Plain language. "The crowd thinks", not "market-implied probability".
- Stay neutral. Never predict outcomes yourself, never mock or praise a prediction.
- Always show the probability.
- Prefer high volume, very confident (>85% or <15%) or near 50/50 markets.
- Never post about low-volume markets (under $3K) or offensive ones.
- If nothing is interesting, skip.

You are the voice of the collective, not an oracle."#;

pub struct WisdomAgent {
    model: Arc<dyn ChatModel>,
    worker: WisdomWorker,
    publisher: Arc<dyn Publisher>,
    rotation: AtomicUsize,
}

impl WisdomAgent {
    pub fn new(model: Arc<dyn ChatModel>, worker: WisdomWorker, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            model,
            worker,
            publisher,
            rotation: AtomicUsize::new(0),
        }
    }

    fn system_prompt() -> String {
        format!("{GOAL}\n\n{DESCRIPTION}")
    }

    fn planning_prompt() -> String {
        let mut prompt = format!("Tool: {WORKER_DESCRIPTION}\n\nAvailable functions:\n");
        for (name, about) in MarketFunction::catalog() {
            let _ = writeln!(prompt, "- {name}: {about}");
        }
        prompt.push_str(
            "\nPick exactly one function to call now. Reply with two lines and nothing else:\n\
             FUNCTION: <function name>\n\
             ARGS: <argument, or none>",
        );
        prompt
    }

    fn compose_prompt(function: &MarketFunction, output: &FunctionOutput, payload: &str) -> String {
        format!(
            "You called {function}. Digest:\n{digest}\nRaw result:\n{payload}\n\n\
             Write at most {MAX_POSTS_PER_STEP} posts of at most {MAX_POST_CHARS} characters \
             each. Start every post with \"TWEET:\". If nothing here is worth posting, reply \
             with the single word SKIP.",
            digest = render_digest(output, Utc::now()),
        )
    }

    /// Next function in the fixed fallback rotation.
    fn next_in_rotation(&self) -> MarketFunction {
        let rotation = [
            MarketFunction::Trending,
            MarketFunction::HighConfidence,
            MarketFunction::Uncertain,
            MarketFunction::ByCategory(MarketFunction::DEFAULT_CATEGORY.to_string()),
        ];
        let i = self.rotation.fetch_add(1, Ordering::Relaxed) % rotation.len();
        rotation[i].clone()
    }

    async fn plan(&self, system: &str, options: StepOptions) -> Result<MarketFunction> {
        let reply = self
            .model
            .complete(system, &Self::planning_prompt())
            .await
            .context("Planning call failed")?;
        log_reply("plan", &reply.text, options);

        Ok(match parse_function_choice(&reply.text) {
            Some(function) => function,
            None => {
                let fallback = self.next_in_rotation();
                warn!(fallback = %fallback, "Could not parse function choice, using rotation");
                fallback
            }
        })
    }

    async fn compose(
        &self,
        system: &str,
        function: &MarketFunction,
        output: &FunctionOutput,
        options: StepOptions,
    ) -> Result<Vec<String>> {
        let payload = output.to_json()?;
        let reply = self
            .model
            .complete(system, &Self::compose_prompt(function, output, &payload))
            .await
            .context("Compose call failed")?;
        log_reply("compose", &reply.text, options);
        Ok(parse_posts(&reply.text))
    }
}

#[async_trait]
impl DecisionEngine for WisdomAgent {
    async fn initialize(&self) -> Result<()> {
        self.model
            .probe()
            .await
            .with_context(|| format!("Language model {} unavailable", self.model.model_name()))?;
        self.publisher
            .verify()
            .await
            .with_context(|| format!("Publisher {} failed verification", self.publisher.name()))?;
        info!(model = self.model.model_name(), publisher = self.publisher.name(), "Agent initialized");
        Ok(())
    }

    async fn step(&self, options: StepOptions) -> Result<StepReport> {
        let system = Self::system_prompt();
        let function = self.plan(&system, options).await?;
        info!(function = %function, "Function selected");

        let output = self.worker.execute(&function).await?;

        let posts = if output.is_empty() {
            info!(function = %function, "No markets matched, nothing to post");
            Vec::new()
        } else {
            self.compose(&system, &function, &output, options).await?
        };

        let mut published = 0;
        for post in &posts {
            let receipt = match self.publisher.publish(post).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    if published > 0 {
                        warn!(
                            published,
                            planned = posts.len(),
                            "Publishing stopped partway, earlier posts already went out"
                        );
                    }
                    return Err(e.context(format!("Failed to publish via {}", self.publisher.name())));
                }
            };
            debug!(id = %receipt.id, dry_run = receipt.dry_run, "Post accepted");
            published += 1;
        }

        Ok(StepReport {
            function: function.to_string(),
            posts_published: published,
            skipped: posts.is_empty(),
        })
    }
}

fn log_reply(stage: &str, text: &str, options: StepOptions) {
    if options.verbose {
        info!(stage, reply = %text, "Model reply");
    } else {
        debug!(stage, reply = %text, "Model reply");
    }
}

/// Parse `FUNCTION: name` / `ARGS: value` out of a planning reply.
///
/// Labels are case-insensitive and may appear anywhere in the reply.
/// `none`, `-` and empty args count as no argument.
pub fn parse_function_choice(reply: &str) -> Option<MarketFunction> {
    let mut name = None;
    let mut args = None;

    for line in reply.lines() {
        let line = line.trim().trim_start_matches(['*', '-', '`']).trim();
        if let Some(rest) = strip_label(line, "FUNCTION:") {
            name.get_or_insert(rest.trim_matches(QUOTES));
        } else if let Some(rest) = strip_label(line, "ARGS:") {
            let rest = rest.trim_matches(QUOTES);
            if !rest.is_empty() && rest != "-" && !rest.eq_ignore_ascii_case("none") {
                args.get_or_insert(rest);
            }
        }
    }

    MarketFunction::from_name(name?, args)
}

/// Split a compose reply into posts.
///
/// Each post starts at a `TWEET:` label and runs until the next one. A
/// reply starting with `SKIP` yields nothing. Posts are clamped to
/// [`MAX_POST_CHARS`] and at most [`MAX_POSTS_PER_STEP`] are kept.
pub fn parse_posts(reply: &str) -> Vec<String> {
    let trimmed = reply.trim();
    if trimmed.get(..4).is_some_and(|head| head.eq_ignore_ascii_case("SKIP")) {
        return Vec::new();
    }

    let mut posts: Vec<String> = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in trimmed.lines() {
        if let Some(rest) = strip_label(line.trim(), "TWEET:") {
            if let Some(lines) = current.take() {
                posts.push(lines.join("\n"));
            }
            current = Some(vec![rest.trim()]);
        } else if let Some(lines) = current.as_mut() {
            lines.push(line.trim_end());
        }
    }
    if let Some(lines) = current {
        posts.push(lines.join("\n"));
    }

    posts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .take(MAX_POSTS_PER_STEP)
        .map(|p| shorten_question(&p, MAX_POST_CHARS))
        .collect()
}

/// Decoration models wrap labels and values in.
const QUOTES: [char; 5] = ['*', '`', '"', '\'', ' '];

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    head.eq_ignore_ascii_case(label).then(|| &line[label.len()..])
}

/// One line per market, rendered for the model.
pub fn render_digest(output: &FunctionOutput, now: DateTime<Utc>) -> String {
    let mut digest = String::new();
    if let Some(category) = &output.category {
        let _ = writeln!(digest, "Category: {category}");
    }
    for m in &output.markets {
        let p = f64::from(m.probability) / 100.0;
        let _ = write!(
            digest,
            "{} {} | crowd {} YES | 24h {} | {}",
            confidence_emoji(p),
            m.question,
            format_percentage(p),
            format_volume(m.volume_24hr as f64),
            m.confidence,
        );
        if let Some(outcome) = m.outcome {
            let _ = write!(digest, " | leaning {outcome}");
        }
        if let Some(category) = &m.category {
            let _ = write!(digest, " | {category}");
        }
        if let Some(end) = m
            .end_date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        {
            let _ = write!(digest, " | closes {}", format_relative_date(end.with_timezone(&Utc), now));
        }
        digest.push('\n');
    }
    digest
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
