//! WISDOM: Polymarket crowd-prediction tracker
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the agent together and hands it to the scheduler. Exit codes:
//! 0 on SIGINT/SIGTERM, 1 on fatal initialization or uncaught failure.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use wisdom::config::AppConfig;
use wisdom::engine::agent::WisdomAgent;
use wisdom::engine::scheduler::{Scheduler, SchedulerSettings};
use wisdom::engine::supervisor::{carry_out, drive, plan_startup_failure, shutdown_signal, Supervisor};
use wisdom::llm::anthropic::AnthropicClient;
use wisdom::llm::openrouter::OpenRouterClient;
use wisdom::llm::ChatModel;
use wisdom::platforms::polymarket::PolymarketClient;
use wisdom::publisher::{LogPublisher, Publisher, TwitterPublisher};
use wisdom::worker::WisdomWorker;

const CONFIG_PATH: &str = "config.toml";

const BANNER: &str = r#"
__        _____ ____  ____   ___  __  __
\ \      / /_ _/ ___||  _ \ / _ \|  \/  |
 \ \ /\ / / | |\___ \| | | | | | | |\/| |
  \ V  V /  | | ___) | |_| | |_| | |  | |
   \_/\_/  |___|____/|____/ \___/|_|  |_|

  What the crowd thinks, from Polymarket
  v0.1.0
"#;

#[tokio::main]
async fn main() {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let code = match run().await {
        Ok(code) => code,
        Err(e) => carry_out(plan_startup_failure(&e)).await,
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cfg = AppConfig::load_or_default(CONFIG_PATH)?;

    println!("{BANNER}");
    println!("  Mission:  share crowd predictions, neutrally");
    println!("  Platform: Polymarket (Gamma API) -> X");
    println!(
        "  Cadence:  every {} min, up to 2 posts per check\n",
        cfg.agent.check_interval_secs / 60
    );

    let api_key = AppConfig::require_secret(&cfg.llm.api_key_env)?;

    // -- Initialise components -------------------------------------------

    let model: Arc<dyn ChatModel> = match cfg.llm.provider.as_str() {
        "anthropic" => {
            info!(model = %cfg.llm.model, "Using Anthropic LLM provider");
            Arc::new(AnthropicClient::new(api_key, Some(cfg.llm.model.clone()), Some(cfg.llm.max_tokens))?)
        }
        other => {
            if other != "openrouter" {
                warn!(provider = other, "Unknown LLM provider, defaulting to OpenRouter");
            }
            info!(
                model = %cfg.llm.model,
                fallback = ?cfg.llm.fallback_model,
                "Using OpenRouter LLM provider"
            );
            Arc::new(OpenRouterClient::new(
                api_key,
                Some(cfg.llm.model.clone()),
                cfg.llm.fallback_model.clone(),
                Some(cfg.llm.max_tokens),
            )?)
        }
    };

    let source = PolymarketClient::new(
        Some(cfg.polymarket.gamma_url.clone()),
        Some(std::time::Duration::from_secs(cfg.polymarket.request_timeout_secs)),
    )?;
    let worker = WisdomWorker::new(Arc::new(source), (&cfg.classifier).into());

    let publisher: Arc<dyn Publisher> = if cfg.publisher.dry_run {
        info!("Dry run enabled, posts will only be logged");
        Arc::new(LogPublisher)
    } else {
        match AppConfig::optional_secret(&cfg.publisher.bearer_token_env) {
            Some(token) => Arc::new(TwitterPublisher::new(token, Some(cfg.publisher.api_url.clone()))?),
            None => {
                warn!(
                    env = %cfg.publisher.bearer_token_env,
                    "No X API token configured, falling back to dry run"
                );
                Arc::new(LogPublisher)
            }
        }
    };

    let agent = Arc::new(WisdomAgent::new(model, worker, publisher));

    // -- Run -------------------------------------------------------------

    let scheduler = Scheduler::new(agent, SchedulerSettings::from_config(&cfg));
    let runner = scheduler.runner();
    let supervisor = Supervisor::from_config(&cfg.supervisor);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));

    info!(
        agent_name = %cfg.agent.name,
        interval_secs = cfg.agent.check_interval_secs,
        "WISDOM starting up. Press Ctrl+C to stop."
    );

    let code = drive(handle, shutdown_tx, shutdown_signal(), &supervisor).await;

    let stats = runner.stats();
    info!(
        cycles = stats.total(),
        completed = stats.completed,
        rate_limited = stats.rate_limited,
        failed = stats.failed,
        timed_out = stats.timed_out,
        posts = stats.posts_published,
        code,
        "WISDOM shut down."
    );

    Ok(code)
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wisdom=info"));

    let json_logging = std::env::var("WISDOM_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
