//! Scheduler behaviour end to end: backoff, fatal init and exit plans.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_test::{assert_err, assert_ok};

use wisdom::config::AppConfig;
use wisdom::engine::scheduler::{Scheduler, SchedulerPhase, SchedulerSettings};
use wisdom::engine::supervisor::{drive, plan_startup_failure, Supervisor};
use wisdom::error::SchedulerError;

use crate::fakes::{rate_limited, RecordingSleeper, ScriptedEngine};

fn settings() -> SchedulerSettings {
    SchedulerSettings::from_config(&AppConfig::default())
}

#[tokio::test]
async fn test_five_rate_limits_trigger_cooldown_and_reset() {
    let script = (0..5).map(|_| Err(rate_limited())).collect();
    let engine = Arc::new(ScriptedEngine::new(script));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut scheduler = Scheduler::new(engine.clone(), settings()).with_sleeper(sleeper.clone());

    assert_ok!(scheduler.initialize().await);

    assert_eq!(sleeper.millis(), vec![1000, 2000, 4000, 8000, 300_000]);
    assert_eq!(scheduler.state().retry_count, 0);
    assert_eq!(scheduler.phase(), SchedulerPhase::Running);
    assert_eq!(engine.init_calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_rate_limit_detected_from_message_only() {
    let script = vec![Err(anyhow::anyhow!("Request failed with status code 429"))];
    let engine = Arc::new(ScriptedEngine::new(script));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut scheduler = Scheduler::new(engine, settings()).with_sleeper(sleeper.clone());

    scheduler.initialize().await.unwrap();
    assert_eq!(sleeper.millis(), vec![1000]);
}

#[tokio::test]
async fn test_fatal_init_exits_one_without_retry() {
    let script = vec![Err(anyhow::anyhow!("invalid API key"))];
    let engine = Arc::new(ScriptedEngine::new(script));
    let sleeper = Arc::new(RecordingSleeper::default());
    let scheduler = Scheduler::new(engine.clone(), settings()).with_sleeper(sleeper.clone());
    let (_tx, rx) = watch::channel(false);

    let outcome = scheduler.run(rx).await;
    assert!(matches!(outcome, Err(SchedulerError::FatalInit(_))));
    assert_err!(&outcome);
    assert!(sleeper.millis().is_empty());
    assert_eq!(engine.init_calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.steps.load(Ordering::SeqCst), 0);

    let plan = Supervisor::default().plan(&outcome);
    assert_eq!(plan.code(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_exits_zero() {
    let engine = Arc::new(ScriptedEngine::new(Vec::new()));
    let scheduler = Scheduler::new(engine.clone(), settings());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(rx));

    // First cycle runs at once; the next tick is two hours away.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(engine.steps.load(Ordering::SeqCst), 1);

    tx.send(true).unwrap();
    let outcome = handle.await.unwrap();
    assert_eq!(Supervisor::default().plan(&outcome).code(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_default_interval_is_two_hours() {
    let engine = Arc::new(ScriptedEngine::new(Vec::new()));
    let scheduler = Scheduler::new(engine.clone(), settings());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(rx));

    tokio::time::sleep(Duration::from_secs(2 * 60 * 60 - 1)).await;
    assert_eq!(engine.steps.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(engine.steps.load(Ordering::SeqCst), 2);

    tx.send(true).unwrap();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_signal_while_running_exits_zero() {
    let engine = Arc::new(ScriptedEngine::new(Vec::new()));
    let scheduler = Scheduler::new(engine.clone(), settings());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(rx));
    let signal = async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        "SIGTERM"
    };

    let code = drive(handle, tx, signal, &Supervisor::default()).await;
    assert_eq!(code, 0);
    assert_eq!(engine.steps.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_driven_fatal_init_exits_one() {
    let engine = Arc::new(ScriptedEngine::new(vec![Err(anyhow::anyhow!("invalid API key"))]));
    let scheduler = Scheduler::new(engine, settings());
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(rx));

    let code = drive(handle, tx, std::future::pending(), &Supervisor::default()).await;
    assert_eq!(code, 1);
}

#[test]
fn test_missing_llm_key_exits_one() {
    let cfg = AppConfig::parse("[llm]\napi_key_env = \"WISDOM_IT_UNSET_LLM_KEY\"").unwrap();
    let err = AppConfig::require_secret(&cfg.llm.api_key_env).unwrap_err();

    let plan = plan_startup_failure(&err.into());
    assert_eq!(plan.code(), 1);
    assert_eq!(plan.delay(), Duration::ZERO);
}

#[test]
fn test_zero_interval_config_exits_one() {
    let err = AppConfig::parse("[agent]\ncheck_interval_secs = 0").unwrap_err();
    assert_eq!(plan_startup_failure(&err).code(), 1);
}
