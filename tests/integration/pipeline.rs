//! The real agent wired to fakes: fetch, classify, compose, publish.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use wisdom::classifier::ClassifierSettings;
use wisdom::config::AppConfig;
use wisdom::engine::agent::WisdomAgent;
use wisdom::engine::scheduler::{Scheduler, SchedulerSettings};
use wisdom::engine::DecisionEngine;
use wisdom::platforms::MarketQuery;
use wisdom::types::StepOptions;
use wisdom::worker::{MarketFunction, WisdomWorker};

use crate::fakes::{board, FixedSource, RecordingPublisher, ScriptedModel};

fn wire_agent(
    replies: &[&str],
) -> (WisdomAgent, Arc<FixedSource>, Arc<RecordingPublisher>) {
    let source = Arc::new(FixedSource::new(board()));
    let publisher = Arc::new(RecordingPublisher::default());
    let worker = WisdomWorker::new(source.clone(), ClassifierSettings::default());
    let agent = WisdomAgent::new(Arc::new(ScriptedModel::new(replies)), worker, publisher.clone());
    (agent, source, publisher)
}

#[tokio::test]
async fn test_step_publishes_two_posts_at_most() {
    let (agent, source, publisher) = wire_agent(&[
        "FUNCTION: get_uncertain_markets\nARGS: none",
        "TWEET: 🤷 The crowd is split on BTC above $100k: 50% YES vs 50% NO\n\
         TWEET: second\n\
         TWEET: third is dropped",
    ]);

    agent.initialize().await.unwrap();
    let report = agent.step(StepOptions::default()).await.unwrap();

    assert_eq!(report.function, MarketFunction::UNCERTAIN);
    assert_eq!(report.posts_published, 2);
    assert_eq!(source.queries.lock().unwrap().as_slice(), &[MarketQuery::WIDE]);

    let posts = publisher.posts.lock().unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts[0].starts_with("🤷 The crowd is split"));
    assert!(posts.iter().all(|p| p.chars().count() <= 280));
}

#[tokio::test]
async fn test_skip_publishes_nothing() {
    let (agent, _source, publisher) =
        wire_agent(&["FUNCTION: get_trending_markets\nARGS: none", "SKIP"]);

    let report = agent.step(StepOptions::default()).await.unwrap();
    assert!(report.skipped);
    assert_eq!(report.posts_published, 0);
    assert!(publisher.posts.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_drives_agent() {
    let (agent, source, publisher) = wire_agent(&[
        "FUNCTION: get_high_confidence_markets\nARGS: none",
        "TWEET: 🔥 The crowd is 98% sure it won't snow in Miami in July",
        // Second cycle: unparseable plan, rotation starts at trending.
        "not sure",
        "SKIP",
    ]);

    let mut cfg = AppConfig::default();
    cfg.agent.check_interval_secs = 600;
    let scheduler = Scheduler::new(Arc::new(agent), SchedulerSettings::from_config(&cfg));
    let runner = scheduler.runner();
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(rx));

    tokio::time::sleep(Duration::from_secs(601)).await;

    let stats = runner.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.posts_published, 1);
    assert_eq!(publisher.posts.lock().unwrap().len(), 1);
    assert_eq!(
        source.queries.lock().unwrap().as_slice(),
        &[MarketQuery::WIDE, MarketQuery::TRENDING]
    );

    tx.send(true).unwrap();
    assert!(handle.await.unwrap().is_ok());
}
