use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;
use robata::{
    BatchConfig, Callback, Engine, JobRegistry, Output, Params, ProcessingError, Processor,
    Request, Response,
};
use serde_json::json;
use tracing::info;

/// Pretends to generate text, taking a random amount of time and failing
/// on empty prompts.
struct SlowEcho;

#[async_trait]
impl Processor for SlowEcho {
    async fn process(&self, request: &Request) -> Result<Output, ProcessingError> {
        if request.payload().trim().is_empty() {
            return Err(ProcessingError::new("empty prompt"));
        }
        let delay = rand::thread_rng().gen_range(5..50);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let reversed: String = request.payload().chars().rev().collect();
        Ok(Output::new(reversed).with_metadata("delay_ms", delay))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = BatchConfig::from_env().context("reading ROBATA_* settings")?;
    let jobs = Arc::new(JobRegistry::new());
    let reaper = jobs.spawn_reaper(Duration::from_secs(1), Duration::from_secs(30));
    let engine = Engine::new(SlowEcho, config, jobs.clone())?;
    engine.start().await;

    let prompts = ["hello", "batched", "", "world", "robata"];
    let mut pending = Vec::new();
    for prompt in prompts {
        let callback: Callback = Box::new(|response: &Response| {
            info!(
                request_id = %response.request_id(),
                success = response.is_success(),
                "Callback fired"
            );
        });
        pending.push(engine.submit_request(prompt, Params::new(), Some(callback)).await);
    }
    for response in join_all(pending).await {
        let response = response?;
        match response.output() {
            Some(output) => info!(output, took = ?response.duration(), "Request succeeded"),
            None => info!(error = response.error().unwrap_or_default(), "Request failed"),
        }
    }

    let tracked = engine.submit_tracked("tracked prompt", Params::new()).await;
    let result = engine.get_result(tracked, Duration::from_secs(5)).await?;
    info!(job_id = %tracked, %result, "Tracked job finished");

    let metadata = Params::from_iter([("kind".to_string(), json!("manual"))]);
    let manual = engine.create_job(metadata).await;
    for step in 1..=4 {
        engine.update_progress(manual, step as f64 * 25.0, Some(robata::JobStatus::Running)).await;
    }
    engine.complete_job(manual, json!({"steps": 4})).await;
    info!(counts = ?jobs.counts().await, "Job summary");

    engine.stop().await;
    reaper.stop().await;
    Ok(())
}
