use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use robata::core::dispatch::BATCH_ID_KEY;
use robata::{
    BatchConfig, Engine, JobError, JobRegistry, JobStatus, Output, Params, ProcessingError,
    Processor, Request, Response, processor_fn,
};
use serde_json::json;
use uuid::Uuid;

fn echo() -> impl Processor {
    processor_fn(|request: Request| async move {
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok::<_, ProcessingError>(Output::new(format!("echo: {}", request.payload())))
    })
}

fn engine_with(config: BatchConfig) -> Engine<impl Processor> {
    Engine::new(echo(), config, Arc::new(JobRegistry::new())).expect("valid config")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_request_gets_exactly_one_response() {
    let engine = engine_with(BatchConfig::default().with_max_batch_size(7).with_max_workers(3));
    engine.start().await;

    let calls: Arc<Vec<AtomicUsize>> = Arc::new((0..100).map(|_| AtomicUsize::new(0)).collect());
    let mut futures = Vec::new();
    for n in 0..100 {
        let calls = calls.clone();
        futures.push(
            engine
                .submit_request(
                    n.to_string(),
                    Params::new(),
                    Some(Box::new(move |_: &Response| {
                        calls[n].fetch_add(1, Ordering::SeqCst);
                    })),
                )
                .await,
        );
    }
    let ids: Vec<Uuid> = futures.iter().map(|f| f.request_id()).collect();

    let responses: Vec<Response> =
        join_all(futures).await.into_iter().map(Result::unwrap).collect();

    for (id, response) in ids.iter().zip(&responses) {
        assert_eq!(response.request_id(), *id);
    }
    for (n, response) in responses.iter().enumerate() {
        assert_eq!(response.output(), Some(format!("echo: {n}").as_str()));
    }
    assert!(calls.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    assert_eq!(engine.batcher().pending_count().await, 0);
    engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submitters_each_get_their_own_response() {
    let config = BatchConfig::default().with_batch_timeout(Duration::from_millis(5));
    let engine = Arc::new(engine_with(config));
    engine.start().await;

    let tasks: Vec<_> = (0..8)
        .map(|worker| {
            let engine = engine.clone();
            tokio::spawn(async move {
                for n in 0..10 {
                    let payload = format!("{worker}-{n}");
                    let response = engine
                        .submit_request(payload.clone(), Params::new(), None)
                        .await
                        .await
                        .unwrap();
                    assert_eq!(response.output(), Some(format!("echo: {payload}").as_str()));
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn twenty_five_requests_in_batches_of_ten() {
    let engine = engine_with(
        BatchConfig::default()
            .with_max_batch_size(10)
            .with_batch_timeout(Duration::from_millis(100))
            .with_max_workers(4),
    );

    let mut futures = Vec::new();
    for n in 0..25 {
        futures.push(engine.submit_request(n.to_string(), Params::new(), None).await);
    }
    engine.start().await;

    let responses: Vec<Response> =
        join_all(futures).await.into_iter().map(Result::unwrap).collect();
    let mut batches: HashMap<u64, usize> = HashMap::new();
    for response in &responses {
        *batches.entry(response.metadata()[BATCH_ID_KEY].as_u64().unwrap()).or_default() += 1;
    }
    let mut sizes: Vec<usize> = batches.into_values().collect();
    sizes.sort_unstable();

    assert_eq!(responses.len(), 25);
    assert!(responses.iter().all(Response::is_success));
    assert_eq!(sizes, vec![5, 10, 10]);
    engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_requests_do_not_poison_the_batch() {
    let processor = processor_fn(|request: Request| async move {
        match request.payload().parse::<u32>() {
            Ok(n) if n % 3 == 0 => Err(ProcessingError::new(format!("{n} is divisible by three"))),
            Ok(n) if n % 5 == 0 => panic!("{n} is divisible by five"),
            Ok(n) => Ok(Output::new(n.to_string())),
            Err(_) => Err(ProcessingError::new("not a number")),
        }
    });
    let engine =
        Engine::new(processor, BatchConfig::default(), Arc::new(JobRegistry::new())).unwrap();
    engine.start().await;

    let mut futures = Vec::new();
    for n in 1..=15u32 {
        futures.push(engine.submit_request(n.to_string(), Params::new(), None).await);
    }
    let responses: Vec<Response> =
        join_all(futures).await.into_iter().map(Result::unwrap).collect();

    for (n, response) in (1..=15u32).zip(&responses) {
        if n % 3 == 0 {
            assert_eq!(response.error(), Some(format!("{n} is divisible by three").as_str()));
        } else if n % 5 == 0 {
            assert!(response.error().unwrap().contains("divisible by five"));
        } else {
            assert_eq!(response.output(), Some(n.to_string().as_str()));
        }
    }
    engine.stop().await;
}

#[tokio::test]
async fn job_progress_then_completion() {
    let engine = engine_with(BatchConfig::default());

    let id = engine.create_job(Params::new()).await;
    engine.update_progress(id, 50.0, None).await;
    engine.complete_job(id, json!("done")).await;

    let job = engine.get_status(id).await.unwrap();
    assert_eq!(job.progress, 100.0);
    assert_eq!(job.result, Some(json!("done")));
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn cancelled_job_raises_on_result() {
    let engine = engine_with(BatchConfig::default());

    let id = engine.create_job(Params::new()).await;
    assert!(engine.cancel_job(id).await);
    assert_eq!(
        engine.get_result(id, Duration::from_secs(1)).await,
        Err(JobError::Cancelled { id })
    );
    assert!(!engine.cancel_job(id).await);
}

#[tokio::test]
async fn completed_result_survives_later_fail_and_cancel() {
    let engine = engine_with(BatchConfig::default());

    let id = engine.create_job(Params::new()).await;
    engine.complete_job(id, json!({"text": "r"})).await;
    engine.fail_job(id, "e").await;
    engine.cancel_job(id).await;

    assert_eq!(engine.get_status(id).await.unwrap().result, Some(json!({"text": "r"})));
    assert_eq!(engine.get_result(id, Duration::ZERO).await, Ok(json!({"text": "r"})));
}

#[tokio::test]
async fn unknown_job_operations_never_create_records() {
    let engine = engine_with(BatchConfig::default());
    let id = Uuid::new_v4();

    engine.update_progress(id, 10.0, Some(JobStatus::Running)).await;
    engine.complete_job(id, json!(1)).await;
    engine.fail_job(id, "x").await;
    assert!(!engine.cancel_job(id).await);

    assert!(engine.get_status(id).await.is_none());
    assert!(engine.jobs().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn get_result_returns_if_completed_before_deadline() {
    let engine = Arc::new(engine_with(BatchConfig::default()));
    let id = engine.create_job(Params::new()).await;
    let timeout = Duration::from_millis(200);

    let completer = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(timeout / 2).await;
        completer.complete_job(id, json!(42)).await;
    });

    assert_eq!(engine.get_result(id, timeout).await, Ok(json!(42)));
}

#[tokio::test(start_paused = true)]
async fn get_result_times_out_for_stuck_job() {
    let engine = engine_with(BatchConfig::default());
    let id = engine.create_job(Params::new()).await;
    let timeout = Duration::from_millis(200);

    let started = tokio::time::Instant::now();
    assert_eq!(engine.get_result(id, timeout).await, Err(JobError::Timeout { id, timeout }));
    let waited = started.elapsed();
    assert!(waited >= timeout && waited < timeout * 2);
}

#[tokio::test]
async fn cleanup_evicts_only_finished_jobs() {
    let engine = engine_with(BatchConfig::default());

    let finished = engine.create_job(Params::new()).await;
    engine.fail_job(finished, "broken").await;
    let pending = engine.create_job(Params::new()).await;
    let running = engine.create_job(Params::new()).await;
    engine.update_progress(running, 1.0, Some(JobStatus::Running)).await;

    assert_eq!(engine.cleanup_old_jobs(Duration::ZERO).await, 1);
    assert!(engine.get_status(finished).await.is_none());
    assert!(engine.get_status(pending).await.is_some());
    assert!(engine.get_status(running).await.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tracked_submission_completes_its_job() {
    let engine = engine_with(BatchConfig::default());
    engine.start().await;

    let id = engine.submit_tracked("track me", Params::new()).await;
    assert_eq!(
        engine.get_result(id, Duration::from_secs(5)).await,
        Ok(json!("echo: track me"))
    );
    let job = engine.get_status(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.metadata["payload"], "track me");
    engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tracked_submission_records_failure() {
    let processor =
        processor_fn(|_: Request| async { Err::<Output, _>(ProcessingError::new("no GPU")) });
    let engine =
        Engine::new(processor, BatchConfig::default(), Arc::new(JobRegistry::new())).unwrap();
    engine.start().await;

    let id = engine.submit_tracked("anything", Params::new()).await;
    assert_eq!(
        engine.get_result(id, Duration::from_secs(5)).await,
        Err(JobError::Failed { id, reason: "no GPU".into() })
    );
    engine.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_tracked_job_stays_cancelled() {
    let engine = engine_with(BatchConfig::default());

    let id = engine.submit_tracked("slow", Params::new()).await;
    assert_eq!(engine.get_status(id).await.unwrap().status, JobStatus::Running);
    assert!(engine.cancel_job(id).await);

    engine.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(engine.get_status(id).await.unwrap().status, JobStatus::Cancelled);
    engine.stop().await;
}
