use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use spoolq::dispatch::Envelope;
use spoolq::error::SpoolError;
use spoolq::spool::{Job, SpoolQueue};
use spoolq::worker::{
    CommandHandler, DispatchHandler, HandlerRegistry, JobHandler, SpoolWorker,
};

struct RecordingHandler {
    handled: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn handle(&self, job: &Job) -> spoolq::Result<()> {
        self.handled.lock().unwrap().push(job.name().to_string());
        Ok(())
    }
}

struct FailingHandler;

#[async_trait]
impl JobHandler for FailingHandler {
    async fn handle(&self, _job: &Job) -> spoolq::Result<()> {
        Err(SpoolError::HandlerFailed("always fails".to_string()))
    }
}

struct PanickingHandler;

#[async_trait]
impl JobHandler for PanickingHandler {
    async fn handle(&self, _job: &Job) -> spoolq::Result<()> {
        panic!("handler blew up");
    }
}

#[tokio::test]
async fn test_worker_drains_queue_and_releases() {
    let root = tempdir().unwrap();
    let queue = SpoolQueue::open(root.path(), "default").unwrap();
    for i in 0..3 {
        queue.submit(format!("payload {}", i).as_bytes()).unwrap();
    }

    let handled = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(RecordingHandler {
        handled: Arc::clone(&handled),
    });
    let slot = queue.bind_worker("host-1").unwrap();
    let processing = slot.processing_dir().to_path_buf();
    let worker = SpoolWorker::new(slot, handler, Duration::from_millis(10));

    let token = CancellationToken::new();
    let run_token = token.clone();
    let run = tokio::spawn(async move { worker.run(run_token).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    token.cancel();
    run.await.unwrap().unwrap();

    assert_eq!(handled.lock().unwrap().len(), 3);
    assert_eq!(fs::read_dir(queue.incoming_dir()).unwrap().count(), 0);
    // Clean exit removes the processing directory
    assert!(!processing.exists());
}

#[tokio::test]
async fn test_failed_jobs_stay_in_processing() {
    let root = tempdir().unwrap();
    let queue = SpoolQueue::open(root.path(), "default").unwrap();
    queue.submit(b"one").unwrap();
    queue.submit(b"two").unwrap();

    let slot = queue.bind_worker("host-1").unwrap();
    let processing = slot.processing_dir().to_path_buf();
    let worker = SpoolWorker::new(slot, Arc::new(FailingHandler), Duration::from_millis(10));

    let token = CancellationToken::new();
    let run_token = token.clone();
    let run = tokio::spawn(async move { worker.run(run_token).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    token.cancel();
    run.await.unwrap().unwrap();

    // Both jobs were claimed, neither was removed
    assert_eq!(fs::read_dir(queue.incoming_dir()).unwrap().count(), 0);
    assert_eq!(fs::read_dir(&processing).unwrap().count(), 2);
    // Release keeps a non-empty directory
    assert!(processing.exists());
}

#[tokio::test]
async fn test_handler_panic_does_not_kill_loop() {
    let root = tempdir().unwrap();
    let queue = SpoolQueue::open(root.path(), "default").unwrap();
    queue.submit(b"one").unwrap();
    queue.submit(b"two").unwrap();

    let slot = queue.bind_worker("host-1").unwrap();
    let processing = slot.processing_dir().to_path_buf();
    let worker = SpoolWorker::new(slot, Arc::new(PanickingHandler), Duration::from_millis(10));

    let token = CancellationToken::new();
    let run_token = token.clone();
    let run = tokio::spawn(async move { worker.run(run_token).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    token.cancel();
    // The loop survived both panics and exited cleanly
    run.await.unwrap().unwrap();

    assert_eq!(fs::read_dir(queue.incoming_dir()).unwrap().count(), 0);
    assert_eq!(fs::read_dir(&processing).unwrap().count(), 2);
}

#[tokio::test]
async fn test_cancelled_token_stops_before_claiming() {
    let root = tempdir().unwrap();
    let queue = SpoolQueue::open(root.path(), "default").unwrap();
    queue.submit(b"untouched").unwrap();

    let handled = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(RecordingHandler {
        handled: Arc::clone(&handled),
    });
    let slot = queue.bind_worker("host-1").unwrap();
    let processing = slot.processing_dir().to_path_buf();
    let worker = SpoolWorker::new(slot, handler, Duration::from_millis(10));

    let token = CancellationToken::new();
    token.cancel();
    worker.run(token).await.unwrap();

    assert!(handled.lock().unwrap().is_empty());
    assert_eq!(fs::read_dir(queue.incoming_dir()).unwrap().count(), 1);
    assert!(!processing.exists());
}

#[tokio::test]
async fn test_dispatch_handler_routes_by_name() {
    let root = tempdir().unwrap();
    let queue = SpoolQueue::open(root.path(), "default").unwrap();
    let envelope = Envelope::new("record", json!({"user": 7}));
    queue.submit(&envelope.to_bytes().unwrap()).unwrap();

    let handled = Arc::new(Mutex::new(Vec::new()));
    let mut handlers = HandlerRegistry::new();
    handlers.register(
        "record",
        Arc::new(RecordingHandler {
            handled: Arc::clone(&handled),
        }),
    );

    let slot = queue.bind_worker("host-1").unwrap();
    let worker = SpoolWorker::new(
        slot,
        Arc::new(DispatchHandler::new(handlers)),
        Duration::from_millis(10),
    );

    let token = CancellationToken::new();
    let run_token = token.clone();
    let run = tokio::spawn(async move { worker.run(run_token).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();
    run.await.unwrap().unwrap();

    assert_eq!(handled.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_handler_name_leaves_job() {
    let root = tempdir().unwrap();
    let queue = SpoolQueue::open(root.path(), "default").unwrap();
    let envelope = Envelope::new("nobody", json!(null));
    queue.submit(&envelope.to_bytes().unwrap()).unwrap();

    let slot = queue.bind_worker("host-1").unwrap();
    let processing = slot.processing_dir().to_path_buf();
    let worker = SpoolWorker::new(
        slot,
        Arc::new(DispatchHandler::new(HandlerRegistry::new())),
        Duration::from_millis(10),
    );

    let token = CancellationToken::new();
    let run_token = token.clone();
    let run = tokio::spawn(async move { worker.run(run_token).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();
    run.await.unwrap().unwrap();

    assert_eq!(fs::read_dir(&processing).unwrap().count(), 1);
}

#[test]
fn test_handler_registry_lookup() {
    let mut handlers = HandlerRegistry::new();
    assert!(handlers.is_empty());

    handlers.register("command", Arc::new(CommandHandler));
    assert_eq!(handlers.len(), 1);
    assert!(handlers.get("command").is_some());
    assert!(handlers.get("missing").is_none());
}

#[tokio::test]
async fn test_command_handler_runs_program() {
    let root = tempdir().unwrap();
    let queue = SpoolQueue::open(root.path(), "default").unwrap();
    let envelope = Envelope::new("command", json!({"program": "true"}));
    queue.submit(&envelope.to_bytes().unwrap()).unwrap();

    let slot = queue.bind_worker("host-1").unwrap();
    let job = slot.claim().unwrap().unwrap();

    CommandHandler.handle(&job).await.unwrap();
}

#[tokio::test]
async fn test_command_handler_fails_on_nonzero_exit() {
    let root = tempdir().unwrap();
    let queue = SpoolQueue::open(root.path(), "default").unwrap();
    let envelope = Envelope::new("command", json!({"program": "false"}));
    queue.submit(&envelope.to_bytes().unwrap()).unwrap();

    let slot = queue.bind_worker("host-1").unwrap();
    let job = slot.claim().unwrap().unwrap();

    let outcome = CommandHandler.handle(&job).await;
    assert!(matches!(outcome, Err(SpoolError::HandlerFailed(_))));
}

#[tokio::test]
async fn test_command_handler_fails_on_missing_program() {
    let root = tempdir().unwrap();
    let queue = SpoolQueue::open(root.path(), "default").unwrap();
    let envelope = Envelope::new(
        "command",
        json!({"program": "/no/such/binary", "args": ["-x"]}),
    );
    queue.submit(&envelope.to_bytes().unwrap()).unwrap();

    let slot = queue.bind_worker("host-1").unwrap();
    let job = slot.claim().unwrap().unwrap();

    assert!(CommandHandler.handle(&job).await.is_err());
}
