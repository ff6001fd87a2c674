use async_trait::async_trait;
use futures::future::join_all;
use git_deployer::core::git::{CommandRequest, CommandResult, CommandRunner, SerialQueue};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Records start/finish order and the highest number of overlapping runs.
#[derive(Default)]
struct TrackingRunner {
    running: AtomicUsize,
    max_running: AtomicUsize,
    log: Mutex<Vec<String>>,
}

#[async_trait]
impl CommandRunner for TrackingRunner {
    async fn run(&self, request: &CommandRequest) -> CommandResult {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let label = request.args.join(" ");
        self.log.lock().unwrap().push(format!("start {}", label));

        sleep(Duration::from_millis(5)).await;

        self.log.lock().unwrap().push(format!("end {}", label));
        self.running.fetch_sub(1, Ordering::SeqCst);

        if label.starts_with("fail") {
            return CommandResult {
                succeeded: false,
                exit_code: Some(128),
                stdout: String::new(),
                stderr: format!("fatal: {}", label),
            };
        }
        CommandResult {
            succeeded: true,
            exit_code: Some(0),
            stdout: label,
            stderr: String::new(),
        }
    }
}

fn request(label: &str) -> CommandRequest {
    CommandRequest::new("git", [label], Path::new("."))
}

#[tokio::test]
async fn test_sequential_submissions_run_in_order() {
    let runner = Arc::new(TrackingRunner::default());
    let queue = SerialQueue::with_runner(runner.clone(), Duration::ZERO, None);

    for label in ["j1", "j2", "j3"] {
        let result = queue.submit(request(label)).await;
        assert_eq!(result.stdout, label);
    }

    let log = runner.log.lock().unwrap().clone();
    assert_eq!(
        log,
        vec!["start j1", "end j1", "start j2", "end j2", "start j3", "end j3"]
    );
}

#[tokio::test]
async fn test_concurrent_submissions_never_overlap() {
    let runner = Arc::new(TrackingRunner::default());
    let queue = SerialQueue::with_runner(runner.clone(), Duration::ZERO, None);

    let jobs: Vec<_> = (0..20)
        .map(|i| {
            let queue = queue.clone();
            let label = if i % 4 == 0 {
                format!("fail-{}", i)
            } else {
                format!("job-{}", i)
            };
            tokio::spawn(async move { (label.clone(), queue.submit(request(&label)).await) })
        })
        .collect();

    let results = join_all(jobs).await;
    assert_eq!(results.len(), 20);
    for joined in results {
        let (label, result) = joined.unwrap();
        if label.starts_with("fail") {
            assert!(!result.succeeded);
            assert!(result.error_message().contains(&label));
        } else {
            assert!(result.succeeded);
            assert_eq!(result.stdout, label);
        }
    }

    assert_eq!(runner.max_running.load(Ordering::SeqCst), 1);
    assert_eq!(runner.log.lock().unwrap().len(), 40);
    assert!(!queue.is_busy());
}

#[tokio::test]
async fn test_settle_delay_spaces_out_commands() {
    let runner = Arc::new(TrackingRunner::default());
    let queue = SerialQueue::with_runner(runner, Duration::from_millis(50), None);

    let started = Instant::now();
    let (a, b, c) = tokio::join!(
        queue.submit(request("a")),
        queue.submit(request("b")),
        queue.submit(request("c")),
    );
    assert!(a.succeeded && b.succeeded && c.succeeded);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_real_git_failure_resolves_with_stderr() {
    let queue = SerialQueue::new(Duration::ZERO, Some(Duration::from_secs(30)), None);
    let temp_dir = tempfile::TempDir::new().unwrap();

    let result = queue
        .submit(CommandRequest::git(["rev-parse", "HEAD"], temp_dir.path()))
        .await;
    assert!(!result.succeeded);
    assert!(!result.error_message().is_empty());

    let version = queue
        .submit(CommandRequest::git(["--version"], temp_dir.path()))
        .await;
    assert!(version.succeeded);
    assert!(version.stdout.starts_with("git version"));
}
