//! Single extraction call with resource sampling
//!
//! The invoker runs exactly one capability call against one file, races it
//! against a deadline inside the sampler bracket, and normalizes whatever
//! happens into an [`ExtractionOutcome`]. It never returns an error for a
//! failing extraction.

use crate::config::BenchmarkConfig;
use crate::extractor::{Capability, ExtractionError};
use crate::monitoring::{MonitorScope, ResourceMonitor, ResourceStats, SamplingMode};
use crate::types::{ExtractionOutcome, ExtractionTask};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Longest error message kept when detailed errors are disabled
const SHORT_ERROR_LEN: usize = 200;

/// Runs capability calls and produces outcomes
pub struct ExtractionInvoker {
    workers: Arc<Semaphore>,
    sampling_interval: Duration,
    scope: MonitorScope,
    detailed_errors: bool,
    save_resource_samples: bool,
}

impl ExtractionInvoker {
    pub fn new(config: &BenchmarkConfig) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(config.worker_threads.max(1))),
            sampling_interval: config.sampling_interval(),
            scope: MonitorScope::default(),
            detailed_errors: config.detailed_errors,
            save_resource_samples: config.save_resource_samples,
        }
    }

    pub fn with_monitor_scope(mut self, scope: MonitorScope) -> Self {
        self.scope = scope;
        self
    }

    /// Worker slots currently free for synchronous extractions
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Run one attempt of `task` with `capability`, bounded by `timeout`
    ///
    /// `cache_dir`, when given, is removed before the call so repeated runs
    /// start from the same cold cache. Synchronous calls wait for a worker slot
    /// before the deadline starts; on timeout they are asked to stop and keep
    /// the slot until they do.
    pub async fn invoke(
        &self,
        capability: &Capability,
        task: &ExtractionTask,
        cache_dir: Option<&Path>,
        timeout: Duration,
    ) -> ExtractionOutcome {
        let permit = match self.reserve_worker(capability).await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::warn!("No worker slot for {} on {}: {}", task.framework, task.file_path.display(), e);
                return ExtractionOutcome::failed(
                    task,
                    Duration::ZERO,
                    &ResourceStats::default(),
                    e.kind(),
                    self.error_message(&e),
                );
            }
        };

        let setup = Instant::now();
        if let Some(dir) = cache_dir {
            clear_cache_dir(dir).await;
        }

        let mode = if capability.is_async() {
            SamplingMode::Async
        } else {
            SamplingMode::Thread
        };
        let mut monitor = ResourceMonitor::new(self.sampling_interval).with_scope(self.scope);
        if let Err(e) = monitor.start(mode) {
            tracing::warn!("Resource sampling unavailable for {}: {}", task.file_path.display(), e);
        }

        let startup = setup.elapsed();
        let start = Instant::now();
        let result = tokio::time::timeout(timeout, self.call(capability, &task.file_path, permit)).await;
        let elapsed = start.elapsed();

        let (stats, samples) = monitor.stop().await;

        let outcome = match result {
            Ok(Ok(text)) => ExtractionOutcome::success(task, elapsed, &stats, text),
            Ok(Err(e)) => {
                tracing::debug!(
                    "{} failed on {}: {}: {}",
                    task.framework,
                    task.file_path.display(),
                    e.kind(),
                    e
                );
                ExtractionOutcome::failed(task, elapsed, &stats, e.kind(), self.error_message(&e))
            }
            Err(_) => {
                tracing::debug!(
                    "{} timed out on {} after {:?}",
                    task.framework,
                    task.file_path.display(),
                    timeout
                );
                ExtractionOutcome::timed_out(task, timeout, &stats)
            }
        };

        let outcome = outcome.with_startup_time(startup);
        if self.save_resource_samples {
            outcome.with_samples(samples)
        } else {
            outcome
        }
    }

    async fn reserve_worker(&self, capability: &Capability) -> Result<Option<OwnedSemaphorePermit>, ExtractionError> {
        match capability {
            Capability::Async(_) => Ok(None),
            Capability::Sync(_) => Arc::clone(&self.workers)
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|e| ExtractionError::other("WorkerPoolClosed", e.to_string())),
        }
    }

    async fn call(
        &self,
        capability: &Capability,
        path: &Path,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Result<String, ExtractionError> {
        match capability {
            Capability::Async(extractor) => {
                let extractor = Arc::clone(extractor);
                let path = path.to_path_buf();
                let task = AbortOnDrop(tokio::spawn(async move { extractor.extract_text(&path).await }));
                task.join().await
            }
            Capability::Sync(extractor) => {
                let extractor = Arc::clone(extractor);
                let path: PathBuf = path.to_path_buf();
                let cancel = CancellationToken::new();
                // Fires when this future is dropped at the deadline
                let _cancel_on_drop = cancel.clone().drop_guard();

                // The permit travels with the closure, so an abandoned call
                // keeps its slot until the thread actually returns.
                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    extractor.extract_text_cancellable(&path, &cancel)
                });
                handle.await.unwrap_or_else(|e| Err(join_failure(e)))
            }
        }
    }

    fn error_message(&self, error: &ExtractionError) -> String {
        let message = error.to_string();
        if self.detailed_errors {
            return message;
        }
        shorten(&message)
    }
}

/// First line of `message`, capped at [`SHORT_ERROR_LEN`] characters
fn shorten(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    if first_line.chars().count() <= SHORT_ERROR_LEN {
        return first_line.to_string();
    }
    let mut short: String = first_line.chars().take(SHORT_ERROR_LEN).collect();
    short.push_str("...");
    short
}

/// Remove a framework cache directory; an absent directory is fine
pub async fn clear_cache_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::debug!("Cleared cache directory {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to clear cache directory {}: {}", dir.display(), e),
    }
}

struct AbortOnDrop(JoinHandle<Result<String, ExtractionError>>);

impl AbortOnDrop {
    async fn join(mut self) -> Result<String, ExtractionError> {
        (&mut self.0).await.unwrap_or_else(|e| Err(join_failure(e)))
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn join_failure(error: JoinError) -> ExtractionError {
    if error.is_panic() {
        ExtractionError::Panic(panic_message(error.into_panic()))
    } else {
        ExtractionError::other("Cancelled", error.to_string())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{AsyncExtractor, SyncExtractor};
    use crate::types::{DocumentCategory, ExtractionStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    struct Fixed(&'static str);

    impl SyncExtractor for Fixed {
        fn extract_text(&self, _path: &Path) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl SyncExtractor for Failing {
        fn extract_text(&self, _path: &Path) -> Result<String, ExtractionError> {
            Err(ExtractionError::other("ValueError", "bad format\ntraceback line"))
        }
    }

    struct Panicking;

    impl SyncExtractor for Panicking {
        fn extract_text(&self, _path: &Path) -> Result<String, ExtractionError> {
            panic!("parser exploded")
        }
    }

    /// Blocks until cancelled or a long deadline passes
    #[derive(Default)]
    struct Stoppable {
        stopped: Arc<AtomicBool>,
    }

    impl SyncExtractor for Stoppable {
        fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
            self.extract_text_cancellable(path, &CancellationToken::new())
        }

        fn extract_text_cancellable(&self, _path: &Path, cancel: &CancellationToken) -> Result<String, ExtractionError> {
            let give_up = Instant::now() + Duration::from_secs(30);
            while Instant::now() < give_up {
                if cancel.is_cancelled() {
                    self.stopped.store(true, Ordering::SeqCst);
                    return Err(ExtractionError::other("Cancelled", "stopped"));
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok("never cancelled".to_string())
        }
    }

    /// Ignores cancellation and sleeps
    struct Blocking(Duration);

    impl SyncExtractor for Blocking {
        fn extract_text(&self, _path: &Path) -> Result<String, ExtractionError> {
            std::thread::sleep(self.0);
            Ok("slept".to_string())
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl AsyncExtractor for Slow {
        async fn extract_text(&self, _path: &Path) -> Result<String, ExtractionError> {
            tokio::time::sleep(self.0).await;
            Ok("late".to_string())
        }
    }

    fn invoker(detailed_errors: bool) -> ExtractionInvoker {
        let config = BenchmarkConfig {
            sampling_interval_ms: 5,
            detailed_errors,
            ..Default::default()
        };
        ExtractionInvoker::new(&config).with_monitor_scope(MonitorScope::CurrentProcess)
    }

    fn task() -> ExtractionTask {
        ExtractionTask::new("mock", "/nonexistent/doc.pdf", DocumentCategory::Tiny, 0)
    }

    #[tokio::test]
    async fn test_sync_success() {
        let outcome = invoker(true)
            .invoke(&Capability::sync(Fixed("hello world")), &task(), None, Duration::from_secs(5))
            .await;

        assert_eq!(outcome.status(), ExtractionStatus::Success);
        assert_eq!(outcome.extracted_text(), Some("hello world"));
        assert_eq!(outcome.character_count, Some(11));
        assert_eq!(outcome.word_count, Some(2));
        assert!(outcome.peak_memory_mb > 0.0);
    }

    #[tokio::test]
    async fn test_failure_is_normalized() {
        let outcome = invoker(true)
            .invoke(&Capability::sync(Failing), &task(), None, Duration::from_secs(5))
            .await;

        assert_eq!(outcome.status(), ExtractionStatus::Failed);
        assert!(outcome.extracted_text().is_none());
        assert_eq!(outcome.error_type.as_deref(), Some("ValueError"));
        assert_eq!(outcome.error_message.as_deref(), Some("bad format\ntraceback line"));
    }

    #[tokio::test]
    async fn test_short_errors_keep_first_line() {
        let outcome = invoker(false)
            .invoke(&Capability::sync(Failing), &task(), None, Duration::from_secs(5))
            .await;
        assert_eq!(outcome.error_message.as_deref(), Some("bad format"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let invoker = invoker(true);
        let outcome = invoker
            .invoke(&Capability::sync(Panicking), &task(), None, Duration::from_secs(5))
            .await;

        assert_eq!(outcome.status(), ExtractionStatus::Failed);
        assert_eq!(outcome.error_type.as_deref(), Some("Panic"));
        assert!(outcome.error_message.unwrap_or_default().contains("parser exploded"));
        assert_eq!(invoker.available_workers(), BenchmarkConfig::default().worker_threads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_timeout() {
        let outcome = invoker(true)
            .invoke(
                &Capability::asynchronous(Slow(Duration::from_secs(60))),
                &task(),
                None,
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(outcome.status(), ExtractionStatus::Timeout);
        assert!(outcome.extracted_text().is_none());
        assert_eq!(outcome.extraction_time, 5.0);
        assert_eq!(outcome.error_message.as_deref(), Some("Timeout after 5 seconds"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_success_within_deadline() {
        let outcome = invoker(true)
            .invoke(
                &Capability::asynchronous(Slow(Duration::from_millis(10))),
                &task(),
                None,
                Duration::from_secs(5),
            )
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.word_count, Some(1));
    }

    #[tokio::test]
    async fn test_sync_timeout_stops_worker_and_frees_slot() {
        let invoker = invoker(true);
        let extractor = Stoppable::default();
        let stopped = Arc::clone(&extractor.stopped);

        let outcome = invoker
            .invoke(&Capability::sync(extractor), &task(), None, Duration::from_millis(200))
            .await;

        assert_eq!(outcome.status(), ExtractionStatus::Timeout);
        assert_eq!(outcome.error_type.as_deref(), Some("Timeout"));

        let workers = BenchmarkConfig::default().worker_threads;
        for _ in 0..200 {
            if stopped.load(Ordering::SeqCst) && invoker.available_workers() == workers {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(invoker.available_workers(), workers);
    }

    #[tokio::test]
    async fn test_waiting_for_a_worker_does_not_count_against_deadline() {
        let config = BenchmarkConfig {
            sampling_interval_ms: 5,
            worker_threads: 1,
            ..Default::default()
        };
        let invoker = ExtractionInvoker::new(&config).with_monitor_scope(MonitorScope::CurrentProcess);
        let busy = Capability::sync(Blocking(Duration::from_millis(600)));
        let quick = Capability::sync(Fixed("quick"));

        let first_task = task();
        let first = invoker.invoke(&busy, &first_task, None, Duration::from_secs(5));
        let second = async {
            // Let the first call take the only slot
            tokio::time::sleep(Duration::from_millis(50)).await;
            invoker.invoke(&quick, &task(), None, Duration::from_millis(300)).await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_success());
        assert!(second.is_success());
        assert_eq!(second.extracted_text(), Some("quick"));
    }

    #[tokio::test]
    async fn test_samples_attached_when_enabled() {
        let config = BenchmarkConfig {
            sampling_interval_ms: 5,
            save_resource_samples: true,
            ..Default::default()
        };
        let invoker = ExtractionInvoker::new(&config).with_monitor_scope(MonitorScope::CurrentProcess);
        let outcome = invoker
            .invoke(&Capability::sync(Fixed("x")), &task(), None, Duration::from_secs(5))
            .await;
        assert!(!outcome.resource_samples.is_empty());
    }

    #[tokio::test]
    async fn test_cache_dir_is_cleared() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join(".kreuzberg");
        std::fs::create_dir_all(cache.join("nested")).unwrap();
        std::fs::write(cache.join("nested/entry.bin"), b"cached").unwrap();

        let outcome = invoker(true)
            .invoke(&Capability::sync(Fixed("x")), &task(), Some(&cache), Duration::from_secs(5))
            .await;

        assert!(outcome.is_success());
        assert!(!cache.exists());

        // Absent directory is not an error
        clear_cache_dir(&cache).await;
    }

    #[test]
    fn test_shorten_long_message() {
        let long = "x".repeat(500);
        let short = shorten(&long);
        assert_eq!(short.chars().count(), SHORT_ERROR_LEN + 3);
        assert!(short.ends_with("..."));
        assert_eq!(shorten(""), "");
    }
}
