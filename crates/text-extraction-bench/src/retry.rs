//! Timeout and bounded retry policy
//!
//! [`RetryController`] decides, for one file × framework × pass, whether to
//! attempt at all, when to retry, how long to back off, and whether an
//! exhausted failure is recorded or aborts the run. It is the only place that
//! makes that call.

use crate::config::BenchmarkConfig;
use crate::extractor::Capability;
use crate::invoker::ExtractionInvoker;
use crate::types::{DocumentCategory, ExtractionOutcome, ExtractionStatus, ExtractionTask};
use crate::{Error, Result};
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Identity of one tracked failure series: framework, category pass and file
///
/// Separate keys keep one framework's failures from skipping a file for
/// another framework, or for another category pass of the same iteration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FailureKey {
    pub framework: String,
    pub category: DocumentCategory,
    pub file: PathBuf,
}

impl FailureKey {
    pub fn new(framework: impl Into<String>, category: DocumentCategory, file: impl Into<PathBuf>) -> Self {
        Self {
            framework: framework.into(),
            category,
            file: file.into(),
        }
    }
}

impl From<&ExtractionTask> for FailureKey {
    fn from(task: &ExtractionTask) -> Self {
        Self::new(task.framework.clone(), task.category, task.file_path.clone())
    }
}

impl From<&ExtractionOutcome> for FailureKey {
    fn from(outcome: &ExtractionOutcome) -> Self {
        Self::new(outcome.framework.clone(), outcome.category, outcome.file_path.clone())
    }
}

/// Consecutive exhausted-failure counts per framework, category and file
///
/// Owned by the runner and only touched from its control flow.
#[derive(Debug, Default, Clone)]
pub struct FailureTracker {
    counts: AHashMap<FailureKey, u32>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, key: &FailureKey) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Increment after an exhausted attempt sequence, returning the new count
    pub fn record_failure(&mut self, key: FailureKey) -> u32 {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset(&mut self, key: &FailureKey) {
        self.counts.remove(key);
    }

    /// Number of series with at least one recorded failure
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Delay before attempt `attempt` (0-based): `retry_backoff^(attempt - 1)` seconds
///
/// The first attempt (index 0) never waits.
pub fn backoff_delay(retry_backoff: f64, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    Duration::try_from_secs_f64(retry_backoff.powi(exponent)).unwrap_or(Duration::MAX)
}

/// Applies the timeout and retry policy around the invoker
#[derive(Debug, Clone)]
pub struct RetryController {
    max_retries: u32,
    retry_backoff: f64,
    timeout: Duration,
    continue_on_error: bool,
    skip_on_repeated_failure: bool,
    cancel: CancellationToken,
}

impl RetryController {
    pub fn new(config: &BenchmarkConfig, cancel: CancellationToken) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            retry_backoff: config.retry_backoff,
            timeout: config.timeout(),
            continue_on_error: config.continue_on_error,
            skip_on_repeated_failure: config.skip_on_repeated_failure,
            cancel,
        }
    }

    /// Whether this series has failed often enough to be left out of this pass
    pub fn should_skip(&self, tracker: &FailureTracker, key: &FailureKey) -> bool {
        self.skip_on_repeated_failure && tracker.count(key) >= self.max_retries
    }

    /// Run `task` until it succeeds or its attempts are exhausted
    ///
    /// Returns `Ok(None)` when the file is skipped for repeated failure.
    ///
    /// # Errors
    ///
    /// - [`Error::ExtractionFailed`] when the last attempt failed and
    ///   `continue_on_error` is disabled
    /// - [`Error::Interrupted`] when the cancellation token fires mid-sequence
    pub async fn run(
        &self,
        invoker: &ExtractionInvoker,
        capability: &Capability,
        task: &ExtractionTask,
        cache_dir: Option<&Path>,
        tracker: &mut FailureTracker,
    ) -> Result<Option<ExtractionOutcome>> {
        let key = FailureKey::from(task);
        if self.should_skip(tracker, &key) {
            tracing::info!(
                "Skipping {} for {}: failed {} time(s) already",
                task.file_path.display(),
                task.framework,
                tracker.count(&key)
            );
            return Ok(None);
        }

        let mut last: Option<ExtractionOutcome> = None;

        for attempt in 0..self.max_retries {
            let delay = backoff_delay(self.retry_backoff, attempt);
            if !delay.is_zero() {
                tracing::debug!(
                    "Retrying {} with {} in {:?} (attempt {}/{})",
                    task.file_path.display(),
                    task.framework,
                    delay,
                    attempt + 1,
                    self.max_retries
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(Error::Interrupted { completed: 0 }),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Interrupted { completed: 0 }),
                outcome = invoker.invoke(capability, task, cache_dir, self.timeout) => outcome,
            };

            if outcome.is_success() {
                tracker.reset(&key);
                return Ok(Some(outcome.with_attempts(attempt + 1)));
            }

            tracing::debug!(
                "Attempt {}/{} of {} on {} ended with {}: {}",
                attempt + 1,
                self.max_retries,
                task.framework,
                task.file_path.display(),
                outcome.status(),
                outcome.error_message.as_deref().unwrap_or_default()
            );
            last = Some(outcome);
        }

        let Some(outcome) = last else {
            return Ok(None);
        };
        let outcome = outcome.with_attempts(self.max_retries);

        let failures = tracker.record_failure(key);
        tracing::warn!(
            "{} gave up on {} after {} attempt(s): {} (consecutive failures: {})",
            task.framework,
            task.file_path.display(),
            self.max_retries,
            outcome.status(),
            failures
        );

        if outcome.status() == ExtractionStatus::Failed && !self.continue_on_error {
            return Err(Error::ExtractionFailed {
                framework: task.framework.clone(),
                file: task.file_path.clone(),
                kind: outcome.error_type.clone().unwrap_or_else(|| "Unknown".to_string()),
                message: outcome.error_message.clone().unwrap_or_default(),
            });
        }

        Ok(Some(outcome))
    }
}
