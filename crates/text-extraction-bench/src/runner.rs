//! Benchmark runner for executing and collecting results
//!
//! [`BenchmarkRunner`] drives the benchmark matrix: optional warmup, then
//! `iterations` passes over frameworks × categories × files, with a cooldown
//! between passes. Files are visited one at a time, so outcomes are appended
//! in exactly the order their attempts complete. The runner owns the failure
//! tracker and the outcome collection; nothing else mutates them.

use crate::config::BenchmarkConfig;
use crate::corpus::{CorpusFile, DocumentCorpus};
use crate::invoker::ExtractionInvoker;
use crate::monitoring::MonitorScope;
use crate::output::ResultSink;
use crate::registry::{Framework, FrameworkRegistry};
use crate::retry::{FailureTracker, RetryController};
use crate::types::{DocumentCategory, ExtractionOutcome, ExtractionStatus, ExtractionTask};
use crate::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Orchestrates benchmark passes across frameworks, categories and files
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    registry: FrameworkRegistry,
    invoker: ExtractionInvoker,
    controller: RetryController,
    tracker: FailureTracker,
    results: Vec<ExtractionOutcome>,
    sink: Option<Box<dyn ResultSink>>,
    cancel: CancellationToken,
}

impl BenchmarkRunner {
    /// Create a new benchmark runner
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` does not validate.
    pub fn new(config: BenchmarkConfig, registry: FrameworkRegistry) -> Result<Self> {
        config.validate()?;

        let cancel = CancellationToken::new();
        Ok(Self {
            invoker: ExtractionInvoker::new(&config),
            controller: RetryController::new(&config, cancel.clone()),
            config,
            registry,
            tracker: FailureTracker::new(),
            results: Vec::new(),
            sink: None,
            cancel,
        })
    }

    /// Persist outcomes through `sink` when a run completes
    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn with_monitor_scope(mut self, scope: MonitorScope) -> Self {
        self.invoker = self.invoker.with_monitor_scope(scope);
        self
    }

    /// Token that interrupts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Outcomes collected so far, including those of an aborted run
    pub fn results(&self) -> &[ExtractionOutcome] {
        &self.results
    }

    pub fn failure_tracker(&self) -> &FailureTracker {
        &self.tracker
    }

    /// Run the full benchmark matrix over `corpus`
    ///
    /// On success the outcomes are handed to the sink (if any) and returned.
    ///
    /// # Errors
    ///
    /// - selection errors ([`Error::UnknownFramework`], [`Error::FrameworkUnavailable`])
    ///   before any attempt starts
    /// - [`Error::ExtractionFailed`] when `continue_on_error` is disabled
    /// - [`Error::Interrupted`] when the cancellation token fires
    ///
    /// Outcomes collected before an error stay available through
    /// [`results`](Self::results); persisting them is up to the caller.
    pub async fn run(&mut self, corpus: &DocumentCorpus) -> Result<Vec<ExtractionOutcome>> {
        let frameworks = self.registry.select(&self.config.frameworks)?;
        let categories = if self.config.categories.is_empty() {
            corpus.non_empty_categories()
        } else {
            self.config.categories.clone()
        };

        self.results.clear();
        self.tracker = FailureTracker::new();

        tracing::info!(
            "Benchmarking {} framework(s) over {} categor{} ({} file(s)), {} iteration(s)",
            frameworks.len(),
            categories.len(),
            if categories.len() == 1 { "y" } else { "ies" },
            corpus.len(),
            self.config.iterations
        );

        if self.config.warmup_runs > 0 {
            self.warmup(&frameworks, &categories, corpus).await?;
        }

        for iteration in 0..self.config.iterations {
            tracing::info!("Starting pass {}/{}", iteration + 1, self.config.iterations);

            for (name, framework) in &frameworks {
                for category in &categories {
                    self.run_combination(name, framework, *category, iteration, corpus)
                        .await?;
                }
            }

            let is_last = iteration + 1 == self.config.iterations;
            if !is_last && self.config.cooldown_seconds > 0 {
                tracing::info!("Cooling down for {}s", self.config.cooldown_seconds);
                self.sleep(self.config.cooldown()).await?;
            }
        }

        if let Some(sink) = &self.sink {
            sink.persist(&self.results)?;
        }

        Ok(self.results.clone())
    }

    /// One framework × category pass over its eligible files
    async fn run_combination(
        &mut self,
        name: &str,
        framework: &Framework,
        category: DocumentCategory,
        iteration: usize,
        corpus: &DocumentCorpus,
    ) -> Result<()> {
        let files = self.eligible_files(framework, category, corpus);
        if files.is_empty() {
            return Ok(());
        }

        let progress = self.progress_bar(files.len(), name, category);
        let first_index = self.results.len();

        for file in files {
            if self.cancel.is_cancelled() {
                progress.abandon();
                return Err(self.interrupted());
            }

            progress.set_message(
                file.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );

            let task = task_for(name, file, category, iteration);
            let attempt = self
                .controller
                .run(
                    &self.invoker,
                    &framework.capability,
                    &task,
                    framework.cache_dir.as_deref(),
                    &mut self.tracker,
                )
                .await;

            match attempt {
                Ok(Some(outcome)) => self.results.push(outcome),
                Ok(None) => {}
                Err(Error::Interrupted { .. }) => {
                    progress.abandon();
                    return Err(self.interrupted());
                }
                Err(e) => {
                    progress.abandon();
                    tracing::error!("Aborting run: {}", e);
                    return Err(e);
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();

        let recorded = &self.results[first_index..];
        let count = |status: ExtractionStatus| recorded.iter().filter(|o| o.status() == status).count();
        tracing::info!(
            "[pass {}] {} / {}: {} succeeded, {} failed, {} timed out",
            iteration + 1,
            name,
            category,
            count(ExtractionStatus::Success),
            count(ExtractionStatus::Failed),
            count(ExtractionStatus::Timeout)
        );

        Ok(())
    }

    /// Prime each framework on a few files without recording anything
    async fn warmup(
        &self,
        frameworks: &[(String, Framework)],
        categories: &[DocumentCategory],
        corpus: &DocumentCorpus,
    ) -> Result<()> {
        tracing::info!("Warming up {} framework(s)", frameworks.len());

        for _ in 0..self.config.warmup_runs {
            for (name, framework) in frameworks {
                let files = self.warmup_files(framework, categories, corpus);
                for (category, file) in files {
                    if self.cancel.is_cancelled() {
                        return Err(self.interrupted());
                    }

                    let task = task_for(name, &file, category, 0);
                    let outcome = tokio::select! {
                        _ = self.cancel.cancelled() => return Err(self.interrupted()),
                        outcome = self.invoker.invoke(
                            &framework.capability,
                            &task,
                            framework.cache_dir.as_deref(),
                            self.config.timeout(),
                        ) => outcome,
                    };

                    if !outcome.is_success() {
                        tracing::debug!(
                            "Warmup of {} on {} ended with {}",
                            name,
                            file.path.display(),
                            outcome.status()
                        );
                    }
                }
            }
        }

        tracing::info!("Warmup complete");
        Ok(())
    }

    /// First eligible file of each of the first `warmup_files` categories that have one
    fn warmup_files(
        &self,
        framework: &Framework,
        categories: &[DocumentCategory],
        corpus: &DocumentCorpus,
    ) -> Vec<(DocumentCategory, CorpusFile)> {
        let mut picked: Vec<(DocumentCategory, CorpusFile)> = Vec::new();

        for category in categories {
            if picked.len() >= self.config.warmup_files {
                break;
            }
            let candidate = self
                .eligible_files(framework, *category, corpus)
                .into_iter()
                .find(|file| !picked.iter().any(|(_, p)| p.path == file.path));
            if let Some(file) = candidate {
                picked.push((*category, file.clone()));
            }
        }

        picked
    }

    fn eligible_files<'a>(
        &self,
        framework: &Framework,
        category: DocumentCategory,
        corpus: &'a DocumentCorpus,
    ) -> Vec<&'a CorpusFile> {
        corpus
            .files(category)
            .iter()
            .filter(|file| self.config.includes_file_type(file.file_type) && framework.accepts(&file.path))
            .collect()
    }

    fn progress_bar(&self, len: usize, framework: &str, category: DocumentCategory) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {prefix} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_prefix(format!("{} / {}", framework, category));
        pb
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(self.interrupted()),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn interrupted(&self) -> Error {
        tracing::warn!("Benchmark interrupted with {} outcome(s) collected", self.results.len());
        Error::Interrupted {
            completed: self.results.len(),
        }
    }
}

fn task_for(framework: &str, file: &CorpusFile, category: DocumentCategory, iteration: usize) -> ExtractionTask {
    ExtractionTask {
        framework: framework.to_string(),
        file_path: file.path.clone(),
        file_size: file.size,
        file_type: file.file_type,
        category,
        iteration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_rejects_invalid_config() {
        let config = BenchmarkConfig {
            iterations: 0,
            ..Default::default()
        };
        let result = BenchmarkRunner::new(config, FrameworkRegistry::new());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_run_with_no_frameworks() {
        let dir = tempfile::TempDir::new().unwrap();
        let corpus = DocumentCorpus::from_dir(dir.path()).unwrap();
        let mut runner = BenchmarkRunner::new(BenchmarkConfig::default(), FrameworkRegistry::new()).unwrap();

        let result = runner.run(&corpus).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No frameworks available"));
        assert!(runner.results().is_empty());
    }
}
