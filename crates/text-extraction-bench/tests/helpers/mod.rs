#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use text_extraction_bench::output::ResultSink;
use text_extraction_bench::{
    AsyncExtractor, BenchmarkConfig, DocumentCategory, ExtractionError, ExtractionOutcome, SyncExtractor,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What a scripted extractor does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(&'static str),
    Fail(&'static str),
    Hang,
    /// Cancel the given token, then hang
    Interrupt(CancellationToken),
}

/// One call seen by a scripted extractor
#[derive(Debug, Clone)]
pub struct Call {
    pub file: String,
    pub at: Instant,
}

/// Async extractor that replays a per-file script
///
/// Each call consumes the next step for its file; once a script runs out the
/// last step repeats. Files without a script succeed with their own name.
#[derive(Clone, Default)]
pub struct ScriptedExtractor {
    scripts: Arc<Mutex<HashMap<String, Vec<Step>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    delay: Duration,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(self, file: &str, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().insert(file.to_string(), steps);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, file: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.file == file).collect()
    }

    fn next_step(&self, file: &str) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(file) {
            Some(steps) if steps.len() > 1 => steps.remove(0),
            Some(steps) if !steps.is_empty() => steps[0].clone(),
            _ => Step::Succeed("default"),
        }
    }
}

#[async_trait]
impl AsyncExtractor for ScriptedExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let file = file_name(path);
        self.calls.lock().unwrap().push(Call {
            file: file.clone(),
            at: Instant::now(),
        });
        let step = self.next_step(&file);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Step::Succeed(text) => Ok(format!("{} {}", text, file)),
            Step::Fail(message) => Err(ExtractionError::Parse(message.to_string())),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Ok(String::new())
            }
            Step::Interrupt(token) => {
                token.cancel();
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Ok(String::new())
            }
        }
    }
}

/// Blocking extractor that echoes the file contents
#[derive(Clone, Default)]
pub struct EchoExtractor {
    calls: Arc<AtomicUsize>,
}

impl EchoExtractor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SyncExtractor for EchoExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Blocking extractor that stalls on one file and cannot be cancelled
#[derive(Clone)]
pub struct StallingExtractor {
    pub file: &'static str,
    pub stall: Duration,
}

impl SyncExtractor for StallingExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        if file_name(path) == self.file {
            std::thread::sleep(self.stall);
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Sink that keeps whatever it was handed
#[derive(Clone, Default)]
pub struct RecordingSink {
    persisted: Arc<Mutex<Vec<Vec<ExtractionOutcome>>>>,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<Vec<ExtractionOutcome>> {
        self.persisted.lock().unwrap().clone()
    }
}

impl ResultSink for RecordingSink {
    fn persist(&self, outcomes: &[ExtractionOutcome]) -> text_extraction_bench::Result<()> {
        self.persisted.lock().unwrap().push(outcomes.to_vec());
        Ok(())
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Temporary corpus holding small text files with the given names
pub fn text_corpus(names: &[&str]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), format!("contents of {}", name)).unwrap();
    }
    let root = dir.path().to_path_buf();
    (dir, root)
}

/// Quiet, single-pass configuration restricted to the text category
pub fn test_config() -> BenchmarkConfig {
    BenchmarkConfig {
        iterations: 1,
        warmup_runs: 0,
        cooldown_seconds: 0,
        timeout_seconds: 10,
        max_retries: 3,
        retry_backoff: 2.0,
        sampling_interval_ms: 100,
        categories: vec![DocumentCategory::Text],
        show_progress: false,
        ..Default::default()
    }
}

pub fn names(outcomes: &[ExtractionOutcome]) -> Vec<String> {
    outcomes.iter().map(|o| file_name(&o.file_path)).collect()
}
