//! Output writers for benchmark results
//!
//! The runner hands its ordered outcome collection to a [`ResultSink`] at the
//! end of a run. [`JsonResultWriter`] is the sink used by the CLI: it writes the
//! outcomes and their per-framework × category summaries as pretty JSON.

use crate::summary::{BenchmarkSummary, summarize};
use crate::types::ExtractionOutcome;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE_NAME: &str = "benchmark_results.json";
pub const SUMMARIES_FILE_NAME: &str = "benchmark_summaries.json";

/// Destination for the outcomes of a run
pub trait ResultSink: Send + Sync {
    /// Persist `outcomes` in the order given
    fn persist(&self, outcomes: &[ExtractionOutcome]) -> Result<()>;
}

/// Writes results and summaries as JSON files in one directory
#[derive(Debug, Clone)]
pub struct JsonResultWriter {
    output_dir: PathBuf,
    save_extracted_text: bool,
}

impl JsonResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>, save_extracted_text: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            save_extracted_text,
        }
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(RESULTS_FILE_NAME)
    }

    pub fn summaries_path(&self) -> PathBuf {
        self.output_dir.join(SUMMARIES_FILE_NAME)
    }
}

impl ResultSink for JsonResultWriter {
    fn persist(&self, outcomes: &[ExtractionOutcome]) -> Result<()> {
        if self.save_extracted_text {
            write_json(outcomes, &self.results_path())?;
        } else {
            let stripped: Vec<ExtractionOutcome> = outcomes.iter().map(ExtractionOutcome::without_text).collect();
            write_json(&stripped, &self.results_path())?;
        }

        let summaries = summarize(outcomes);
        write_json(&summaries, &self.summaries_path())?;

        tracing::info!(
            "Saved {} outcome(s) to {} and {} summar{} to {}",
            outcomes.len(),
            self.results_path().display(),
            summaries.len(),
            if summaries.len() == 1 { "y" } else { "ies" },
            self.summaries_path().display()
        );
        Ok(())
    }
}

/// Write a serializable value to a JSON file
///
/// # Arguments
/// * `value` - Value to write
/// * `output_path` - Path to output JSON file (parent directories are created)
pub fn write_json<T: serde::Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(Error::Io)?;
    }

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Benchmark(format!("Failed to serialize results: {}", e)))?;

    fs::write(output_path, json).map_err(Error::Io)?;

    Ok(())
}

/// Read outcomes previously written by [`JsonResultWriter`]
pub fn load_results(path: &Path) -> Result<Vec<ExtractionOutcome>> {
    let contents = fs::read_to_string(path).map_err(Error::Io)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Read summaries previously written by [`JsonResultWriter`]
pub fn load_summaries(path: &Path) -> Result<Vec<BenchmarkSummary>> {
    let contents = fs::read_to_string(path).map_err(Error::Io)?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::ResourceStats;
    use crate::types::{DocumentCategory, ExtractionStatus, ExtractionTask};
    use std::time::Duration;
    use tempfile::TempDir;

    fn outcomes() -> Vec<ExtractionOutcome> {
        let task = ExtractionTask::new("test-framework", "/tmp/test.txt", DocumentCategory::Text, 0);
        vec![
            ExtractionOutcome::success(&task, Duration::from_millis(10), &ResourceStats::default(), "hello world".into()),
            ExtractionOutcome::failed(&task, Duration::from_millis(5), &ResourceStats::default(), "ParseError", "bad"),
        ]
    }

    #[test]
    fn test_persist_strips_text_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let writer = JsonResultWriter::new(temp_dir.path().join("out"), false);

        writer.persist(&outcomes()).unwrap();

        let loaded = load_results(&writer.results_path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].framework, "test-framework");
        assert_eq!(loaded[0].status(), ExtractionStatus::Success);
        assert_eq!(loaded[0].character_count, Some(11));
        assert!(loaded[0].extracted_text().is_none());
        assert_eq!(loaded[1].status(), ExtractionStatus::Failed);

        let summaries = load_summaries(&writer.summaries_path()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].successful_files, 1);
        assert_eq!(summaries[0].failed_files, 1);
    }

    #[test]
    fn test_persist_keeps_text_when_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let writer = JsonResultWriter::new(temp_dir.path(), true);

        writer.persist(&outcomes()).unwrap();

        let loaded = load_results(&writer.results_path()).unwrap();
        assert_eq!(loaded[0].extracted_text(), Some("hello world"));
    }

    #[test]
    fn test_write_json_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("subdir/results.json");

        let results: Vec<ExtractionOutcome> = vec![];

        write_json(&results, &output_path).unwrap();

        assert!(output_path.exists());
        assert!(output_path.parent().unwrap().exists());
    }
}
