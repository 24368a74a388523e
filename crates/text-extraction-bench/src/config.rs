//! Benchmark run configuration

use crate::types::{DocumentCategory, FileType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name searched for by [`BenchmarkConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "extraction-bench.toml";

/// Policy for one benchmark run
///
/// Provided once when the runner is constructed and never changed while the
/// run is in progress. Every field has a default, so a configuration file only
/// needs to name the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Number of measured passes over the corpus
    pub iterations: usize,

    /// Number of unrecorded priming passes per framework
    pub warmup_runs: usize,

    /// Files per warmup pass, one per representative category
    pub warmup_files: usize,

    /// Idle time between measured passes
    pub cooldown_seconds: u64,

    /// Deadline for a single attempt
    pub timeout_seconds: u64,

    /// Total attempts per file, including the first
    pub max_retries: u32,

    /// Base of the exponential backoff between attempts, in seconds
    pub retry_backoff: f64,

    /// Record exhausted failures and keep going instead of aborting the run
    pub continue_on_error: bool,

    /// Skip files that already failed `max_retries` times in earlier passes
    pub skip_on_repeated_failure: bool,

    pub sampling_interval_ms: u64,

    /// Persist extracted text alongside each outcome
    pub save_extracted_text: bool,

    /// Keep full error messages; otherwise only the first line, truncated
    pub detailed_errors: bool,

    /// Attach the raw resource time series to each outcome
    pub save_resource_samples: bool,

    /// Frameworks to benchmark (empty selects every available framework)
    pub frameworks: Vec<String>,

    /// Categories to benchmark (empty selects every category in the corpus)
    pub categories: Vec<DocumentCategory>,

    /// File types to include (`None` includes everything)
    pub file_types: Option<Vec<FileType>>,

    /// Directory receiving result and summary files
    pub output_dir: PathBuf,

    /// Size of the worker pool running synchronous extractions
    pub worker_threads: usize,

    pub show_progress: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            iterations: 3,
            warmup_runs: 1,
            warmup_files: 3,
            cooldown_seconds: 5,
            timeout_seconds: 600,
            max_retries: 3,
            retry_backoff: 2.0,
            continue_on_error: true,
            skip_on_repeated_failure: true,
            sampling_interval_ms: 50,
            save_extracted_text: false,
            detailed_errors: true,
            save_resource_samples: false,
            frameworks: Vec::new(),
            categories: Vec::new(),
            file_types: None,
            output_dir: PathBuf::from("results"),
            worker_threads: num_cpus::get().clamp(1, 4),
            show_progress: true,
        }
    }
}

impl BenchmarkConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any configuration value is invalid
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::Config("iterations must be > 0".to_string()));
        }

        if self.timeout_seconds == 0 {
            return Err(Error::Config("timeout_seconds must be > 0".to_string()));
        }

        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be > 0".to_string()));
        }

        if !self.retry_backoff.is_finite() || self.retry_backoff < 0.0 {
            return Err(Error::Config(format!(
                "retry_backoff must be a non-negative number, got {}",
                self.retry_backoff
            )));
        }

        if self.sampling_interval_ms == 0 {
            return Err(Error::Config("sampling_interval_ms must be > 0".to_string()));
        }

        if self.worker_threads == 0 {
            return Err(Error::Config("worker_threads must be > 0".to_string()));
        }

        if let Some(types) = &self.file_types
            && types.is_empty()
        {
            return Err(Error::Config(
                "file_types must name at least one type when set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    /// Whether a file of this type passes the file-type filter
    pub fn includes_file_type(&self, file_type: Option<FileType>) -> bool {
        match (&self.file_types, file_type) {
            (None, _) => true,
            (Some(types), Some(ft)) => types.contains(&ft),
            (Some(_), None) => false,
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        toml::from_str(&content).map_err(|e| Error::Toml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid JSON in {}: {}", path.display(), e)))
    }

    /// Load configuration from a file, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Discover configuration file in parent directories.
    ///
    /// Searches for `extraction-bench.toml` in the current directory and its parents.
    pub fn discover() -> Result<Option<Self>> {
        let current = std::env::current_dir()?;
        Self::discover_from(&current)
    }

    /// Same as [`discover`](Self::discover), starting from `start`.
    pub fn discover_from(start: &Path) -> Result<Option<Self>> {
        let mut current = Some(start);

        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!("Using configuration from {}", candidate.display());
                return Ok(Some(Self::from_toml_file(candidate)?));
            }
            current = dir.parent();
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.iterations, 3);
        assert_eq!(config.warmup_runs, 1);
        assert_eq!(config.cooldown_seconds, 5);
        assert_eq!(config.timeout_seconds, 600);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_backoff, 2.0);
        assert!(config.continue_on_error);
        assert!(config.skip_on_repeated_failure);
        assert_eq!(config.sampling_interval_ms, 50);
        assert!(!config.save_extracted_text);
        assert!(config.detailed_errors);
        assert!((1..=4).contains(&config.worker_threads));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = BenchmarkConfig {
            iterations: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = BenchmarkConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BenchmarkConfig {
            retry_backoff: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BenchmarkConfig {
            file_types: Some(vec![]),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file_partial() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &config_path,
            r#"
iterations = 5
timeout_seconds = 30
continue_on_error = false
frameworks = ["docling", "kreuzberg_sync"]
categories = ["tiny", "pdf_standard"]
file_types = ["pdf", "md"]
"#,
        )
        .unwrap();

        let config = BenchmarkConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(config.iterations, 5);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(!config.continue_on_error);
        assert_eq!(config.frameworks, vec!["docling", "kreuzberg_sync"]);
        assert_eq!(config.categories, vec![DocumentCategory::Tiny, DocumentCategory::PdfStandard]);
        assert_eq!(config.file_types, Some(vec![FileType::Pdf, FileType::Markdown]));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_from_toml_file_invalid() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "iterations = \"many\"").unwrap();

        let err = BenchmarkConfig::from_toml_file(&config_path).unwrap_err();
        assert!(matches!(err, Error::Toml { .. }));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("bench.json");
        fs::write(&config_path, r#"{"warmup_runs": 0, "retry_backoff": 1.5}"#).unwrap();

        let config = BenchmarkConfig::from_file(&config_path).unwrap();
        assert_eq!(config.warmup_runs, 0);
        assert_eq!(config.retry_backoff, 1.5);
    }

    #[test]
    fn test_discover_from_parent_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "iterations = 7\n").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let config = BenchmarkConfig::discover_from(&nested).unwrap().unwrap();
        assert_eq!(config.iterations, 7);
    }

    #[test]
    fn test_file_type_filter() {
        let config = BenchmarkConfig {
            file_types: Some(vec![FileType::Pdf]),
            ..Default::default()
        };
        assert!(config.includes_file_type(Some(FileType::Pdf)));
        assert!(!config.includes_file_type(Some(FileType::Docx)));
        assert!(!config.includes_file_type(None));
        assert!(BenchmarkConfig::default().includes_file_type(None));
    }
}
