//! Core data types for benchmark outcomes

use crate::monitoring::{ResourceSample, ResourceStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Status of an extraction attempt sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    /// Truncated but usable output. Never produced by the harness itself.
    Partial,
    Failed,
    Timeout,
    /// Only read back from existing result files; skipped files produce no outcome.
    Skipped,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Success => "success",
            ExtractionStatus::Partial => "partial",
            ExtractionStatus::Failed => "failed",
            ExtractionStatus::Timeout => "timeout",
            ExtractionStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document categories used to group the benchmark matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    // Size-based
    Tiny,
    Small,
    Medium,
    Large,
    Huge,

    // Format-based
    PdfStandard,
    PdfScanned,
    PdfComplex,
    Office,
    Web,
    Text,
    Email,
    Ebook,
    Data,
    Images,

    // Language-based
    English,
    Unicode,
    MixedLanguage,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 18] = [
        DocumentCategory::Tiny,
        DocumentCategory::Small,
        DocumentCategory::Medium,
        DocumentCategory::Large,
        DocumentCategory::Huge,
        DocumentCategory::PdfStandard,
        DocumentCategory::PdfScanned,
        DocumentCategory::PdfComplex,
        DocumentCategory::Office,
        DocumentCategory::Web,
        DocumentCategory::Text,
        DocumentCategory::Email,
        DocumentCategory::Ebook,
        DocumentCategory::Data,
        DocumentCategory::Images,
        DocumentCategory::English,
        DocumentCategory::Unicode,
        DocumentCategory::MixedLanguage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Tiny => "tiny",
            DocumentCategory::Small => "small",
            DocumentCategory::Medium => "medium",
            DocumentCategory::Large => "large",
            DocumentCategory::Huge => "huge",
            DocumentCategory::PdfStandard => "pdf_standard",
            DocumentCategory::PdfScanned => "pdf_scanned",
            DocumentCategory::PdfComplex => "pdf_complex",
            DocumentCategory::Office => "office",
            DocumentCategory::Web => "web",
            DocumentCategory::Text => "text",
            DocumentCategory::Email => "email",
            DocumentCategory::Ebook => "ebook",
            DocumentCategory::Data => "data",
            DocumentCategory::Images => "images",
            DocumentCategory::English => "english",
            DocumentCategory::Unicode => "unicode",
            DocumentCategory::MixedLanguage => "mixed_language",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| crate::Error::Config(format!("Invalid category: {}", s)))
    }
}

/// File types recognised by the corpus scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Pdf,
    PdfScanned,
    Docx,
    Pptx,
    Xlsx,
    Xls,
    Odt,
    Html,
    #[serde(rename = "md")]
    Markdown,
    Txt,
    Rtf,
    Epub,
    Msg,
    Eml,
    Csv,
    Json,
    Yaml,
    Rst,
    Org,
    Png,
    Jpg,
    Jpeg,
    Bmp,
}

impl FileType {
    pub const ALL: [FileType; 23] = [
        FileType::Pdf,
        FileType::PdfScanned,
        FileType::Docx,
        FileType::Pptx,
        FileType::Xlsx,
        FileType::Xls,
        FileType::Odt,
        FileType::Html,
        FileType::Markdown,
        FileType::Txt,
        FileType::Rtf,
        FileType::Epub,
        FileType::Msg,
        FileType::Eml,
        FileType::Csv,
        FileType::Json,
        FileType::Yaml,
        FileType::Rst,
        FileType::Org,
        FileType::Png,
        FileType::Jpg,
        FileType::Jpeg,
        FileType::Bmp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::PdfScanned => "pdf_scanned",
            FileType::Docx => "docx",
            FileType::Pptx => "pptx",
            FileType::Xlsx => "xlsx",
            FileType::Xls => "xls",
            FileType::Odt => "odt",
            FileType::Html => "html",
            FileType::Markdown => "md",
            FileType::Txt => "txt",
            FileType::Rtf => "rtf",
            FileType::Epub => "epub",
            FileType::Msg => "msg",
            FileType::Eml => "eml",
            FileType::Csv => "csv",
            FileType::Json => "json",
            FileType::Yaml => "yaml",
            FileType::Rst => "rst",
            FileType::Org => "org",
            FileType::Png => "png",
            FileType::Jpg => "jpg",
            FileType::Jpeg => "jpeg",
            FileType::Bmp => "bmp",
        }
    }

    /// Map a file extension (without the dot, any case) to a file type
    pub fn from_extension(ext: &str) -> Option<Self> {
        let file_type = match ext.to_lowercase().as_str() {
            "pdf" => FileType::Pdf,
            "docx" => FileType::Docx,
            "pptx" => FileType::Pptx,
            "xlsx" => FileType::Xlsx,
            "xls" => FileType::Xls,
            "odt" => FileType::Odt,
            "html" | "htm" => FileType::Html,
            "md" | "markdown" => FileType::Markdown,
            "txt" | "text" => FileType::Txt,
            "rtf" => FileType::Rtf,
            "epub" => FileType::Epub,
            "msg" => FileType::Msg,
            "eml" => FileType::Eml,
            "csv" => FileType::Csv,
            "json" => FileType::Json,
            "yaml" | "yml" => FileType::Yaml,
            "rst" => FileType::Rst,
            "org" => FileType::Org,
            "png" => FileType::Png,
            "jpg" => FileType::Jpg,
            "jpeg" => FileType::Jpeg,
            "bmp" => FileType::Bmp,
            _ => return None,
        };
        Some(file_type)
    }

    /// File type of a path by extension only (scanned PDFs are detected by the categorizer)
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let needle = s.trim().trim_start_matches('.').to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == needle)
            .or_else(|| Self::from_extension(&needle))
            .ok_or_else(|| crate::Error::Config(format!("Invalid file type: {}", s)))
    }
}

/// Identity of one unit of benchmark work: a file, a framework and a pass
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionTask {
    pub framework: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub file_type: Option<FileType>,
    pub category: DocumentCategory,
    pub iteration: usize,
}

impl ExtractionTask {
    /// Build a task for `file_path`, reading its size from the filesystem
    ///
    /// A file whose metadata cannot be read is given size 0; the extraction
    /// attempt itself will surface the real problem.
    pub fn new(framework: impl Into<String>, file_path: impl Into<PathBuf>, category: DocumentCategory, iteration: usize) -> Self {
        let file_path = file_path.into();
        let file_size = std::fs::metadata(&file_path).map(|m| m.len()).unwrap_or(0);
        let file_type = FileType::from_path(&file_path);
        Self {
            framework: framework.into(),
            file_path,
            file_size,
            file_type,
            category,
            iteration,
        }
    }
}

/// Normalized record of one extraction attempt sequence for one file and framework
///
/// Outcomes are built through the status-specific constructors, which keep
/// `status == Success` exactly when `extracted_text` is present. Records read
/// back from disk may lack the text when it was not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub file_path: PathBuf,
    pub file_size: u64,
    pub file_type: Option<FileType>,
    pub framework: String,
    pub category: DocumentCategory,
    pub iteration: usize,
    pub attempts: u32,

    /// Wall-clock extraction time in seconds
    pub extraction_time: f64,
    pub startup_time: Option<f64>,

    pub peak_memory_mb: f64,
    pub avg_memory_mb: f64,
    pub peak_cpu_percent: f64,
    pub avg_cpu_percent: f64,
    pub io_read_mb: Option<f64>,
    pub io_write_mb: Option<f64>,

    status: ExtractionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extracted_text: Option<String>,
    pub character_count: Option<usize>,
    pub word_count: Option<usize>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_samples: Vec<ResourceSample>,

    pub timestamp: DateTime<Utc>,
    pub platform: String,
}

impl ExtractionOutcome {
    /// Successful extraction carrying the extracted text
    pub fn success(task: &ExtractionTask, elapsed: Duration, stats: &ResourceStats, text: String) -> Self {
        let mut outcome = Self::base(task, ExtractionStatus::Success, elapsed, stats);
        outcome.character_count = Some(text.chars().count());
        outcome.word_count = Some(text.split_whitespace().count());
        outcome.extracted_text = Some(text);
        outcome
    }

    /// The capability raised an error
    pub fn failed(
        task: &ExtractionTask,
        elapsed: Duration,
        stats: &ResourceStats,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        let mut outcome = Self::base(task, ExtractionStatus::Failed, elapsed, stats);
        outcome.error_type = Some(error_type.into());
        outcome.error_message = Some(error_message.into());
        outcome
    }

    /// The attempt exceeded its deadline
    pub fn timed_out(task: &ExtractionTask, timeout: Duration, stats: &ResourceStats) -> Self {
        let mut outcome = Self::base(task, ExtractionStatus::Timeout, timeout, stats);
        outcome.error_type = Some("Timeout".to_string());
        outcome.error_message = Some(format!("Timeout after {} seconds", timeout.as_secs_f64()));
        outcome
    }

    /// Truncated-but-usable output reported by an external producer
    pub fn partial(task: &ExtractionTask, elapsed: Duration, stats: &ResourceStats, reason: impl Into<String>) -> Self {
        let mut outcome = Self::base(task, ExtractionStatus::Partial, elapsed, stats);
        outcome.error_message = Some(reason.into());
        outcome
    }

    fn base(task: &ExtractionTask, status: ExtractionStatus, elapsed: Duration, stats: &ResourceStats) -> Self {
        Self {
            file_path: task.file_path.clone(),
            file_size: task.file_size,
            file_type: task.file_type,
            framework: task.framework.clone(),
            category: task.category,
            iteration: task.iteration,
            attempts: 1,
            extraction_time: elapsed.as_secs_f64(),
            startup_time: None,
            peak_memory_mb: stats.peak_memory_mb,
            avg_memory_mb: stats.avg_memory_mb,
            peak_cpu_percent: stats.peak_cpu_percent,
            avg_cpu_percent: stats.avg_cpu_percent,
            io_read_mb: stats.io_read_mb,
            io_write_mb: stats.io_write_mb,
            status,
            extracted_text: None,
            character_count: None,
            word_count: None,
            error_type: None,
            error_message: None,
            resource_samples: Vec::new(),
            timestamp: Utc::now(),
            platform: std::env::consts::OS.to_string(),
        }
    }

    /// Record how many attempts produced this outcome (1-based)
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_startup_time(mut self, startup: Duration) -> Self {
        self.startup_time = Some(startup.as_secs_f64());
        self
    }

    pub fn with_samples(mut self, samples: Vec<ResourceSample>) -> Self {
        self.resource_samples = samples;
        self
    }

    pub fn status(&self) -> ExtractionStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ExtractionStatus::Success
    }

    pub fn extracted_text(&self) -> Option<&str> {
        self.extracted_text.as_deref()
    }

    /// Copy of this record without the extracted text, for persistence
    pub fn without_text(&self) -> Self {
        Self {
            extracted_text: None,
            ..self.clone()
        }
    }
}
