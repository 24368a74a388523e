//! Benchmark harness for text extraction frameworks
//!
//! This crate runs extraction frameworks over a categorized document corpus and
//! records one outcome per file, framework and pass. Each attempt runs under a
//! deadline with a resource sampler attached. Failed attempts are retried with
//! exponential backoff, and files that keep failing are skipped in later passes.

pub mod adapters;
pub mod config;
pub mod corpus;
pub mod error;
pub mod extractor;
pub mod invoker;
pub mod monitoring;
pub mod output;
pub mod registry;
pub mod retry;
pub mod runner;
pub mod summary;
pub mod types;

pub use config::BenchmarkConfig;
pub use corpus::{CorpusFile, DocumentCategorizer, DocumentCorpus};
pub use error::{Error, Result};
pub use extractor::{AsyncExtractor, Capability, ExtractionError, SyncExtractor};
pub use invoker::ExtractionInvoker;
pub use monitoring::{MonitorScope, ResourceMonitor, ResourceSample, ResourceStats, SamplingMode};
pub use output::{JsonResultWriter, ResultSink, write_json};
pub use registry::{Framework, FrameworkEntry, FrameworkRegistry};
pub use retry::{FailureKey, FailureTracker, RetryController, backoff_delay};
pub use runner::BenchmarkRunner;
pub use summary::{BenchmarkSummary, summarize};
pub use types::{DocumentCategory, ExtractionOutcome, ExtractionStatus, ExtractionTask, FileType};
