//! The extraction capability consumed by the invoker
//!
//! A framework provides text extraction either synchronously or asynchronously.
//! The variant is chosen once, when the framework is registered, and the invoker
//! dispatches on [`Capability`] without knowing which backend sits behind it.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure raised by an extraction capability
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    MissingDependency(String),

    /// The backing process exited unsuccessfully
    #[error("exit code {code:?}: {stderr}")]
    Subprocess { code: Option<i32>, stderr: String },

    #[error("extraction panicked: {0}")]
    Panic(String),

    /// Any other failure, carrying its own category name
    #[error("{message}")]
    Other { kind: String, message: String },
}

impl ExtractionError {
    pub fn other(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Other {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Concrete failure category recorded as the outcome's error kind
    pub fn kind(&self) -> &str {
        match self {
            Self::Io(_) => "IoError",
            Self::UnsupportedFormat(_) => "UnsupportedFormat",
            Self::Parse(_) => "ParseError",
            Self::MissingDependency(_) => "MissingDependency",
            Self::Subprocess { .. } => "SubprocessFailed",
            Self::Panic(_) => "Panic",
            Self::Other { kind, .. } => kind,
        }
    }
}

/// Extraction that blocks the calling thread until it returns
pub trait SyncExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError>;

    /// Like [`extract_text`](Self::extract_text), but gives up once `cancel` fires
    ///
    /// The invoker cancels the token when an attempt times out. Extractors that
    /// cannot stop early keep the default, which runs to completion and holds
    /// its worker slot until then.
    fn extract_text_cancellable(&self, path: &Path, _cancel: &CancellationToken) -> Result<String, ExtractionError> {
        self.extract_text(path)
    }
}

/// Extraction that yields to the scheduler while it waits
#[async_trait]
pub trait AsyncExtractor: Send + Sync {
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// A framework's extraction operation, tagged by how it must be driven
#[derive(Clone)]
pub enum Capability {
    Sync(Arc<dyn SyncExtractor>),
    Async(Arc<dyn AsyncExtractor>),
}

impl Capability {
    pub fn sync(extractor: impl SyncExtractor + 'static) -> Self {
        Self::Sync(Arc::new(extractor))
    }

    pub fn asynchronous(extractor: impl AsyncExtractor + 'static) -> Self {
        Self::Async(Arc::new(extractor))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Capability::Sync"),
            Self::Async(_) => f.write_str("Capability::Async"),
        }
    }
}
