//! Error types for engines, configuration and serving

use nut_heap::HeapError;
use nut_model::NutError;
use nut_pipe::PipeError;
use std::io;

/// Errors raised while running workflows
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid configuration or request
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// Unknown workflow or nut
    #[error("{what} '{name}' not found")]
    NotFound {
        /// Kind of thing looked up
        what: &'static str,
        /// Requested name
        name: String,
    },

    /// Malformed static workflow file
    #[error("static workflow '{workflow}', line {line}: {message}")]
    StaticWorkflow {
        /// Workflow id
        workflow: String,
        /// 1-based line number
        line: usize,
        /// Problem description
        message: String,
    },

    /// Configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Tracing subscriber could not be installed
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Nut failure
    #[error(transparent)]
    Nut(#[from] NutError),

    /// Stream failure
    #[error(transparent)]
    Pipe(#[from] PipeError),

    /// Heap or DAO failure
    #[error(transparent)]
    Heap(#[from] HeapError),

    /// I/O failure
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Create bad argument error
    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::BadArgument(message.into())
    }

    /// Create not found error
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    /// Create static workflow error
    pub fn static_workflow(workflow: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::StaticWorkflow {
            workflow: workflow.into(),
            line,
            message: message.into(),
        }
    }

    /// Whether the requested workflow, nut or content does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Nut(e) | Self::Heap(HeapError::Nut(e)) => e.is_not_found(),
            _ => false,
        }
    }

    /// Whether the error is a configuration error
    #[must_use]
    pub fn is_bad_argument(&self) -> bool {
        match self {
            Self::BadArgument(_) | Self::Config(_) => true,
            Self::Nut(NutError::BadArgument(_)) => true,
            Self::Heap(e) => e.is_bad_argument(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
