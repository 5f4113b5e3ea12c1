//! Error types for the nut model

use nut_pipe::PipeError;
use std::io;

/// Errors raised by nuts and their content
#[derive(Debug, thiserror::Error)]
pub enum NutError {
    /// Invalid construction or configuration argument
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// Operation not allowed in the current state
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The nut content cannot be reached
    #[error("nut '{name}' not found{}", .workflow.as_ref().map(|w| format!(" in workflow '{w}'")).unwrap_or_default())]
    NotFound {
        /// Nut name
        name: String,
        /// Workflow the nut was declared in, if known
        workflow: Option<String>,
    },

    /// A static nut tried to reference a dynamic one
    #[error("nut '{nut}' is not dynamic and cannot reference dynamic nut '{referenced}'")]
    DynamicReference {
        /// Referencing nut
        nut: String,
        /// Dynamic nut
        referenced: String,
    },

    /// Version number computation failed
    #[error("version number unavailable: {0}")]
    Version(String),

    /// Pipe or transformer failure
    #[error(transparent)]
    Pipe(#[from] PipeError),

    /// I/O failure
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Source map (de)serialization failure
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NutError {
    /// Create bad argument error
    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::BadArgument(message.into())
    }

    /// Create illegal state error
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// Create not found error for a nut name
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            workflow: None,
        }
    }

    /// Create not found error for a nut declared in a workflow
    pub fn not_found_in(name: impl Into<String>, workflow: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            workflow: Some(workflow.into()),
        }
    }

    /// Whether this error signals unreachable content
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Convert into an I/O error so it can cross a `Read` boundary
    #[must_use]
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Io(e) => e,
            Self::NotFound { .. } => io::Error::new(io::ErrorKind::NotFound, self),
            other => io::Error::other(other),
        }
    }
}

/// Result alias for nut operations
pub type NutResult<T> = Result<T, NutError>;
