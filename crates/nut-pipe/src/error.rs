//! Error types for pipe execution

use std::io;

/// Errors raised while registering or running transformers
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    /// A transformer producing aggregatable output was registered after one that does not
    #[error(
        "transformer '{next}' produces an aggregatable stream and cannot be registered after '{previous}' which does not"
    )]
    IllegalOrder {
        /// Name of the last registered transformer
        previous: String,
        /// Name of the rejected transformer
        next: String,
    },

    /// The input was already consumed or closed
    #[error("input already consumed")]
    InputConsumed,

    /// I/O failure while streaming
    #[error("stream error: {0}")]
    Io(#[from] io::Error),

    /// Transformer-specific failure
    #[error("transformer '{name}' failed: {message}")]
    Transformer {
        /// Transformer name
        name: String,
        /// Failure description
        message: String,
    },

    /// A ready callback rejected the execution
    #[error("ready callback failed: {0}")]
    Callback(String),
}

impl PipeError {
    /// Create transformer failure
    pub fn transformer(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transformer {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create callback failure
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback(message.into())
    }
}

/// Result alias for pipe operations
pub type PipeResult<T> = Result<T, PipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_order_message_names_both_transformers() {
        let err = PipeError::IllegalOrder {
            previous: "gzip".to_string(),
            next: "minify".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("gzip"));
        assert!(msg.contains("minify"));
    }

    #[test]
    fn io_error_converts() {
        let err: PipeError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, PipeError::Io(_)));
    }
}
