//! Error types for heaps and DAOs

use nut_model::NutError;
use std::io;

/// Errors raised while resolving or watching nuts
#[derive(Debug, thiserror::Error)]
pub enum HeapError {
    /// Invalid heap or DAO configuration
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// Path pattern is not a valid regular expression
    #[error("invalid path pattern '{pattern}': {source}")]
    Pattern {
        /// Offending pattern
        pattern: String,
        /// Compilation failure
        #[source]
        source: regex::Error,
    },

    /// Nut creation or content failure
    #[error(transparent)]
    Nut(#[from] NutError),

    /// I/O failure
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl HeapError {
    /// Create bad argument error
    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::BadArgument(message.into())
    }

    /// Create pattern error
    pub fn pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Whether the error is a configuration error
    #[inline]
    #[must_use]
    pub fn is_bad_argument(&self) -> bool {
        matches!(
            self,
            Self::BadArgument(_) | Self::Pattern { .. } | Self::Nut(NutError::BadArgument(_))
        )
    }
}

/// Result alias for heap operations
pub type HeapResult<T> = Result<T, HeapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_bad_arguments() {
        assert!(HeapError::bad_argument("empty heap").is_bad_argument());
        assert!(HeapError::from(NutError::bad_argument("fixed version")).is_bad_argument());
        assert!(!HeapError::from(NutError::not_found("a.js")).is_bad_argument());
    }

    #[test]
    fn nut_errors_are_transparent() {
        let err = HeapError::from(NutError::not_found("a.js"));
        assert_eq!(err.to_string(), "nut 'a.js' not found");
    }
}
