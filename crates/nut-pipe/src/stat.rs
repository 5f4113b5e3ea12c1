//! Per-transformer execution statistics

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exchange description used when a transformer left its input untouched
pub const NO_TRANSFORMATION: &str = "no transformation applied";

/// Timing and exchange record of one transformer run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationStat {
    written: bool,
    exchange: String,
    duration_ms: u64,
    description: String,
}

impl TransformationStat {
    /// Record a run
    ///
    /// `source_as_bytes` tells whether the transformed input originally came
    /// from bytes or from text.
    #[must_use]
    pub fn new(
        written: bool,
        source_as_bytes: bool,
        duration: Duration,
        description: impl Into<String>,
    ) -> Self {
        let exchange = if written {
            format!(
                "Read bytes from a source in {}",
                if source_as_bytes { "bytes" } else { "chars" }
            )
        } else {
            NO_TRANSFORMATION.to_string()
        };

        Self {
            written,
            exchange,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            description: description.into(),
        }
    }

    /// Whether the transformer wrote its own output
    #[inline]
    #[must_use]
    pub fn written(&self) -> bool {
        self.written
    }

    /// How the content was exchanged
    #[inline]
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Elapsed time
    #[inline]
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Converted object description (usually the transformer name)
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_stat_describes_source_kind() {
        let stat = TransformationStat::new(true, false, Duration::from_millis(3), "minify");
        assert_eq!(stat.exchange(), "Read bytes from a source in chars");
        assert_eq!(stat.duration(), Duration::from_millis(3));
        assert_eq!(stat.description(), "minify");
    }

    #[test]
    fn untouched_stat_reports_no_transformation() {
        let stat = TransformationStat::new(false, true, Duration::ZERO, "copy");
        assert!(!stat.written());
        assert_eq!(stat.exchange(), NO_TRANSFORMATION);
    }

    #[test]
    fn stat_serializes_to_json() {
        let stat = TransformationStat::new(true, true, Duration::from_millis(12), "gzip");
        let json = serde_json::to_string(&stat).unwrap();
        assert!(json.contains("\"description\":\"gzip\""));
        let decoded: TransformationStat = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, stat);
    }
}
