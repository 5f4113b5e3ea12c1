//! Tracing initialisation

use crate::error::{EngineError, EngineResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global `fmt` subscriber
///
/// `RUST_LOG` takes precedence over `default_filter`. With `json` the events
/// are written as JSON lines.
///
/// # Errors
/// [`EngineError::Telemetry`] when the filter is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str, json: bool) -> EngineResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| EngineError::Telemetry(format!("invalid filter '{default_filter}': {e}")))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.map_err(|e| EngineError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_installation_fails() {
        let _ = init_tracing("info,nut_engine=debug", false);
        let second = init_tracing("info", true);
        assert!(matches!(second, Err(EngineError::Telemetry(_))));
    }
}
