use crate::config::{LogFormat, LoggingConfig};
use crate::error::{GateError, Result};
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor `logging.filter` is set
pub const DEFAULT_FILTER: &str = "windowgate=debug,tower_http=debug";

/// Initialize tracing/logging
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        config
            .filter
            .clone()
            .unwrap_or_else(|| DEFAULT_FILTER.to_string())
            .into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| GateError::Internal(format!("Failed to initialize tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        let config = LoggingConfig::default();
        // A global subscriber can only be set once; the repeat must not panic
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
