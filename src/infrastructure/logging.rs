//! Tracing subscriber initialization.

use crate::infrastructure::config::{LogFormat, LoggingSettings, SettingsError, SettingsResult};
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `settings.level`.
///
/// # Errors
///
/// Returns `SettingsError::Logging` if the level does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> SettingsResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|e| SettingsError::Logging(format!("invalid level '{}': {e}", settings.level)))?,
    };

    let installed = match settings.format {
        LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
    };
    installed.map_err(|e| SettingsError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_an_error_not_a_panic() {
        let settings = LoggingSettings::default();
        let first = init_tracing(&settings);
        let second = init_tracing(&settings);
        // another test may have installed a subscriber first
        assert!(first.is_err() || second.is_err());
        assert!(matches!(second, Err(SettingsError::Logging(_))));
    }
}
