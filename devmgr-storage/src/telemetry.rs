//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events. Hosts call [`init_tracing`] once
//! at startup to route them to stdout.

use devmgr_core::ConfigError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "devmgr_storage=info,warn";

/// Logging configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives, e.g. `devmgr_storage=debug`.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `DEVMGR_LOG`: filter directives (default: `devmgr_storage=info,warn`)
    /// - `DEVMGR_LOG_JSON`: `true` or `1` for JSON output
    pub fn from_env() -> Self {
        Self {
            filter: std::env::var("DEVMGR_LOG")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            json: std::env::var("DEVMGR_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed, so repeated
/// calls from tests or embedding hosts are harmless.
pub fn init_tracing(config: &TelemetryConfig) -> Result<bool, ConfigError> {
    let env_filter =
        EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::InvalidValue {
            field: "DEVMGR_LOG".to_string(),
            reason: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::info!(filter = %config.filter, json = config.json, "Tracing initialized");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_config_from_env() {
        let _log = EnvVarGuard::set("DEVMGR_LOG", None);
        let _json = EnvVarGuard::set("DEVMGR_LOG_JSON", None);
        assert_eq!(TelemetryConfig::from_env(), TelemetryConfig::default());

        let _log = EnvVarGuard::set("DEVMGR_LOG", Some("devmgr_storage=debug"));
        let _json = EnvVarGuard::set("DEVMGR_LOG_JSON", Some("1"));
        let config = TelemetryConfig::from_env();
        assert_eq!(config.filter, "devmgr_storage=debug");
        assert!(config.json);
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = TelemetryConfig {
            filter: "devmgr_storage=notalevel".to_string(),
            json: false,
        };
        assert!(matches!(
            init_tracing(&config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_second_init_is_noop() {
        let config = TelemetryConfig::default();
        let _ = init_tracing(&config).unwrap();
        assert!(!init_tracing(&config).unwrap());
    }
}
