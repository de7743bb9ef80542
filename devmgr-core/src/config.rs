//! Service configuration
//!
//! Loaded from environment variables with development defaults.

use crate::error::ConfigError;
use crate::entities::Pages;

/// Entity service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Page size used when a list request carries no pagination.
    pub default_page_size: u64,
    /// Upper bound applied to requested page sizes.
    pub max_page_size: u64,
    /// Prefix for every cache region name, e.g. `devmgr` → `devmgr:driver_attribute:id`.
    pub cache_namespace: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 500,
            cache_namespace: "devmgr".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Create ServiceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DEVMGR_DEFAULT_PAGE_SIZE`: Page size when none is requested (default: 20)
    /// - `DEVMGR_MAX_PAGE_SIZE`: Largest page size served (default: 500)
    /// - `DEVMGR_CACHE_NAMESPACE`: Cache region name prefix (default: devmgr)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_page_size = std::env::var("DEVMGR_DEFAULT_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_page_size);

        let max_page_size = std::env::var("DEVMGR_MAX_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_page_size);

        let cache_namespace = std::env::var("DEVMGR_CACHE_NAMESPACE")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.cache_namespace);

        let config = Self {
            default_page_size,
            max_page_size,
            cache_namespace,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject zero or inverted page sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_page_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_page_size < self.default_page_size {
            return Err(ConfigError::InvalidValue {
                field: "max_page_size".to_string(),
                reason: format!(
                    "{} is below default_page_size {}",
                    self.max_page_size, self.default_page_size
                ),
            });
        }
        Ok(())
    }

    /// Effective page for a request: the default when absent, clamped otherwise.
    pub fn resolve_page(&self, requested: Option<Pages>) -> Pages {
        requested
            .unwrap_or(Pages::new(1, self.default_page_size))
            .normalized(self.max_page_size)
    }

    /// Set the default page size.
    pub fn with_default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size;
        self
    }

    /// Set the max page size.
    pub fn with_max_page_size(mut self, size: u64) -> Self {
        self.max_page_size = size;
        self
    }

    /// Set the cache namespace.
    pub fn with_cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = namespace.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 500);
        assert_eq!(config.cache_namespace, "devmgr");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_default() {
        let config = ServiceConfig::default().with_default_page_size(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "default_page_size"
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_sizes() {
        let config = ServiceConfig::default()
            .with_default_page_size(50)
            .with_max_page_size(10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_page() {
        let config = ServiceConfig::default().with_max_page_size(100);
        assert_eq!(config.resolve_page(None), Pages::new(1, 20));
        assert_eq!(config.resolve_page(Some(Pages::new(2, 1000))), Pages::new(2, 100));
        assert_eq!(config.resolve_page(Some(Pages::new(0, 5))), Pages::new(1, 5));
    }
}
