//! Error types for device-manager operations

use crate::{NaturalKey, RecordId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Record store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Lookup expected at most one record but matched {matched}: {predicate}")]
    AmbiguousResult { predicate: String, matched: usize },

    #[error("Unique constraint violated for natural key {key}")]
    UniqueViolation { key: NaturalKey },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache region {region} unavailable: {reason}")]
    Unavailable { region: String, reason: String },

    #[error("Cache region {region} is not registered")]
    UnknownRegion { region: String },

    #[error("Cache value in {region} could not be (de)serialized: {reason}")]
    Serialization { region: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type for all device-manager operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManagerError {
    #[error("Entity already exists: {key}")]
    DuplicateEntity { key: NaturalKey },

    /// The store committed the write but the record could not be re-read.
    /// Retrying the write is not safe.
    #[error("Write to record {id} committed but could not be confirmed: {reason}")]
    Unconfirmed { id: RecordId, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for device-manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Stable failure codes reported across the remote-call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Ok,
    DuplicateEntity,
    NotFound,
    AmbiguousResult,
    StoreUnavailable,
    CacheUnavailable,
    WriteUnconfirmed,
    Internal,
}

impl ManagerError {
    /// Failure code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ManagerError::DuplicateEntity { .. } => ErrorCode::DuplicateEntity,
            ManagerError::Unconfirmed { .. } => ErrorCode::WriteUnconfirmed,
            ManagerError::Store(StoreError::AmbiguousResult { .. }) => ErrorCode::AmbiguousResult,
            ManagerError::Store(StoreError::UniqueViolation { .. }) => ErrorCode::DuplicateEntity,
            ManagerError::Store(StoreError::Unavailable { .. }) => ErrorCode::StoreUnavailable,
            ManagerError::Cache(CacheError::Unavailable { .. }) => ErrorCode::CacheUnavailable,
            ManagerError::Store(StoreError::LockPoisoned)
            | ManagerError::Cache(_)
            | ManagerError::Config(_) => ErrorCode::Internal,
        }
    }

    /// Transport failures the caller may retry. The core never retries itself.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::StoreUnavailable | ErrorCode::CacheUnavailable
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_display() {
        let err = ManagerError::DuplicateEntity {
            key: NaturalKey::new("temp", 5),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("already exists"));
        assert!(msg.contains("5:temp"));
    }

    #[test]
    fn test_store_error_lifts_into_manager_error() {
        let err: ManagerError = StoreError::AmbiguousResult {
            predicate: "name=\"temp\"".to_string(),
            matched: 2,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::AmbiguousResult);
        assert!(!err.is_retryable());
        assert!(format!("{}", err).contains("matched 2"));
    }

    #[test]
    fn test_transport_failures_are_retryable() {
        let store: ManagerError = StoreError::Unavailable {
            reason: "connection reset".to_string(),
        }
        .into();
        let cache: ManagerError = CacheError::Unavailable {
            region: "driver_attribute:id".to_string(),
            reason: "timeout".to_string(),
        }
        .into();
        assert!(store.is_retryable());
        assert!(cache.is_retryable());
        assert_eq!(cache.code(), ErrorCode::CacheUnavailable);
    }

    #[test]
    fn test_unique_violation_reports_duplicate() {
        let err: ManagerError = StoreError::UniqueViolation {
            key: NaturalKey::new("temp", 5),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::DuplicateEntity);
    }

    #[test]
    fn test_unconfirmed_write_is_not_retryable() {
        let err = ManagerError::Unconfirmed {
            id: 1,
            reason: "Record store unavailable: blip".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::WriteUnconfirmed);
        assert!(!err.is_retryable());
        assert!(format!("{}", err).contains("record 1 committed"));
    }

    #[test]
    fn test_error_code_serializes_screaming_case() {
        let json = serde_json::to_string(&ErrorCode::DuplicateEntity).unwrap();
        assert_eq!(json, "\"DUPLICATE_ENTITY\"");
    }
}
