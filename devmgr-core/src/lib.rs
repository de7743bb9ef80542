//! Device Manager Core - Entity Types
//!
//! Pure data structures shared by the storage and service layers: entity
//! records, sparse query filters, value-typed predicates, pagination and the
//! error taxonomy. This crate contains no I/O.

use chrono::{DateTime, Utc};

pub mod config;
pub mod entities;
pub mod error;
pub mod filter;

pub use config::ServiceConfig;
pub use entities::{
    fields, DictionaryEntry, DriverAttribute, DriverAttributeFilter, DriverAttributeUpdate,
    NaturalKey, PageResult, Pages, Record, RecordPatch,
};
pub use error::{
    CacheError, ConfigError, ErrorCode, ManagerError, ManagerResult, StoreError,
};
pub use filter::{FilterExpr, FilterOperator, Predicate, ToPredicate};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Store-generated numeric record identifier.
pub type RecordId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Current wall-clock time as a [`Timestamp`].
pub fn now() -> Timestamp {
    Utc::now()
}

/// Returns the value unless it is absent, empty or whitespace only.
///
/// Blank strings never produce query constraints.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
