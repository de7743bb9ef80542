//! Value-typed query predicates and the filter → predicate builder.
//!
//! A [`Predicate`] is a flat conjunction of [`FilterExpr`] constraints. Stores
//! interpret it; the service derives cache keys from its canonical
//! [`signature`](Predicate::signature). Constraint order follows the order in
//! which the builder visits filter fields, so equal filters always produce
//! equal signatures.

use crate::entities::{fields, DriverAttributeFilter, NaturalKey, Pages, Record};
use crate::non_blank;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Contains substring (for strings)
    Contains,
}

impl FilterOperator {
    fn symbol(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Contains => "~",
        }
    }
}

/// Single field constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterExpr {
    /// Field to filter on
    pub field: String,
    /// Operator to apply
    pub operator: FilterOperator,
    /// Value to compare against
    pub value: Value,
}

impl FilterExpr {
    /// Create a new filter expression.
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value.into())
    }

    /// Create a contains filter.
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Contains, value.into())
    }

    /// Evaluate against a record. Missing fields never match.
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        let Some(actual) = record.field(&self.field) else {
            return false;
        };
        match self.operator {
            FilterOperator::Eq => actual == self.value,
            FilterOperator::Contains => match (actual.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
        }
    }
}

/// Flat conjunction of field constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    exprs: Vec<FilterExpr>,
}

impl Predicate {
    /// Predicate matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Unique lookup by natural key.
    pub fn natural_key(key: &NaturalKey) -> Self {
        Self::all()
            .and_eq(fields::NAME, key.name.as_str())
            .and_eq(fields::DRIVER_ID, key.parent_id)
    }

    /// Append an equality constraint.
    pub fn and_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.exprs.push(FilterExpr::eq(field, value));
        self
    }

    /// Append a substring constraint.
    pub fn and_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.exprs.push(FilterExpr::contains(field, value));
        self
    }

    /// Append an equality constraint unless the value is blank.
    pub fn eq_if_present(self, field: &str, value: Option<&str>) -> Self {
        match non_blank(value) {
            Some(v) => self.and_eq(field, v),
            None => self,
        }
    }

    /// Append a substring constraint unless the value is blank.
    pub fn contains_if_present(self, field: &str, value: Option<&str>) -> Self {
        match non_blank(value) {
            Some(v) => self.and_contains(field, v),
            None => self,
        }
    }

    pub fn exprs(&self) -> &[FilterExpr] {
        &self.exprs
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// True when every constraint holds for the record.
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.exprs.iter().all(|expr| expr.matches(record))
    }

    /// Canonical textual form, e.g. `display_name~"Temp"&driver_id=5`.
    ///
    /// Values are JSON-encoded so separators inside strings cannot collide.
    pub fn signature(&self) -> String {
        if self.exprs.is_empty() {
            return "*".to_string();
        }
        self.exprs
            .iter()
            .map(|e| format!("{}{}{}", e.field, e.operator.symbol(), e.value))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Fixed-width cache key for this predicate on the given page.
    pub fn page_key(&self, page: &Pages) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signature().as_bytes());
        hasher.update(format!("#current={}&size={}", page.current, page.size).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Builds the query predicate for a sparse filter.
pub trait ToPredicate {
    fn to_predicate(&self) -> Predicate;
}

impl ToPredicate for DriverAttributeFilter {
    fn to_predicate(&self) -> Predicate {
        let predicate = Predicate::all()
            .contains_if_present(fields::DISPLAY_NAME, self.display_name.as_deref())
            .eq_if_present(fields::NAME, self.name.as_deref())
            .eq_if_present(fields::ATTRIBUTE_TYPE, self.attribute_type.as_deref());
        match self.driver_id {
            Some(driver_id) => predicate.and_eq(fields::DRIVER_ID, driver_id),
            None => predicate,
        }
    }
}

impl<T: ToPredicate> ToPredicate for Option<T> {
    fn to_predicate(&self) -> Predicate {
        self.as_ref()
            .map(ToPredicate::to_predicate)
            .unwrap_or_default()
    }
}
