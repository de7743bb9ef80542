//! Entity records, update payloads and pagination types.

use crate::{non_blank, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Field names exposed to predicates, in declaration order.
pub mod fields {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const ATTRIBUTE_TYPE: &str = "attribute_type";
    pub const DRIVER_ID: &str = "driver_id";
}

// ============================================================================
// RECORD CONTRACT
// ============================================================================

/// A persistable record with a store-generated id and a natural key.
///
/// Stores stay generic over this trait: they assign ids, stamp timestamps,
/// merge partial updates and evaluate predicates through it.
pub trait Record: Clone + Send + Sync + 'static {
    /// Partial update payload for this record.
    type Patch: RecordPatch;

    /// Identifier, `None` until the record has been inserted.
    fn id(&self) -> Option<RecordId>;

    /// Assign the store-generated identifier.
    fn assign_id(&mut self, id: RecordId);

    /// Stamp creation and modification times on insert.
    fn stamp_created(&mut self, at: Timestamp);

    /// Merge the supplied fields of a patch. Never touches the creation time.
    fn apply_patch(&mut self, patch: &Self::Patch, at: Timestamp);

    /// Unique (name, parent) pair.
    fn natural_key(&self) -> NaturalKey;

    /// Value of a named field for predicate evaluation.
    fn field(&self, name: &str) -> Option<Value>;
}

/// Partial update addressed at a single record id.
pub trait RecordPatch: Clone + Send + Sync + 'static {
    fn target_id(&self) -> RecordId;
}

/// Natural key: a human-meaningful name scoped within a parent id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub name: String,
    pub parent_id: RecordId,
}

impl NaturalKey {
    pub fn new(name: impl Into<String>, parent_id: RecordId) -> Self {
        Self {
            name: name.into(),
            parent_id,
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.parent_id, self.name)
    }
}

// ============================================================================
// DRIVER ATTRIBUTE
// ============================================================================

/// Configuration attribute declared by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAttribute {
    pub id: Option<RecordId>,
    /// Natural key, unique per driver.
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub attribute_type: String,
    /// Default value applied when a driver instance leaves it unset.
    pub value: Option<String>,
    pub unit: Option<String>,
    pub driver_id: RecordId,
    pub description: Option<String>,
    pub create_time: Option<Timestamp>,
    pub update_time: Option<Timestamp>,
}

impl DriverAttribute {
    /// Create an unsaved attribute.
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        attribute_type: impl Into<String>,
        driver_id: RecordId,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            attribute_type: attribute_type.into(),
            driver_id,
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Record for DriverAttribute {
    type Patch = DriverAttributeUpdate;

    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn stamp_created(&mut self, at: Timestamp) {
        self.create_time = Some(at);
        self.update_time = Some(at);
    }

    fn apply_patch(&mut self, patch: &DriverAttributeUpdate, at: Timestamp) {
        if let Some(name) = non_blank(patch.name.as_deref()) {
            self.name = name.to_string();
        }
        if let Some(display_name) = non_blank(patch.display_name.as_deref()) {
            self.display_name = display_name.to_string();
        }
        if let Some(attribute_type) = non_blank(patch.attribute_type.as_deref()) {
            self.attribute_type = attribute_type.to_string();
        }
        if let Some(value) = &patch.value {
            self.value = Some(value.clone());
        }
        if let Some(unit) = &patch.unit {
            self.unit = Some(unit.clone());
        }
        if let Some(driver_id) = patch.driver_id {
            self.driver_id = driver_id;
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        self.update_time = Some(at);
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.name.clone(), self.driver_id)
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            fields::ID => self.id.map(Value::from),
            fields::NAME => Some(Value::from(self.name.as_str())),
            fields::DISPLAY_NAME => Some(Value::from(self.display_name.as_str())),
            fields::ATTRIBUTE_TYPE => Some(Value::from(self.attribute_type.as_str())),
            fields::DRIVER_ID => Some(Value::from(self.driver_id)),
            _ => None,
        }
    }
}

/// Update payload for driver attributes.
///
/// Absent or blank fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAttributeUpdate {
    pub id: RecordId,
    pub name: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub attribute_type: Option<String>,
    pub value: Option<String>,
    pub unit: Option<String>,
    pub driver_id: Option<RecordId>,
    pub description: Option<String>,
}

impl DriverAttributeUpdate {
    /// Empty update for the given id.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn attribute_type(mut self, attribute_type: impl Into<String>) -> Self {
        self.attribute_type = Some(attribute_type.into());
        self
    }

    pub fn driver_id(mut self, driver_id: RecordId) -> Self {
        self.driver_id = Some(driver_id);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl RecordPatch for DriverAttributeUpdate {
    fn target_id(&self) -> RecordId {
        self.id
    }
}

/// Sparse query filter for driver attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAttributeFilter {
    /// Substring match.
    pub display_name: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub attribute_type: Option<String>,
    pub driver_id: Option<RecordId>,
    pub page: Option<Pages>,
}

impl DriverAttributeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn attribute_type(mut self, attribute_type: impl Into<String>) -> Self {
        self.attribute_type = Some(attribute_type.into());
        self
    }

    pub fn driver_id(mut self, driver_id: RecordId) -> Self {
        self.driver_id = Some(driver_id);
        self
    }

    pub fn page(mut self, current: u64, size: u64) -> Self {
        self.page = Some(Pages::new(current, size));
        self
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

/// Requested page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pages {
    pub current: u64,
    pub size: u64,
}

impl Pages {
    pub fn new(current: u64, size: u64) -> Self {
        Self { current, size }
    }

    /// Clamp to `current >= 1` and `1 <= size <= max_size`.
    pub fn normalized(self, max_size: u64) -> Self {
        Self {
            current: self.current.max(1),
            size: self.size.clamp(1, max_size.max(1)),
        }
    }

    /// Number of records skipped before this page.
    pub fn offset(&self) -> u64 {
        self.current.saturating_sub(1).saturating_mul(self.size)
    }
}

/// One page of records plus count metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub current: u64,
    pub size: u64,
    pub pages: u64,
}

impl<T> PageResult<T> {
    pub fn new(records: Vec<T>, total: u64, page: Pages) -> Self {
        let pages = if page.size == 0 {
            0
        } else {
            total.div_ceil(page.size)
        };
        Self {
            records,
            total,
            current: page.current,
            size: page.size,
            pages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Label/value pair for selection dictionaries, grouped by parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub label: String,
    pub value: RecordId,
    pub parent: RecordId,
}

impl DictionaryEntry {
    /// Dictionary entry for a stored attribute; `None` while it has no id.
    pub fn from_attribute(attribute: &DriverAttribute) -> Option<Self> {
        attribute.id.map(|id| Self {
            label: attribute.display_name.clone(),
            value: id,
            parent: attribute.driver_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_patch_keeps_create_time() {
        let created = crate::now();
        let mut attribute = DriverAttribute::new("temp", "Temperature", "float", 5);
        attribute.stamp_created(created);

        let later = created + chrono::Duration::seconds(5);
        let patch = DriverAttributeUpdate::new(1)
            .display_name("Temp")
            .name("   ");
        attribute.apply_patch(&patch, later);

        assert_eq!(attribute.create_time, Some(created));
        assert_eq!(attribute.update_time, Some(later));
        assert_eq!(attribute.display_name, "Temp");
        assert_eq!(attribute.name, "temp");
    }

    #[test]
    fn test_natural_key_display() {
        let attribute = DriverAttribute::new("temp", "Temperature", "float", 5);
        assert_eq!(attribute.natural_key().to_string(), "5:temp");
    }

    #[test]
    fn test_field_lookup() {
        let mut attribute = DriverAttribute::new("temp", "Temperature", "float", 5);
        assert_eq!(attribute.field(fields::ID), None);
        attribute.assign_id(7);
        assert_eq!(attribute.field(fields::ID), Some(Value::from(7)));
        assert_eq!(attribute.field(fields::DRIVER_ID), Some(Value::from(5)));
        assert_eq!(attribute.field("unknown"), None);
    }

    #[test]
    fn test_pages_normalized() {
        assert_eq!(Pages::new(0, 0).normalized(100), Pages::new(1, 1));
        assert_eq!(Pages::new(3, 1000).normalized(100), Pages::new(3, 100));
        assert_eq!(Pages::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_page_result_page_count() {
        let page = PageResult::new(vec![1, 2], 21, Pages::new(1, 10));
        assert_eq!(page.pages, 3);
        let empty: PageResult<i32> = PageResult::new(vec![], 0, Pages::new(1, 10));
        assert_eq!(empty.pages, 0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_serde_uses_type_field() {
        let attribute = DriverAttribute::new("temp", "Temperature", "float", 5);
        let json = serde_json::to_value(&attribute).unwrap();
        assert_eq!(json["type"], "float");
        assert_eq!(json["driverId"], 5);
    }
}
