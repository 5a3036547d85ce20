//! Structured page data handed from `build`/`generate` to `render`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use time::OffsetDateTime;

static NULL: DataValue = DataValue::Null;

/// The closed set of value kinds a page can return as data.
#[derive(Debug, Clone, Default)]
pub enum DataValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(OffsetDateTime),
    List(Vec<DataValue>),
    Record(BTreeMap<String, DataValue>),
    /// Identity-bearing reference; the only way to express shared or cyclic data.
    Shared(SharedValue),
}

impl DataValue {
    pub fn record<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, DataValue)>,
    {
        Self::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn empty_record() -> Self {
        Self::Record(BTreeMap::new())
    }

    /// Look up a field, following shared references.
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self.resolve() {
            DataValue::Record(fields) => fields.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.resolve() {
            DataValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.resolve() {
            DataValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DataValue]> {
        match self.resolve() {
            DataValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Follow `Shared` links until a concrete value is reached. Unset or cyclic-only
    /// chains resolve to `Null`.
    pub fn resolve(&self) -> &DataValue {
        let mut current = self;
        let mut hops = Vec::new();
        while let DataValue::Shared(shared) = current {
            if hops.contains(&shared.identity()) {
                return &NULL;
            }
            hops.push(shared.identity());
            match shared.get() {
                Some(inner) => current = inner,
                None => return &NULL,
            }
        }
        current
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Bool(_) => "boolean",
            DataValue::Int(_) | DataValue::Float(_) => "number",
            DataValue::String(_) => "string",
            DataValue::Date(_) => "date",
            DataValue::List(_) => "array",
            DataValue::Record(_) => "object",
            DataValue::Shared(_) => "reference",
        }
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<OffsetDateTime> for DataValue {
    fn from(value: OffsetDateTime) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<DataValue>> for DataValue {
    fn from(value: Vec<DataValue>) -> Self {
        Self::List(value)
    }
}

impl From<serde_json::Value> for DataValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(text) => Self::String(text),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => Self::Record(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

/// A write-once shared slot. Cloning shares identity; two slots with equal contents
/// are still distinct references.
#[derive(Clone, Default)]
pub struct SharedValue(Arc<OnceLock<DataValue>>);

impl SharedValue {
    pub fn new(value: DataValue) -> Self {
        let slot = Self::empty();
        let _ = slot.0.set(value);
        slot
    }

    /// An unset slot, to be filled with [`SharedValue::set`] once the value that
    /// points back at it has been built.
    pub fn empty() -> Self {
        Self(Arc::new(OnceLock::new()))
    }

    /// Fill the slot. Returns the value back if the slot was already set.
    pub fn set(&self, value: DataValue) -> Result<(), DataValue> {
        self.0.set(value)
    }

    pub fn get(&self) -> Option<&DataValue> {
        self.0.get()
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for SharedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Cycles make structural Debug unbounded.
        write!(f, "SharedValue({:#x})", self.identity())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_conversion_keeps_structure() {
        let value = DataValue::from(json!({"slug": "x", "tags": ["a", "b"], "n": 3}));
        assert_eq!(value.get("slug").and_then(DataValue::as_str), Some("x"));
        assert_eq!(value.get("n").and_then(DataValue::as_i64), Some(3));
        assert_eq!(value.get("tags").and_then(DataValue::as_list).map(<[_]>::len), Some(2));
    }

    #[test]
    fn resolve_follows_shared_links_and_stops_on_cycles() {
        let inner = SharedValue::new(DataValue::from("hello"));
        let outer = DataValue::Shared(SharedValue::new(DataValue::Shared(inner)));
        assert_eq!(outer.as_str(), Some("hello"));

        let cycle = SharedValue::empty();
        cycle
            .set(DataValue::Shared(cycle.clone()))
            .expect("slot starts empty");
        assert!(matches!(DataValue::Shared(cycle).resolve(), DataValue::Null));
    }
}
