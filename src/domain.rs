use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::{Map, Value, json};

/// Auxiliary options (locale, timezone, record visibility) sent with every call.
pub type Context = Map<String, Value>;

/// A search filter triple: field, comparison operator, value.
///
/// Serializes to the 3-element array the server expects, e.g.
/// `["id", ">", 0]`. Multiple triples in a filter list combine with an
/// implicit logical AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    field: String,
    operator: String,
    value: Value,
}

impl Domain {
    pub fn new(field: &str, operator: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            operator: operator.to_string(),
            value: value.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!([self.field, self.operator, self.value])
    }
}

/// The base filter matching every stored record.
impl Default for Domain {
    fn default() -> Self {
        Self::new("id", ">", 0)
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.field)?;
        seq.serialize_element(&self.operator)?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

/// Prepend the mandatory `id > 0` filter to the caller's filters.
///
/// The transmitted filter set is always `{id > 0} ∪ filters`, even when the
/// caller supplies none.
pub fn with_base_filter(filters: &[Domain]) -> Vec<Value> {
    let mut all = Vec::with_capacity(filters.len() + 1);
    all.push(Domain::default().to_value());
    all.extend(filters.iter().map(Domain::to_value));
    all
}

/// Build the write command replacing a many-to-many relation's membership
/// with exactly the given id set: `[[6, 0, [id...]]]`.
pub fn many2many_override(ids: &[i64]) -> Value {
    json!([[6, 0, ids]])
}
