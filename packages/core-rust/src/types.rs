//! Condition and view-option types accepted at the query API boundary.
//!
//! A [`ConditionValue`] is classified once, when the caller builds it, so the
//! key encoder never inspects JSON shapes to decide between scalar, range and
//! any-of semantics.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value side of a single field condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ConditionValue {
    /// Field equals this value.
    Scalar { value: Value },
    /// Field lies in `start..=end` (both bounds inclusive).
    Range { start: Value, end: Value },
    /// Field equals any one of these values.
    AnyOf { values: Vec<Value> },
}

impl ConditionValue {
    /// Equality condition.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar {
            value: value.into(),
        }
    }

    /// Inclusive range condition.
    pub fn range(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::Range {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Membership condition over a finite set of values.
    pub fn any_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::AnyOf {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    #[must_use]
    pub fn is_any_of(&self) -> bool {
        matches!(self, Self::AnyOf { .. })
    }
}

impl From<Value> for ConditionValue {
    fn from(value: Value) -> Self {
        Self::Scalar { value }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::scalar(value)
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        Self::scalar(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        Self::scalar(value)
    }
}

impl From<i32> for ConditionValue {
    fn from(value: i32) -> Self {
        Self::scalar(value)
    }
}

impl From<u64> for ConditionValue {
    fn from(value: u64) -> Self {
        Self::scalar(value)
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        Self::scalar(value)
    }
}

impl<T: Into<Value>> From<RangeInclusive<T>> for ConditionValue {
    fn from(range: RangeInclusive<T>) -> Self {
        let (start, end) = range.into_inner();
        Self::range(start, end)
    }
}

impl<T: Into<Value>> From<Vec<T>> for ConditionValue {
    fn from(values: Vec<T>) -> Self {
        Self::any_of(values)
    }
}

/// Field name to condition mapping.
///
/// Backed by a `BTreeMap`, so iteration is always in ascending field-name
/// order no matter how the conditions were inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(BTreeMap<String, ConditionValue>);

impl Conditions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Inserts or replaces the condition on `field`.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<ConditionValue>) {
        self.0.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&ConditionValue> {
        self.0.get(field)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Field names in ascending order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConditionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Conditions
where
    K: Into<String>,
    V: Into<ConditionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut conditions = Self::new();
        for (field, value) in iter {
            conditions.insert(field, value);
        }
        conditions
    }
}

/// Caller-supplied view options.
///
/// `order` is consumed by the key encoder and never sent to the store.
/// Everything in `params` (`limit`, `skip`, `descending`, `group`, ...) is
/// forwarded verbatim next to the computed key parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewOptions {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order: Option<Vec<String>>,
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl ViewOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sort fields. They lead the emitted key, in this order.
    #[must_use]
    pub fn order<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn limit(self, limit: u64) -> Self {
        self.param("limit", limit)
    }

    #[must_use]
    pub fn skip(self, skip: u64) -> Self {
        self.param("skip", skip)
    }

    #[must_use]
    pub fn descending(self, descending: bool) -> Self {
        self.param("descending", descending)
    }

    #[must_use]
    pub fn group(self, group: bool) -> Self {
        self.param("group", group)
    }

    /// Sets an arbitrary pass-through store parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Order fields, or `None` when no order was given or it is empty.
    #[must_use]
    pub fn order_fields(&self) -> Option<&[String]> {
        self.order.as_deref().filter(|fields| !fields.is_empty())
    }

    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    #[must_use]
    pub fn is_descending(&self) -> bool {
        matches!(self.params.get("descending"), Some(Value::Bool(true)))
    }
}
