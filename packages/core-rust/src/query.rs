//! Compilation of conditions and order into view query parameters.
//!
//! The store only supports one-dimensional scans over compound keys, so
//! every query is encoded as exactly one [`KeyFilter`]:
//!
//! | conditions                                | filter            |
//! |-------------------------------------------|-------------------|
//! | any range, or an order option             | `Range`           |
//! | one any-of condition                      | `Keys`            |
//! | only scalars                              | `Key`             |
//! | nothing                                   | `All`             |

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::QueryError;
use crate::key::canonical_key_fields;
use crate::types::{ConditionValue, Conditions, ViewOptions};

/// Upper-bound placeholder for key positions with no value, so that
/// open-ended scans cover every string key below U+9999.
///
/// String keys collating above this character are not covered.
pub const MAX_KEY_SENTINEL: &str = "\u{9999}";

/// The key part of a view query.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyFilter {
    /// Every row of the view.
    All,
    /// Rows whose key equals this tuple.
    Key(Vec<Value>),
    /// Rows whose key lies between `startkey` and `endkey`, inclusive.
    Range {
        startkey: Vec<Value>,
        endkey: Vec<Value>,
    },
    /// Rows whose key equals any of these tuples, in this order.
    Keys(Vec<Vec<Value>>),
}

impl KeyFilter {
    /// Short label for logs and spans.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Key(_) => "key",
            Self::Range { .. } => "range",
            Self::Keys(_) => "keys",
        }
    }
}

/// A compiled view query: key filter plus pass-through options.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    pub filter: KeyFilter,
    /// Store options forwarded verbatim (`limit`, `descending`, ...).
    pub options: BTreeMap<String, Value>,
}

impl ViewQuery {
    /// Query for every row with no options.
    #[must_use]
    pub fn all() -> Self {
        Self {
            filter: KeyFilter::All,
            options: BTreeMap::new(),
        }
    }

    /// Flat parameter map as the store receives it.
    ///
    /// Every pass-through option is kept. A compiled exact `key` replaces a
    /// caller `key`; in the range and multi-key shapes caller `startkey`,
    /// `endkey` and `keys` options take precedence over the compiled ones.
    #[must_use]
    pub fn to_params(&self) -> Map<String, Value> {
        let mut params: Map<String, Value> = self
            .options
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        match &self.filter {
            KeyFilter::All => {}
            KeyFilter::Key(key) => {
                params.insert("key".into(), Value::Array(key.clone()));
            }
            KeyFilter::Range { startkey, endkey } => {
                params
                    .entry("startkey")
                    .or_insert_with(|| Value::Array(startkey.clone()));
                params
                    .entry("endkey")
                    .or_insert_with(|| Value::Array(endkey.clone()));
            }
            KeyFilter::Keys(keys) => {
                params
                    .entry("keys")
                    .or_insert_with(|| keys.iter().cloned().map(Value::Array).collect());
            }
        }
        params
    }

    #[must_use]
    pub fn is_descending(&self) -> bool {
        matches!(self.options.get("descending"), Some(Value::Bool(true)))
    }
}

/// Compiles `conditions` and `options` into a [`ViewQuery`].
///
/// # Errors
///
/// [`QueryError::UnsupportedQueryShape`] when more than one field holds an
/// any-of condition, or an any-of condition meets the range shape.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use viewfind_core::query::compile;
/// use viewfind_core::{Conditions, ViewOptions};
///
/// let conditions = Conditions::new().with("name", "xyz").with("title", "abc");
/// let query = compile(&conditions, &ViewOptions::new()).unwrap();
/// assert_eq!(query.to_params()["key"], json!(["xyz", "abc"]));
/// ```
pub fn compile(conditions: &Conditions, options: &ViewOptions) -> Result<ViewQuery, QueryError> {
    let order = options.order_fields();
    let fields = canonical_key_fields(conditions, order);
    let values: Vec<Option<&ConditionValue>> =
        fields.iter().map(|field| conditions.get(field)).collect();

    let any_of: Vec<(usize, &[Value])> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| match v {
            Some(ConditionValue::AnyOf { values }) => Some((i, values.as_slice())),
            _ => None,
        })
        .collect();
    if any_of.len() > 1 {
        let names: Vec<&str> = any_of.iter().map(|&(i, _)| fields[i].as_str()).collect();
        return Err(QueryError::UnsupportedQueryShape {
            reason: format!("more than one any-of condition: {}", names.join(", ")),
        });
    }

    let has_range = values.iter().any(|v| v.is_some_and(ConditionValue::is_range));

    let filter = if has_range || order.is_some() {
        if let Some(&(position, _)) = any_of.first() {
            return Err(QueryError::UnsupportedQueryShape {
                reason: format!(
                    "any-of condition on `{}` cannot be combined with a range or order",
                    fields[position]
                ),
            });
        }
        let startkey: Vec<Value> = values.iter().map(|v| lower_bound(*v)).collect();
        let endkey: Vec<Value> = values.iter().map(|v| upper_bound(*v)).collect();
        if options.is_descending() {
            KeyFilter::Range {
                startkey: endkey,
                endkey: startkey,
            }
        } else {
            KeyFilter::Range { startkey, endkey }
        }
    } else if let Some(&(position, choices)) = any_of.first() {
        let base: Vec<Value> = values.iter().map(|v| scalar(*v)).collect();
        let keys = choices
            .iter()
            .map(|choice| {
                let mut key = base.clone();
                key[position] = choice.clone();
                key
            })
            .collect();
        KeyFilter::Keys(keys)
    } else if values.is_empty() {
        KeyFilter::All
    } else {
        KeyFilter::Key(values.iter().map(|v| scalar(*v)).collect())
    };

    Ok(ViewQuery {
        filter,
        options: options.params.clone(),
    })
}

fn scalar(value: Option<&ConditionValue>) -> Value {
    match value {
        Some(ConditionValue::Scalar { value }) => value.clone(),
        _ => Value::Null,
    }
}

fn lower_bound(value: Option<&ConditionValue>) -> Value {
    match value {
        Some(ConditionValue::Range { start, .. }) => start.clone(),
        other => scalar(other),
    }
}

fn upper_bound(value: Option<&ConditionValue>) -> Value {
    match value {
        Some(ConditionValue::Range { end, .. }) => end.clone(),
        other => match scalar(other) {
            Value::Null => Value::String(MAX_KEY_SENTINEL.to_string()),
            v => v,
        },
    }
}
