//! In-memory [`ViewStore`] implementation backed by [`DashMap`].
//!
//! Holds documents and design documents in one map and evaluates views on
//! every query. Only view functions generated by this crate can be
//! evaluated; see [`view_source`](super::view_source).

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use anyhow::anyhow;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use viewfind_core::{DesignDocument, StoreError, ViewPath, ViewQuery, ViewResult, ViewRow};

use super::collate::collate;
use super::view_source::{is_count_reduce, MapSource};
use crate::traits::ViewStore;

const DESIGN_PREFIX: &str = "_design/";

/// In-memory document store with view support.
pub struct MemoryStore {
    documents: DashMap<String, Value>,
    design_writes: AtomicUsize,
    last_query: Mutex<Option<ViewQuery>>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            design_writes: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    /// Number of successful writes to design documents.
    #[must_use]
    pub fn design_writes(&self) -> usize {
        self.design_writes.load(AtomicOrdering::Relaxed)
    }

    /// Most recent query passed to [`ViewStore::query_view`].
    #[must_use]
    pub fn last_query(&self) -> Option<ViewQuery> {
        self.last_query.lock().clone()
    }

    /// Removes a document regardless of revision. Returns whether it existed.
    pub fn delete_document(&self, id: &str) -> bool {
        self.documents.remove(id).is_some()
    }

    /// Number of stored documents, design documents included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Map output of `source` over every non-design document, in key order.
    fn index(&self, source: &MapSource) -> Vec<ViewRow> {
        let mut rows: Vec<ViewRow> = self
            .documents
            .iter()
            .filter(|entry| !entry.key().starts_with(DESIGN_PREFIX))
            .filter_map(|entry| {
                source.emit(entry.value()).map(|key| ViewRow {
                    id: Some(entry.key().clone()),
                    key,
                    value: entry.value().clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id)));
        rows
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn flag(options: &Map<String, Value>, name: &str) -> Option<bool> {
    options.get(name).and_then(Value::as_bool)
}

fn count(options: &Map<String, Value>, name: &str) -> Option<usize> {
    options
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

/// Key selection as the store reads it from the query parameters.
#[derive(Debug, Clone, PartialEq)]
enum Scan {
    All,
    Key(Value),
    Keys(Vec<Value>),
    Range {
        start: Option<Value>,
        end: Option<Value>,
    },
}

impl Scan {
    fn from_params(params: &Map<String, Value>) -> Self {
        if let Some(Value::Array(keys)) = params.get("keys") {
            return Self::Keys(keys.clone());
        }
        if let Some(key) = params.get("key") {
            return Self::Key(key.clone());
        }
        let start = params.get("startkey").cloned();
        let end = params.get("endkey").cloned();
        if start.is_none() && end.is_none() {
            Self::All
        } else {
            Self::Range { start, end }
        }
    }
}

/// Rows of `index` selected by `scan`, in scan order.
fn select(
    index: Vec<ViewRow>,
    scan: &Scan,
    descending: bool,
    inclusive_end: bool,
) -> Vec<ViewRow> {
    let mut rows = index;
    if descending {
        rows.reverse();
    }
    match scan {
        Scan::All => rows,
        Scan::Key(key) => {
            rows.retain(|row| collate(&row.key, key) == Ordering::Equal);
            rows
        }
        Scan::Keys(keys) => keys
            .iter()
            .flat_map(|key| {
                rows.iter()
                    .filter(move |row| collate(&row.key, key) == Ordering::Equal)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect(),
        Scan::Range { start, end } => {
            // Scan direction decides which bound is the low one.
            let (after_start, before_end) = if descending {
                (Ordering::Less, Ordering::Greater)
            } else {
                (Ordering::Greater, Ordering::Less)
            };
            rows.retain(|row| {
                let from_start = start
                    .as_ref()
                    .map_or(after_start, |start| collate(&row.key, start));
                let to_end = end
                    .as_ref()
                    .map_or(before_end, |end| collate(&row.key, end));
                (from_start == after_start || from_start == Ordering::Equal)
                    && (to_end == before_end || (inclusive_end && to_end == Ordering::Equal))
            });
            rows
        }
    }
}

/// Count reduce over `rows`: one row per key when grouped, otherwise a
/// single null-keyed row. No rows in, no rows out.
fn reduce_count(rows: Vec<ViewRow>, group: bool) -> Vec<ViewRow> {
    if !group {
        if rows.is_empty() {
            return Vec::new();
        }
        return vec![ViewRow {
            id: None,
            key: Value::Null,
            value: Value::from(rows.len()),
        }];
    }
    let mut grouped: Vec<ViewRow> = Vec::new();
    for row in rows {
        match grouped.last_mut() {
            Some(last) if collate(&last.key, &row.key) == Ordering::Equal => {
                let n = last.value.as_u64().unwrap_or(0) + 1;
                last.value = Value::from(n);
            }
            _ => grouped.push(ViewRow {
                id: None,
                key: row.key,
                value: Value::from(1u64),
            }),
        }
    }
    grouped
}

fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(n, _)| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl ViewStore for MemoryStore {
    async fn query_view(
        &self,
        path: &ViewPath,
        query: &ViewQuery,
    ) -> Result<ViewResult, StoreError> {
        *self.last_query.lock() = Some(query.clone());

        let design_id = path.design_id();
        let design = self
            .documents
            .get(&design_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::not_found(design_id.clone()))?;
        let design: DesignDocument = serde_json::from_value(design).map_err(|e| {
            StoreError::Transport(anyhow!("malformed design document {design_id}: {e}"))
        })?;
        let definition = design
            .views
            .get(&path.view)
            .ok_or_else(|| StoreError::not_found(path.to_string()))?;
        let source = MapSource::parse(&definition.map).ok_or_else(|| {
            StoreError::Transport(anyhow!("cannot evaluate map function of {path}"))
        })?;
        let reducer = match &definition.reduce {
            Some(reduce) if is_count_reduce(reduce) => true,
            Some(_) => {
                return Err(StoreError::Transport(anyhow!(
                    "cannot evaluate reduce function of {path}"
                )))
            }
            None => false,
        };

        let params = query.to_params();
        let descending = flag(&params, "descending").unwrap_or(false);
        let inclusive_end = flag(&params, "inclusive_end").unwrap_or(true);
        let reduce = reducer && flag(&params, "reduce").unwrap_or(true);
        let group = flag(&params, "group").unwrap_or(false);
        let skip = count(&params, "skip").unwrap_or(0);
        let limit = count(&params, "limit").unwrap_or(usize::MAX);

        let scan = Scan::from_params(&params);
        if reduce && !group && matches!(scan, Scan::Keys(_)) {
            return Err(StoreError::Transport(anyhow!(
                "query_parse_error: multi-key fetches for reduce views must use group=true"
            )));
        }

        let index = self.index(&source);
        let total_rows = index.len() as u64;
        let selected = select(index, &scan, descending, inclusive_end);

        if reduce {
            let rows = reduce_count(selected, group)
                .into_iter()
                .skip(skip)
                .take(limit)
                .collect();
            return Ok(ViewResult::from_rows(rows));
        }

        let rows: Vec<ViewRow> = selected.into_iter().skip(skip).take(limit).collect();
        Ok(ViewResult {
            total_rows: Some(total_rows),
            offset: Some(skip as u64),
            rows,
        })
    }

    async fn get_document(&self, id: &str) -> Result<Value, StoreError> {
        self.documents
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn save_document(&self, document: &Value) -> Result<String, StoreError> {
        let Value::Object(fields) = document else {
            return Err(StoreError::Transport(anyhow!(
                "document must be a JSON object"
            )));
        };
        let id = match fields.get("_id") {
            Some(Value::String(id)) => id.clone(),
            Some(_) => return Err(StoreError::Transport(anyhow!("_id must be a string"))),
            None => uuid::Uuid::new_v4().simple().to_string(),
        };
        let given_rev = fields.get("_rev").and_then(Value::as_str);

        let rev = match self.documents.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                let current = entry.get().get("_rev").and_then(Value::as_str);
                if current != given_rev {
                    return Err(StoreError::conflict(id));
                }
                let rev = next_rev(current);
                entry.insert(stored(fields, &id, &rev));
                rev
            }
            Entry::Vacant(entry) => {
                if given_rev.is_some() {
                    return Err(StoreError::conflict(id));
                }
                let rev = next_rev(None);
                entry.insert(stored(fields, &id, &rev));
                rev
            }
        };

        if id.starts_with(DESIGN_PREFIX) {
            self.design_writes.fetch_add(1, AtomicOrdering::Relaxed);
        }
        tracing::trace!(id = %id, rev = %rev, "document saved");
        Ok(rev)
    }
}

fn stored(fields: &Map<String, Value>, id: &str, rev: &str) -> Value {
    let mut fields = fields.clone();
    fields.insert("_id".into(), Value::from(id));
    fields.insert("_rev".into(), Value::from(rev));
    Value::Object(fields)
}
