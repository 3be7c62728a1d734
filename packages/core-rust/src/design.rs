//! Design documents and generated view functions.
//!
//! All JavaScript source the crate sends to the store is produced here.
//! Identifiers are embedded as JSON string literals, which are also valid
//! JavaScript string literals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document field carrying the entity type name.
pub const TYPE_FIELD: &str = "type";

/// Reduce function used by count views.
pub const COUNT_REDUCE_FUNCTION: &str = "function(keys, values) {
  return values.length;
}";

fn js_string(text: &str) -> String {
    // serde_json never fails to serialize a &str
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

/// Map function emitting `[doc[f1], doc[f2], ...]` as key and the whole
/// document as value, for documents of `type_name` only.
///
/// # Examples
///
/// ```
/// use viewfind_core::design::map_function;
///
/// let source = map_function("Comment", &["title".to_string(), "name".to_string()]);
/// assert!(source.contains(r#"emit([doc["title"], doc["name"]], doc);"#));
/// ```
#[must_use]
pub fn map_function(type_name: &str, key_fields: &[String]) -> String {
    let key = key_fields
        .iter()
        .map(|field| format!("doc[{}]", js_string(field)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "function(doc) {{
  if (doc.{TYPE_FIELD} == {}) {{
    emit([{key}], doc);
  }}
}}",
        js_string(type_name)
    )
}

/// Source of one view inside a design document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub map: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reduce: Option<String>,
    /// Other view members (`options`, ...), carried through untouched.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl ViewDefinition {
    #[must_use]
    pub fn new(map: impl Into<String>, reduce: Option<String>) -> Self {
        Self {
            map: map.into(),
            reduce,
            other: BTreeMap::new(),
        }
    }
}

/// A `_design/<name>` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignDocument {
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision of the stored document this one replaces.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none", default)]
    pub rev: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub views: BTreeMap<String, ViewDefinition>,
    /// Other design-document members (`filters`, `validate_doc_update`, ...),
    /// carried through untouched.
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

fn default_language() -> String {
    "javascript".to_string()
}

impl DesignDocument {
    /// Empty design document with the given id and no revision.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            language: default_language(),
            views: BTreeMap::new(),
            other: BTreeMap::new(),
        }
    }

    /// Builds the document to save for `view`, starting from the stored
    /// document if there is one. The stored revision and sibling views are
    /// kept; `view` itself is replaced.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error when `existing` is not a design
    /// document.
    pub fn upsert_view(
        id: &str,
        existing: Option<Value>,
        view: &str,
        definition: ViewDefinition,
    ) -> Result<Self, serde_json::Error> {
        let mut document = match existing {
            Some(value) => serde_json::from_value::<Self>(value)?,
            None => Self::new(id),
        };
        document.views.insert(view.to_string(), definition);
        Ok(document)
    }

    /// JSON body for the store.
    ///
    /// # Errors
    ///
    /// Propagates serialization failure.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn strings(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| (*f).to_string()).collect()
    }

    #[test]
    fn map_function_emits_fields_in_key_order() {
        let source = map_function("Comment", &strings(&["title", "name"]));
        assert!(source.contains(r#"[doc["title"], doc["name"]]"#));
        assert!(source.contains(r#"doc.type == "Comment""#));
    }

    #[test]
    fn map_function_for_single_field() {
        let source = map_function("Comment", &strings(&["title"]));
        assert!(source.contains(r#"emit([doc["title"]], doc);"#));
    }

    #[test]
    fn map_function_without_fields_emits_empty_key() {
        let source = map_function("Comment", &[]);
        assert!(source.contains("emit([], doc);"));
    }

    #[test]
    fn map_function_escapes_identifiers() {
        let source = map_function("Odd\"Type", &strings(&["we\"ird"]));
        assert!(source.contains(r#"doc["we\"ird"]"#));
        assert!(source.contains(r#""Odd\"Type""#));
    }

    #[test]
    fn count_reduce_counts_values() {
        assert!(COUNT_REDUCE_FUNCTION.contains("return values.length;"));
    }

    #[test]
    fn upsert_without_existing_has_no_rev() {
        let doc = DesignDocument::upsert_view(
            "_design/comment",
            None,
            "by_title",
            ViewDefinition::new("m", None),
        )
        .unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(value["_id"], "_design/comment");
        assert!(value.get("_rev").is_none());
        assert_eq!(value["views"]["by_title"]["map"], "m");
        assert!(value["views"]["by_title"].get("reduce").is_none());
    }

    #[test]
    fn upsert_keeps_rev_and_sibling_views() {
        let existing = json!({
            "_id": "_design/comment",
            "_rev": "3-abc",
            "views": { "by_name": { "map": "old" } },
            "validate_doc_update": "function() {}"
        });
        let doc = DesignDocument::upsert_view(
            "_design/comment",
            Some(existing),
            "by_name_count",
            ViewDefinition::new("m", Some(COUNT_REDUCE_FUNCTION.into())),
        )
        .unwrap();
        assert_eq!(doc.rev.as_deref(), Some("3-abc"));
        assert_eq!(doc.views.len(), 2);
        assert_eq!(doc.views["by_name"].map, "old");
        assert_eq!(doc.other["validate_doc_update"], "function() {}");
        assert_eq!(
            doc.views["by_name_count"].reduce.as_deref(),
            Some(COUNT_REDUCE_FUNCTION)
        );
    }

    #[test]
    fn upsert_rejects_non_design_document() {
        let result = DesignDocument::upsert_view(
            "_design/comment",
            Some(json!(["not", "a", "document"])),
            "by_name",
            ViewDefinition::new("m", None),
        );
        assert!(result.is_err());
    }

    #[test]
    fn upsert_keeps_unknown_members_of_sibling_views() {
        let existing = json!({
            "_id": "_design/comment",
            "_rev": "1-abc",
            "views": {
                "by_name": { "map": "old", "options": { "collation": "raw" } }
            }
        });
        let doc = DesignDocument::upsert_view(
            "_design/comment",
            Some(existing),
            "by_title",
            ViewDefinition::new("m", None),
        )
        .unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(
            value["views"]["by_name"]["options"],
            json!({ "collation": "raw" })
        );
        assert_eq!(value["views"]["by_name"]["map"], "old");
        assert!(value["views"]["by_title"].get("options").is_none());
    }
}
