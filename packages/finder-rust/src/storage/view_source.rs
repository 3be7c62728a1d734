//! Recognizes the view functions generated by `viewfind_core::design`, so
//! [`MemoryStore`](super::MemoryStore) can execute them without a
//! JavaScript engine.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use viewfind_core::{COUNT_REDUCE_FUNCTION, TYPE_FIELD};

static TYPE_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"if \(doc\.{TYPE_FIELD} == ("(?:[^"\\]|\\.)*")\)"#
    ))
    .expect("type test pattern is valid")
});

static EMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"emit\(\[(.*)\], doc\);").expect("emit pattern is valid"));

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"doc\[("(?:[^"\\]|\\.)*")\]"#).expect("field pattern is valid")
});

/// A map function reduced to what it does: filter by type, emit fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MapSource {
    pub type_name: String,
    pub key_fields: Vec<String>,
}

impl MapSource {
    /// Returns `None` for map functions this crate did not generate.
    pub(crate) fn parse(source: &str) -> Option<Self> {
        let type_name = TYPE_TEST
            .captures(source)
            .and_then(|caps| serde_json::from_str::<String>(&caps[1]).ok())?;
        let emitted = EMIT.captures(source)?;
        let key_fields = FIELD
            .captures_iter(&emitted[1])
            .map(|caps| serde_json::from_str::<String>(&caps[1]).ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            type_name,
            key_fields,
        })
    }

    /// Emitted key for `document`, or `None` if the function skips it.
    pub(crate) fn emit(&self, document: &Value) -> Option<Value> {
        if document.get(TYPE_FIELD).and_then(Value::as_str) != Some(self.type_name.as_str()) {
            return None;
        }
        let key = self
            .key_fields
            .iter()
            .map(|field| document.get(field).cloned().unwrap_or(Value::Null))
            .collect();
        Some(Value::Array(key))
    }
}

/// Whether `source` is a reduce function that counts values.
pub(crate) fn is_count_reduce(source: &str) -> bool {
    source.trim() == COUNT_REDUCE_FUNCTION || source.trim() == "_count"
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use viewfind_core::design::map_function;

    use super::*;

    fn strings(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| (*f).to_string()).collect()
    }

    #[test]
    fn parses_generated_map_function() {
        let source = map_function("BlogPost", &strings(&["title", "name"]));
        assert_eq!(
            MapSource::parse(&source),
            Some(MapSource {
                type_name: "BlogPost".into(),
                key_fields: strings(&["title", "name"]),
            })
        );
    }

    #[test]
    fn parses_escaped_identifiers() {
        let source = map_function("Odd\"Type", &strings(&["we\"ird", "plain"]));
        let parsed = MapSource::parse(&source).unwrap();
        assert_eq!(parsed.type_name, "Odd\"Type");
        assert_eq!(parsed.key_fields, strings(&["we\"ird", "plain"]));
    }

    #[test]
    fn parses_empty_key() {
        let parsed = MapSource::parse(&map_function("Comment", &[])).unwrap();
        assert!(parsed.key_fields.is_empty());
    }

    #[test]
    fn rejects_foreign_functions() {
        assert!(MapSource::parse("function(doc) { emit(doc._id, null); }").is_none());
    }

    #[test]
    fn emit_filters_by_type_and_fills_missing_fields() {
        let source = MapSource {
            type_name: "Comment".into(),
            key_fields: strings(&["title", "name"]),
        };
        assert_eq!(
            source.emit(&json!({ "type": "Comment", "title": "abc" })),
            Some(json!(["abc", null]))
        );
        assert_eq!(source.emit(&json!({ "type": "Song", "title": "abc" })), None);
    }

    #[test]
    fn recognizes_count_reduce() {
        assert!(is_count_reduce(COUNT_REDUCE_FUNCTION));
        assert!(is_count_reduce("_count"));
        assert!(!is_count_reduce("_sum"));
    }
}
