//! View query results as returned by the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of a view result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    /// Source document id. Absent on reduced rows.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
}

/// Result of a view query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewResult {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_rows: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub rows: Vec<ViewRow>,
}

impl ViewResult {
    #[must_use]
    pub fn from_rows(rows: Vec<ViewRow>) -> Self {
        Self {
            total_rows: None,
            offset: None,
            rows,
        }
    }

    /// Row values in result order.
    pub fn into_values(self) -> impl Iterator<Item = Value> {
        self.rows.into_iter().map(|row| row.value)
    }

    /// Total of a reduced query: the single row of an ungrouped query or
    /// the sum over the rows of a grouped one. 0 when there are no rows.
    #[must_use]
    pub fn reduced_count(&self) -> u64 {
        self.rows.iter().filter_map(|row| row.value.as_u64()).sum()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_store_response() {
        let result: ViewResult = serde_json::from_value(json!({
            "total_rows": 2,
            "offset": 0,
            "rows": [
                { "id": "a", "key": ["abc"], "value": { "title": "abc" } },
                { "id": "b", "key": ["xyz"], "value": { "title": "xyz" } }
            ]
        }))
        .unwrap();
        assert_eq!(result.total_rows, Some(2));
        let titles: Vec<Value> = result.into_values().map(|v| v["title"].clone()).collect();
        assert_eq!(titles, vec![json!("abc"), json!("xyz")]);
    }

    #[test]
    fn reduced_count_reads_first_row() {
        let result: ViewResult =
            serde_json::from_value(json!({ "rows": [{ "key": null, "value": 7 }] })).unwrap();
        assert_eq!(result.reduced_count(), 7);
    }

    #[test]
    fn reduced_count_sums_grouped_rows() {
        let result: ViewResult = serde_json::from_value(json!({
            "rows": [
                { "key": ["red"], "value": 2 },
                { "key": ["blue"], "value": 3 }
            ]
        }))
        .unwrap();
        assert_eq!(result.reduced_count(), 5);
    }

    #[test]
    fn reduced_count_defaults_to_zero() {
        assert_eq!(ViewResult::default().reduced_count(), 0);
    }
}
