use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

/// String form of a cell: strings verbatim, everything else as JSON text.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rows whose `column` reads as `value`, in their original order.
///
/// An empty column or value resets to the full list. Rows without the
/// column never match.
pub fn filter_rows(rows: &[Row], column: &str, value: &str) -> Vec<Row> {
    if column.is_empty() || value.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| row.get(column).map(cell_text).as_deref() == Some(value))
        .cloned()
        .collect()
}

/// Distinct values of `column` in first-seen order.
pub fn distinct_values(rows: &[Row], column: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column).map(cell_text))
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Value) -> Vec<Row> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_filter_keeps_order() {
        let data = rows(json!([{"c": "a", "i": 1}, {"c": "b", "i": 2}, {"c": "a", "i": 3}]));
        let out = filter_rows(&data, "c", "a");
        assert_eq!(out, vec![data[0].clone(), data[2].clone()]);
    }

    #[test]
    fn test_empty_value_or_column_resets() {
        let data = rows(json!([{"c": "a"}, {"c": "b"}, {"c": "a"}]));
        assert_eq!(filter_rows(&data, "c", ""), data);
        assert_eq!(filter_rows(&data, "", "a"), data);
    }

    #[test]
    fn test_numbers_bools_null_compare_as_text() {
        let data = rows(json!([{"n": 5}, {"n": 5.5}, {"n": true}, {"n": null}, {}]));
        assert_eq!(filter_rows(&data, "n", "5").len(), 1);
        assert_eq!(filter_rows(&data, "n", "5.5").len(), 1);
        assert_eq!(filter_rows(&data, "n", "true").len(), 1);
        assert_eq!(filter_rows(&data, "n", "null").len(), 1);
    }

    #[test]
    fn test_unknown_column_matches_nothing() {
        let data = rows(json!([{"c": "a"}]));
        assert!(filter_rows(&data, "missing", "a").is_empty());
    }

    #[test]
    fn test_distinct_values() {
        let data = rows(json!([{"c": "b"}, {"c": "a"}, {"c": "b"}, {"x": 1}]));
        assert_eq!(distinct_values(&data, "c"), vec!["b", "a"]);
    }
}
