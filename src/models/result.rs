//! Query result payload.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Rows returned by a query, with column names preserved in order.
///
/// The pipeline never inspects row contents; the extraction helpers exist for
/// callers and for the cache middleware's serialization path. `cacheable` is
/// the capability marker: adapters that stream or otherwise cannot replay a
/// result set clear it, and the cache middleware refuses such results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub execution_time_ms: u64,
    #[serde(default = "default_cacheable")]
    pub cacheable: bool,
}

fn default_cacheable() -> bool {
    true
}

impl QueryResult {
    /// Create an empty result.
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            execution_time_ms: 0,
            cacheable: true,
        }
    }

    /// Create a result from column names and rows.
    pub fn new(
        columns: Vec<String>,
        rows: Vec<serde_json::Map<String, JsonValue>>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms,
            cacheable: true,
        }
    }

    /// Mark this result as not serializable for caching.
    pub fn not_cacheable(mut self) -> Self {
        self.cacheable = false;
        self
    }

    /// First column of the first row, if any.
    pub fn scalar(&self) -> Option<&JsonValue> {
        let column = self.columns.first()?;
        self.rows.first()?.get(column)
    }

    /// First column of every row.
    pub fn vector(&self) -> Vec<&JsonValue> {
        let Some(column) = self.columns.first() else {
            return Vec::new();
        };
        self.rows.iter().filter_map(|row| row.get(column)).collect()
    }

    /// First row, if any.
    pub fn record(&self) -> Option<&serde_json::Map<String, JsonValue>> {
        self.rows.first()
    }

    /// Iterate over all rows.
    pub fn iter(&self) -> impl Iterator<Item = &serde_json::Map<String, JsonValue>> {
        self.rows.iter()
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> QueryResult {
        let mut row1 = serde_json::Map::new();
        row1.insert("id".to_string(), json!(1));
        row1.insert("name".to_string(), json!("alpha"));
        let mut row2 = serde_json::Map::new();
        row2.insert("id".to_string(), json!(2));
        row2.insert("name".to_string(), json!("beta"));
        QueryResult::new(
            vec!["id".to_string(), "name".to_string()],
            vec![row1, row2],
            3,
        )
    }

    #[test]
    fn test_scalar_and_vector() {
        let result = sample();
        assert_eq!(result.scalar(), Some(&json!(1)));
        assert_eq!(result.vector(), vec![&json!(1), &json!(2)]);
    }

    #[test]
    fn test_record_and_iter() {
        let result = sample();
        assert_eq!(result.record().unwrap()["name"], json!("alpha"));
        assert_eq!(result.iter().count(), 2);
        assert_eq!(result.row_count(), 2);
    }

    #[test]
    fn test_empty_result() {
        let result = QueryResult::empty();
        assert!(result.is_empty());
        assert!(result.scalar().is_none());
        assert!(result.vector().is_empty());
        assert!(result.cacheable);
    }

    #[test]
    fn test_cacheable_round_trip() {
        let result = sample().not_cacheable();
        let json = serde_json::to_string(&result).unwrap();
        let back: QueryResult = serde_json::from_str(&json).unwrap();
        assert!(!back.cacheable);
        assert_eq!(back.row_count(), 2);
    }
}
