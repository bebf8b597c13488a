use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::{ChartError, Result};

/// Column-major table of JSON scalars. Every column has the same length.
///
/// Pipeline stages never mutate a table in place; each derivation returns a
/// fresh value so partial failures can fall back to the input unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Value>>,
}

impl Table {
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Build from (name, cells) pairs, validating equal column lengths.
    pub fn from_columns(pairs: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let mut names = Vec::with_capacity(pairs.len());
        let mut columns = Vec::with_capacity(pairs.len());
        let mut expected: Option<usize> = None;
        for (name, cells) in pairs {
            match expected {
                None => expected = Some(cells.len()),
                Some(n) if n != cells.len() => {
                    return Err(ChartError::DataError(format!(
                        "column '{}' has {} rows, expected {}",
                        name,
                        cells.len(),
                        n
                    )));
                }
                Some(_) => {}
            }
            names.push(name);
            columns.push(cells);
        }
        Ok(Self { names, columns })
    }

    /// Build from a JSON object mapping column name to an array of cells.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ChartError::DataError("data source must be a JSON object of columns".to_string())
        })?;

        let mut pairs = Vec::with_capacity(obj.len());
        for (name, cells) in obj {
            let array = cells.as_array().ok_or_else(|| {
                ChartError::DataError(format!("column '{}' must be a JSON array", name))
            })?;
            pairs.push((name.clone(), array.clone()));
        }
        Table::from_columns(pairs)
    }

    /// Build from a JSON array of row objects. Column order follows first
    /// appearance; cells absent from a row become null.
    pub fn from_records(value: &Value) -> Result<Self> {
        let array = value.as_array().ok_or_else(|| {
            ChartError::DataError("record data must be a JSON array of objects".to_string())
        })?;

        let mut records: Vec<&Map<String, Value>> = Vec::with_capacity(array.len());
        for item in array {
            let obj = item.as_object().ok_or_else(|| {
                ChartError::DataError("record data items must be objects".to_string())
            })?;
            records.push(obj);
        }

        let mut names: Vec<String> = Vec::new();
        for obj in &records {
            for key in obj.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }

        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(records.len()); names.len()];
        for obj in &records {
            for (i, name) in names.iter().enumerate() {
                columns[i].push(obj.get(name).cloned().unwrap_or(Value::Null));
            }
        }

        Ok(Self { names, columns })
    }

    /// Read CSV with a header row, inferring integers, floats and booleans.
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let names: Vec<String> = rdr
            .headers()
            .map_err(|e| ChartError::DataError(format!("failed to read CSV headers: {}", e)))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        for record in rdr.records() {
            let record = record
                .map_err(|e| ChartError::DataError(format!("failed to read CSV record: {}", e)))?;
            for (i, field) in record.iter().enumerate() {
                if i < columns.len() {
                    columns[i].push(infer_cell(field));
                }
            }
        }

        Ok(Self { names, columns })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_index(name).map(|i| self.columns[i].as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Keep the listed columns (those that exist), in the listed order.
    pub fn select(&self, keep: &[String]) -> Table {
        let mut names = Vec::new();
        let mut columns = Vec::new();
        for name in keep {
            if let Some(i) = self.column_index(name) {
                if !names.contains(name) {
                    names.push(name.clone());
                    columns.push(self.columns[i].clone());
                }
            }
        }
        Table { names, columns }
    }

    /// Keep the rows whose mask entry is true. The mask length must match
    /// the row count; extra rows are dropped.
    pub fn retain_rows(&self, mask: &[bool]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|col| {
                col.iter()
                    .zip(mask.iter())
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| v.clone())
                    .collect()
            })
            .collect();
        Table {
            names: self.names.clone(),
            columns,
        }
    }

    /// Same columns, zero rows.
    pub fn empty_like(&self) -> Table {
        Table {
            names: self.names.clone(),
            columns: vec![Vec::new(); self.columns.len()],
        }
    }

    /// Copy with every null cell replaced.
    pub fn filled(&self, replacement: &Value) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|col| {
                col.iter()
                    .map(|v| {
                        if v.is_null() {
                            replacement.clone()
                        } else {
                            v.clone()
                        }
                    })
                    .collect()
            })
            .collect();
        Table {
            names: self.names.clone(),
            columns,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (name, col) in self.names.iter().zip(self.columns.iter()) {
            obj.insert(name.clone(), Value::Array(col.clone()));
        }
        Value::Object(obj)
    }
}

/// Interpret a raw CSV field as the narrowest JSON scalar it parses to.
fn infer_cell(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = field.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match field {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(field.to_string()),
    }
}

// =============================================================================
// Value ordering and coercion
// =============================================================================

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total deterministic order across JSON value kinds:
/// null < booleans < numbers < strings < arrays < objects.
/// Numbers compare numerically; composites by their compact JSON form.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = kind_rank(a).cmp(&kind_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let fx = x.as_f64().unwrap_or(f64::NAN);
            let fy = y.as_f64().unwrap_or(f64::NAN);
            fx.total_cmp(&fy)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Numeric view of a cell: numbers only, no string parsing.
pub fn value_to_f64(v: &Value) -> Option<f64> {
    v.as_f64()
}

/// Numeric coercion used when a filter value meets a numeric column:
/// numbers pass through, strings are parsed.
pub fn coerce_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Display form of a cell: strings unwrapped, null empty, others compact JSON.
pub fn value_to_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose truthiness: null, false, zero, and empty containers are falsy.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_table() -> Table {
        Table::from_columns(vec![
            ("x".to_string(), vec![json!(1), json!(2), json!(3)]),
            ("y".to_string(), vec![json!(10.0), json!(20.0), json!(30.0)]),
            (
                "cat".to_string(),
                vec![json!("a"), json!("b"), json!("a")],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_json_columns() {
        let table = Table::from_json(&json!({"x": [1, 2], "y": ["a", "b"]})).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("x").unwrap(), &[json!(1), json!(2)]);
    }

    #[test]
    fn test_from_json_rejects_unequal_lengths() {
        let res = Table::from_json(&json!({"x": [1, 2], "y": [1]}));
        assert!(res.is_err());
    }

    #[test]
    fn test_from_json_rejects_non_array_column() {
        let res = Table::from_json(&json!({"x": 5}));
        assert!(res.is_err());
    }

    #[test]
    fn test_from_records_unions_keys() {
        let table =
            Table::from_records(&json!([{"a": 1, "b": 2}, {"b": 3, "c": 4}])).unwrap();
        assert_eq!(table.names(), &["a", "b", "c"]);
        assert_eq!(table.column("a").unwrap(), &[json!(1), Value::Null]);
        assert_eq!(table.column("c").unwrap(), &[Value::Null, json!(4)]);
    }

    #[test]
    fn test_from_csv_infers_types() {
        let csv = "x,y,flag\n1,2.5,true\n2,,oops\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.column("x").unwrap(), &[json!(1), json!(2)]);
        assert_eq!(table.column("y").unwrap(), &[json!(2.5), Value::Null]);
        assert_eq!(
            table.column("flag").unwrap(),
            &[json!(true), json!("oops")]
        );
    }

    #[test]
    fn test_select_keeps_listed_order() {
        let table = make_table();
        let selected = table.select(&["cat".to_string(), "x".to_string(), "nope".to_string()]);
        assert_eq!(selected.names(), &["cat", "x"]);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_retain_rows() {
        let table = make_table();
        let kept = table.retain_rows(&[true, false, true]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.column("x").unwrap(), &[json!(1), json!(3)]);
    }

    #[test]
    fn test_empty_like_keeps_columns() {
        let table = make_table();
        let empty = table.empty_like();
        assert_eq!(empty.names(), table.names());
        assert_eq!(empty.len(), 0);
    }

    #[test]
    fn test_filled_replaces_nulls() {
        let table = Table::from_columns(vec![(
            "x".to_string(),
            vec![json!(1), Value::Null],
        )])
        .unwrap();
        let filled = table.filled(&json!(""));
        assert_eq!(filled.column("x").unwrap(), &[json!(1), json!("")]);
    }

    #[test]
    fn test_to_json_exports_columns() {
        let json = make_table().to_json();
        assert_eq!(json["x"], json!([1, 2, 3]));
        assert_eq!(json["cat"], json!(["a", "b", "a"]));
        let back = Table::from_json(&json).unwrap();
        assert_eq!(back.column("y"), make_table().column("y"));
    }

    #[test]
    fn test_compare_values_orders_kinds() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!("1")), Ordering::Less);
        assert_eq!(compare_values(&json!("a"), &json!("b")), Ordering::Less);
        assert_eq!(compare_values(&json!(1.5), &json!(1.5)), Ordering::Equal);
    }

    #[test]
    fn test_coerce_to_f64_parses_strings() {
        assert_eq!(coerce_to_f64(&json!("2.5")), Some(2.5));
        assert_eq!(coerce_to_f64(&json!(3)), Some(3.0));
        assert_eq!(coerce_to_f64(&json!("abc")), None);
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("reversed")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!([0])));
    }
}
