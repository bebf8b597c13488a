// Source-reference resolution: spec field references become data values.

use serde_json::Value;

use crate::aggregate::AggregatorRegistry;
use crate::data::Table;
use crate::spec::{aggregation_key, source_base, TraceSpec};

/// A resolved trace field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A column reference, resolved to the column's values.
    Column(Vec<Value>),
    /// A list-of-columns reference, one inner vector per named column.
    Matrix(Vec<Vec<Value>>),
    /// An aggregation directive collapsed the column to a single value.
    Scalar(Value),
    /// The reference could not be satisfied.
    Missing,
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            FieldValue::Column(values) => Some(Value::Array(values)),
            FieldValue::Matrix(columns) => Some(Value::Array(
                columns.into_iter().map(Value::Array).collect(),
            )),
            FieldValue::Scalar(value) => Some(value),
            FieldValue::Missing => None,
        }
    }
}

/// Resolve one `*src` reference against a derived table. An unresolvable
/// reference is `Missing`, never an error: the trace simply renders
/// without that field.
pub fn resolve_source_field(
    trace: &TraceSpec,
    src_key: &str,
    table: &Table,
    registry: &AggregatorRegistry,
) -> FieldValue {
    let Some(reference) = trace.get(src_key) else {
        return FieldValue::Missing;
    };
    match reference {
        Value::String(name) => resolve_column(trace, src_key, name, table, registry),
        Value::Array(items) => {
            let mut columns = Vec::with_capacity(items.len());
            for item in items {
                let Some(name) = item.as_str() else {
                    return FieldValue::Missing;
                };
                let Some(column) = table.column(name) else {
                    return FieldValue::Missing;
                };
                columns.push(column.to_vec());
            }
            FieldValue::Matrix(columns)
        }
        _ => FieldValue::Missing,
    }
}

fn resolve_column(
    trace: &TraceSpec,
    src_key: &str,
    name: &str,
    table: &Table,
    registry: &AggregatorRegistry,
) -> FieldValue {
    let Some(column) = table.column(name) else {
        return FieldValue::Missing;
    };
    let agg_key = aggregation_key(source_base(src_key));
    if let Some(func) = trace.get_str(&agg_key).filter(|f| !f.is_empty()) {
        match registry.reduce(func, column) {
            Ok(value) => return FieldValue::Scalar(value),
            Err(err) => {
                // An unknown function means no aggregation, not no field.
                log::warn!("aggregation for '{}' failed: {}", src_key, err);
            }
        }
    }
    FieldValue::Column(column.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_table() -> Table {
        Table::from_json(&json!({
            "a": [1, 2, 3],
            "b": [4.0, 5.0, 6.0],
        }))
        .unwrap()
    }

    fn make_trace(fields: serde_json::Value) -> TraceSpec {
        serde_json::from_value(fields).unwrap()
    }

    fn registry() -> AggregatorRegistry {
        AggregatorRegistry::with_builtins()
    }

    #[test]
    fn test_column_reference() {
        let table = make_table();
        let trace = make_trace(json!({"xsrc": "a"}));
        let resolved = resolve_source_field(&trace, "xsrc", &table, &registry());
        assert_eq!(
            resolved,
            FieldValue::Column(vec![json!(1), json!(2), json!(3)])
        );
        assert_eq!(resolved.into_value(), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_missing_column() {
        let table = make_table();
        let trace = make_trace(json!({"xsrc": "nope"}));
        let resolved = resolve_source_field(&trace, "xsrc", &table, &registry());
        assert!(resolved.is_missing());
        assert_eq!(resolved.into_value(), None);
    }

    #[test]
    fn test_non_string_reference() {
        let table = make_table();
        let trace = make_trace(json!({"xsrc": 7}));
        assert!(resolve_source_field(&trace, "xsrc", &table, &registry()).is_missing());
    }

    #[test]
    fn test_matrix_reference() {
        let table = make_table();
        let trace = make_trace(json!({"zsrc": ["a", "b"]}));
        let resolved = resolve_source_field(&trace, "zsrc", &table, &registry());
        assert_eq!(
            resolved.into_value(),
            Some(json!([[1, 2, 3], [4.0, 5.0, 6.0]]))
        );
    }

    #[test]
    fn test_matrix_with_missing_column() {
        let table = make_table();
        let trace = make_trace(json!({"zsrc": ["a", "nope"]}));
        assert!(resolve_source_field(&trace, "zsrc", &table, &registry()).is_missing());
    }

    #[test]
    fn test_aggregation_directive_collapses() {
        let table = make_table();
        let trace = make_trace(json!({"ysrc": "a", "y_agg": "sum"}));
        let resolved = resolve_source_field(&trace, "ysrc", &table, &registry());
        assert_eq!(resolved, FieldValue::Scalar(json!(6)));
    }

    #[test]
    fn test_unknown_aggregation_passes_column_through() {
        let table = make_table();
        let trace = make_trace(json!({"ysrc": "a", "y_agg": "wibble"}));
        let resolved = resolve_source_field(&trace, "ysrc", &table, &registry());
        assert_eq!(
            resolved,
            FieldValue::Column(vec![json!(1), json!(2), json!(3)])
        );
    }

    #[test]
    fn test_empty_aggregation_is_plain_column() {
        let table = make_table();
        let trace = make_trace(json!({"ysrc": "a", "y_agg": ""}));
        let resolved = resolve_source_field(&trace, "ysrc", &table, &registry());
        assert!(matches!(resolved, FieldValue::Column(_)));
    }
}
