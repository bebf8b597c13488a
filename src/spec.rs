use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ChartError, Result};

// =============================================================================
// Source-reference naming
// =============================================================================

/// Key suffix marking a column reference: "xsrc" names the column feeding "x".
pub const SOURCE_SUFFIX: &str = "src";

pub fn is_source_key(key: &str) -> bool {
    key.len() > SOURCE_SUFFIX.len() && key.ends_with(SOURCE_SUFFIX)
}

/// "xsrc" -> "x"
pub fn source_base(key: &str) -> &str {
    key.strip_suffix(SOURCE_SUFFIX).unwrap_or(key)
}

/// "x" -> "xsrc"
pub fn source_key(base: &str) -> String {
    format!("{}{}", base, SOURCE_SUFFIX)
}

/// "x" -> "x_agg": the sibling key carrying a scalar aggregation directive.
pub fn aggregation_key(base: &str) -> String {
    format!("{}_agg", base)
}

pub fn is_aggregation_key(key: &str) -> bool {
    key.len() > 4 && key.ends_with("_agg")
}

/// Some(&str) only when the option holds a non-empty string.
pub fn non_empty(opt: &Option<String>) -> Option<&str> {
    opt.as_deref().filter(|s| !s.is_empty())
}

// =============================================================================
// Specification wire types
// =============================================================================

/// A persistable chart description: traces whose data-bearing fields are
/// column references, plus a layout object. `frames` and `datasource` are
/// carried through resolution and cleaning untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChartSpec {
    #[serde(default)]
    pub data: Vec<TraceSpec>,
    #[serde(default)]
    pub layout: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
}

impl ChartSpec {
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| ChartError::ParseError(format!("malformed chart specification: {}", e)))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One trace description: a free-form attribute map holding "type", literal
/// attributes, "<field>src" references and the "transforms" array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TraceSpec(pub Map<String, Value>);

impl TraceSpec {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn chart_type(&self) -> &str {
        self.0
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("scatter")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Keys carrying column references, e.g. "xsrc", "labelssrc".
    pub fn source_keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| is_source_key(k))
            .collect()
    }

    /// The raw transforms array, verbatim from the spec.
    pub fn transforms_raw(&self) -> &[Value] {
        self.0
            .get("transforms")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Parse the transforms array element-wise. Entries that do not parse
    /// are skipped with a warning; surviving entries keep their original
    /// position in the raw array.
    pub fn transforms(&self) -> Vec<(usize, Transform)> {
        let mut parsed = Vec::new();
        for (i, entry) in self.transforms_raw().iter().enumerate() {
            match serde_json::from_value::<Transform>(entry.clone()) {
                Ok(t) => parsed.push((i, t)),
                Err(e) => log::warn!("skipping malformed transform at index {}: {}", i, e),
            }
        }
        parsed
    }
}

// =============================================================================
// Transforms
// =============================================================================

/// Per-trace transform chain entry. A cleaned spec parks filters under the
/// "filter_pending" tag; they parse identically to live filters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transform {
    #[serde(alias = "filter_pending")]
    Filter(FilterTransform),
    Aggregate(AggregateTransform),
    GroupBy(GroupByTransform),
    Sort(SortTransform),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterTransform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targetsrc: Option<String>,
    #[serde(default = "default_operation")]
    pub operation: String,
    #[serde(default = "default_filter_value")]
    pub value: Value,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateTransform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groupssrc: Option<String>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Aggregation {
    pub func: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// `groups` and `styles` only appear on resolved figures; carrying them
/// here lets a resolved figure re-parse without loss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupByTransform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groupssrc: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SortTransform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targetsrc: Option<String>,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

fn default_operation() -> String {
    "=".to_string()
}

fn default_filter_value() -> Value {
    Value::String(String::new())
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_trace(fields: Value) -> TraceSpec {
        serde_json::from_value(fields).unwrap()
    }

    #[test]
    fn test_chart_type_defaults_to_scatter() {
        let trace = make_trace(json!({"xsrc": "a"}));
        assert_eq!(trace.chart_type(), "scatter");
        let trace = make_trace(json!({"type": "bar"}));
        assert_eq!(trace.chart_type(), "bar");
    }

    #[test]
    fn test_source_key_helpers() {
        assert!(is_source_key("xsrc"));
        assert!(is_source_key("labelssrc"));
        assert!(!is_source_key("src"));
        assert!(!is_source_key("x"));
        assert_eq!(source_base("ysrc"), "y");
        assert_eq!(source_key("lat"), "latsrc");
        assert!(is_aggregation_key("y_agg"));
        assert!(!is_aggregation_key("_agg"));
    }

    #[test]
    fn test_filter_transform_defaults() {
        let t: Transform =
            serde_json::from_value(json!({"type": "filter", "targetsrc": "x"})).unwrap();
        match t {
            Transform::Filter(f) => {
                assert_eq!(f.operation, "=");
                assert_eq!(f.value, json!(""));
                assert!(f.enabled);
            }
            other => panic!("expected filter, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_pending_parses_as_filter() {
        let t: Transform = serde_json::from_value(
            json!({"type": "filter_pending", "targetsrc": "x", "operation": ">", "value": 2}),
        )
        .unwrap();
        assert!(matches!(t, Transform::Filter(_)));
    }

    #[test]
    fn test_groupby_and_sort_parse() {
        let t: Transform =
            serde_json::from_value(json!({"type": "groupby", "groupssrc": "cat"})).unwrap();
        assert!(matches!(t, Transform::GroupBy(_)));

        let t: Transform = serde_json::from_value(
            json!({"type": "sort", "targetsrc": "x", "order": "descending"}),
        )
        .unwrap();
        match t {
            Transform::Sort(s) => assert_eq!(s.order, SortOrder::Descending),
            other => panic!("expected sort, got {:?}", other),
        }
    }

    #[test]
    fn test_transforms_skip_malformed_entries() {
        let trace = make_trace(json!({
            "xsrc": "x",
            "transforms": [
                {"type": "filter", "targetsrc": "x"},
                {"type": "teleport"},
                42,
                {"type": "groupby", "groupssrc": "cat"}
            ]
        }));
        let parsed = trace.transforms();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, 0);
        assert_eq!(parsed[1].0, 3);
    }

    #[test]
    fn test_chart_spec_round_trips() {
        let value = json!({
            "data": [{"type": "bar", "xsrc": "a", "ysrc": "b"}],
            "layout": {"title": "t"},
            "datasource": "sales"
        });
        let spec = ChartSpec::from_value(&value).unwrap();
        assert_eq!(spec.data.len(), 1);
        assert_eq!(spec.datasource.as_deref(), Some("sales"));
        assert_eq!(spec.to_value(), value);
    }

    #[test]
    fn test_chart_spec_rejects_malformed_data() {
        assert!(ChartSpec::from_value(&json!({"data": 5})).is_err());
        assert!(ChartSpec::from_value(&json!({"data": [5]})).is_err());
    }
}
