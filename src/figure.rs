// Renderer-ready figure types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ChartError, Result};

/// One assembled trace: resolved data fields plus whatever spec keys the
/// schema rejected, kept apart so nothing is silently lost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrace {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub unrecognized: Map<String, Value>,
}

impl ResolvedTrace {
    pub fn new(fields: Map<String, Value>) -> Self {
        ResolvedTrace {
            fields,
            unrecognized: Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn chart_type(&self) -> &str {
        self.fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("scatter")
    }
}

/// A fully resolved figure, ready for a renderer or for the cleaner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFigure {
    #[serde(default)]
    pub data: Vec<ResolvedTrace>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub layout_unrecognized: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource: Option<String>,
}

impl ResolvedFigure {
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| ChartError::ParseError(format!("invalid figure: {}", e)))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_serializes_flat() {
        let mut fields = Map::new();
        fields.insert("type".to_string(), json!("bar"));
        fields.insert("x".to_string(), json!([1, 2]));
        let trace = ResolvedTrace::new(fields);
        assert_eq!(
            serde_json::to_value(&trace).unwrap(),
            json!({"type": "bar", "x": [1, 2]})
        );
        assert_eq!(trace.chart_type(), "bar");
    }

    #[test]
    fn test_unrecognized_bucket_round_trips() {
        let value = json!({
            "type": "scatter",
            "x": [1],
            "unrecognized": {"wibble": 7},
        });
        let trace: ResolvedTrace = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(trace.unrecognized.get("wibble"), Some(&json!(7)));
        assert!(trace.fields.get("unrecognized").is_none());
        assert_eq!(serde_json::to_value(&trace).unwrap(), value);
    }

    #[test]
    fn test_default_chart_type() {
        let trace: ResolvedTrace = serde_json::from_value(json!({"x": [1]})).unwrap();
        assert_eq!(trace.chart_type(), "scatter");
    }

    #[test]
    fn test_figure_value_round_trip() {
        let value = json!({
            "data": [{"type": "scatter", "x": [1, 2]}],
            "layout": {"title": {"text": "t"}},
        });
        let figure = ResolvedFigure::from_value(&value).unwrap();
        assert_eq!(figure.data.len(), 1);
        assert!(figure.frames.is_empty());
        assert_eq!(figure.to_value(), value);
    }

    #[test]
    fn test_figure_rejects_non_object() {
        assert!(ResolvedFigure::from_value(&json!([1, 2])).is_err());
    }
}
