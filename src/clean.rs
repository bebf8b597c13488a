// Figure cleaning: the inverse of resolution, recovering an editable spec.

use serde_json::{Map, Value};

use crate::data::is_truthy;
use crate::error::Result;
use crate::figure::{ResolvedFigure, ResolvedTrace};
use crate::schema::is_axis_key;
use crate::spec::{ChartSpec, TraceSpec};

/// Data keys written by resolution. Cleaning strips them so only the
/// declarative editor state remains.
const RESOLVED_KEYS: &[&str] = &[
    "x", "y", "z", "values", "meta", "labels", "locations", "lat", "lon", "open", "close", "low",
    "high", "target", "groups", "styles",
];

/// Indicator traces resolve through single-value references the editor
/// re-derives on load, so those go too, along with the computed
/// containers.
const INDICATOR_KEYS: &[&str] = &[
    "valuesrc", "value", "deltasrc", "deltareferencesrc", "gaugesrc", "gaugevaluesrc", "delta",
    "gauge",
];

/// Recover the declarative spec behind a resolved figure.
pub fn clean_figure(figure: &ResolvedFigure) -> ChartSpec {
    let mut data: Vec<TraceSpec> = Vec::new();
    for trace in &figure.data {
        let cleaned = clean_trace(trace);
        // A group split fans one spec trace into several resolved ones;
        // collapsing consecutive duplicates undoes it.
        if data.last() == Some(&cleaned) {
            continue;
        }
        data.push(cleaned);
    }
    ChartSpec {
        data,
        layout: clean_layout(&figure.layout),
        frames: figure.frames.clone(),
        datasource: figure.datasource.clone(),
    }
}

/// Value-level form for callers holding raw JSON.
pub fn clean_value(value: &Value) -> Result<Value> {
    let figure = ResolvedFigure::from_value(value)?;
    Ok(clean_figure(&figure).to_value())
}

fn clean_trace(trace: &ResolvedTrace) -> TraceSpec {
    let mut fields = trace.fields.clone();
    for key in RESOLVED_KEYS {
        fields.remove(*key);
    }
    if trace.chart_type() == "indicator" {
        for key in INDICATOR_KEYS {
            fields.remove(*key);
        }
    }
    if let Some(Value::Array(entries)) = fields.get_mut("transforms") {
        for entry in entries {
            clean_transform(entry);
        }
    }
    TraceSpec::new(fields)
}

fn clean_transform(entry: &mut Value) {
    let Value::Object(map) = entry else {
        return;
    };
    for key in RESOLVED_KEYS {
        map.remove(*key);
    }
    if map.get("type").and_then(Value::as_str) == Some("filter") {
        map.insert(
            "type".to_string(),
            Value::String("filter_pending".to_string()),
        );
    }
}

fn clean_layout(layout: &Map<String, Value>) -> Map<String, Value> {
    let mut cleaned = layout.clone();
    let axis_keys: Vec<String> = cleaned.keys().filter(|k| is_axis_key(k)).cloned().collect();
    for key in axis_keys {
        if let Some(Value::Object(axis)) = cleaned.get_mut(&key) {
            if axis.get("autorange").map_or(false, is_truthy) {
                axis.remove("range");
            }
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_figure(value: serde_json::Value) -> ResolvedFigure {
        ResolvedFigure::from_value(&value).unwrap()
    }

    #[test]
    fn test_strips_resolved_fields() {
        let figure = make_figure(json!({
            "data": [{
                "type": "scatter",
                "x": [1, 2],
                "y": [3, 4],
                "xsrc": "a",
                "ysrc": "b",
                "mode": "lines",
                "meta": {"group": "g1"},
                "unrecognized": {"foo": 1},
            }],
        }));
        let spec = clean_figure(&figure);
        assert_eq!(spec.data.len(), 1);
        assert_eq!(
            spec.data[0],
            serde_json::from_value(json!({
                "type": "scatter",
                "xsrc": "a",
                "ysrc": "b",
                "mode": "lines",
            }))
            .unwrap()
        );
    }

    #[test]
    fn test_filter_renamed_pending() {
        let figure = make_figure(json!({
            "data": [{
                "type": "scatter",
                "xsrc": "a",
                "transforms": [
                    {"type": "filter", "targetsrc": "a", "operation": ">", "value": 3},
                    {"type": "groupby", "groupssrc": "g", "groups": ["p"], "styles": []},
                ],
            }],
        }));
        let spec = clean_figure(&figure);
        let transforms = spec.data[0].transforms_raw();
        assert_eq!(
            transforms[0],
            json!({"type": "filter_pending", "targetsrc": "a", "operation": ">", "value": 3})
        );
        assert_eq!(transforms[1], json!({"type": "groupby", "groupssrc": "g"}));
    }

    #[test]
    fn test_split_traces_collapse() {
        let figure = make_figure(json!({
            "data": [
                {
                    "type": "scatter",
                    "xsrc": "x",
                    "x": [1, 2],
                    "meta": {"group": "a"},
                    "transforms": [{"type": "groupby", "groupssrc": "g", "groups": ["a", "a"], "styles": [{"target": "a", "value": {}}]}],
                },
                {
                    "type": "scatter",
                    "xsrc": "x",
                    "x": [3],
                    "meta": {"group": "b"},
                    "transforms": [{"type": "groupby", "groupssrc": "g", "groups": ["b"], "styles": [{"target": "b", "value": {}}]}],
                },
            ],
        }));
        let spec = clean_figure(&figure);
        assert_eq!(spec.data.len(), 1);
        assert_eq!(
            spec.data[0].transforms_raw()[0],
            json!({"type": "groupby", "groupssrc": "g"})
        );
    }

    #[test]
    fn test_non_adjacent_traces_kept() {
        let figure = make_figure(json!({
            "data": [
                {"type": "scatter", "xsrc": "a"},
                {"type": "scatter", "xsrc": "b"},
                {"type": "scatter", "xsrc": "a"},
            ],
        }));
        let spec = clean_figure(&figure);
        assert_eq!(spec.data.len(), 3);
    }

    #[test]
    fn test_indicator_strips_references() {
        let figure = make_figure(json!({
            "data": [{
                "type": "indicator",
                "value": 15,
                "valuesrc": "x",
                "value_agg": "sum",
                "delta": {"reference": 30},
                "deltareferencesrc": "y",
                "mode": "number",
            }],
        }));
        let spec = clean_figure(&figure);
        assert_eq!(
            spec.data[0],
            serde_json::from_value(json!({
                "type": "indicator",
                "value_agg": "sum",
                "mode": "number",
            }))
            .unwrap()
        );
    }

    #[test]
    fn test_layout_autorange_drops_range() {
        let figure = make_figure(json!({
            "data": [],
            "layout": {
                "xaxis": {"autorange": true, "range": [0, 1]},
                "yaxis": {"range": [0, 1]},
                "title": "t",
            },
            "layout_unrecognized": {"wibble": 1},
        }));
        let spec = clean_figure(&figure);
        assert_eq!(spec.layout["xaxis"], json!({"autorange": true}));
        assert_eq!(spec.layout["yaxis"], json!({"range": [0, 1]}));
        // The auxiliary bucket never comes back.
        assert!(spec.layout.get("wibble").is_none());
    }

    #[test]
    fn test_frames_and_datasource_pass_through() {
        let figure = make_figure(json!({
            "data": [],
            "frames": [{"name": "f0"}],
            "datasource": "sales.csv",
        }));
        let spec = clean_figure(&figure);
        assert_eq!(spec.frames, vec![json!({"name": "f0"})]);
        assert_eq!(spec.datasource.as_deref(), Some("sales.csv"));
    }

    #[test]
    fn test_clean_value_rejects_garbage() {
        assert!(clean_value(&json!("nope")).is_err());
    }
}
