// Figure assembly: derived tables + spec fields -> renderer-ready traces.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::aggregate::AggregatorRegistry;
use crate::data::{is_truthy, values_equal, Table};
use crate::error::{ChartError, Result};
use crate::figure::{ResolvedFigure, ResolvedTrace};
use crate::pipeline::{derive_tables, DerivedTable};
use crate::resolve::resolve_source_field;
use crate::schema::{axis_ref_to_key, is_axis_key, SchemaCatalog};
use crate::spec::{is_aggregation_key, is_source_key, source_base, source_key, ChartSpec, TraceSpec};

/// Resolve a chart spec against a data table using the system clock and
/// the builtin aggregators.
pub fn resolve_figure(table: &Table, spec: &ChartSpec) -> ResolvedFigure {
    resolve_figure_with(
        table,
        spec,
        &AggregatorRegistry::with_builtins(),
        chrono::Local::now().date_naive(),
    )
}

/// Fully injected form of [`resolve_figure`], for embedders and tests.
pub fn resolve_figure_with(
    table: &Table,
    spec: &ChartSpec,
    registry: &AggregatorRegistry,
    today: NaiveDate,
) -> ResolvedFigure {
    let catalog = SchemaCatalog::global();
    let mut data = Vec::new();
    if !table.names().is_empty() {
        for trace in &spec.data {
            if !catalog.supports(trace.chart_type()) {
                log::warn!(
                    "unknown chart type '{}', passing trace through unresolved",
                    trace.chart_type()
                );
                data.push(fallback_trace(trace));
                continue;
            }
            for derived in derive_tables(table, trace, registry, today) {
                match assemble_trace(&derived, trace, registry, catalog) {
                    Ok(resolved) => data.push(resolved),
                    Err(err) => {
                        log::warn!("trace assembly failed: {}", err);
                        data.push(fallback_trace(trace));
                    }
                }
            }
        }
    }
    let (layout, layout_unrecognized) = validate_layout(&spec.layout, catalog);
    ResolvedFigure {
        data,
        layout,
        layout_unrecognized,
        frames: spec.frames.clone(),
        datasource: spec.datasource.clone(),
    }
}

/// Assemble one resolved trace from one derived table.
pub fn assemble_trace(
    derived: &DerivedTable,
    trace: &TraceSpec,
    registry: &AggregatorRegistry,
    catalog: &SchemaCatalog,
) -> Result<ResolvedTrace> {
    let chart_type = trace.chart_type();
    let Some(catalog_fields) = catalog.fields(chart_type) else {
        return Err(ChartError::SchemaValidationError(format!(
            "unsupported chart type '{}'",
            chart_type
        )));
    };

    // 1. Candidate keys: catalog order first, then remaining spec keys.
    let mut candidates: Vec<String> = catalog_fields.iter().map(|f| f.to_string()).collect();
    for key in trace.keys() {
        if !candidates.iter().any(|c| c == key) {
            candidates.push(key.clone());
        }
    }

    let mut fields = Map::new();
    let mut unrecognized = Map::new();

    // 2. Resolve source references, copy literals, bucket the rest.
    for key in &candidates {
        if key == "meta" || key == "transforms" {
            continue;
        }
        let Some(value) = trace.get(key) else {
            continue;
        };
        if is_source_key(key) {
            if let Some(resolved) =
                resolve_source_field(trace, key, &derived.table, registry).into_value()
            {
                fields.insert(source_base(key).to_string(), resolved);
            }
            fields.insert(key.clone(), value.clone());
            continue;
        }
        // A literal with a source twin is stale editor state.
        if trace.get(&source_key(key)).is_some() {
            continue;
        }
        if catalog.allows(chart_type, key) {
            fields.insert(key.clone(), value.clone());
        } else {
            unrecognized.insert(key.clone(), value.clone());
        }
    }

    // 3. Fold flat container fields into their nested objects.
    for container in catalog.nested_containers(chart_type) {
        fold_container(&mut fields, container);
    }

    // 4. Retain transforms and record the group split.
    attach_transforms(&mut fields, trace, derived);
    if let Some(label) = &derived.group_label {
        let mut meta = Map::new();
        meta.insert("group".to_string(), label.clone());
        fields.insert("meta".to_string(), Value::Object(meta));
    }

    // 5. Cartesian traces anchor to the default axes when unset.
    if catalog.has_axes(chart_type) {
        fields
            .entry("xaxis")
            .or_insert_with(|| Value::String("x".to_string()));
        fields
            .entry("yaxis")
            .or_insert_with(|| Value::String("y".to_string()));
    }

    Ok(ResolvedTrace {
        fields,
        unrecognized,
    })
}

/// A trace whose type the catalog does not know passes through as
/// written, so an exotic figure degrades instead of disappearing.
fn fallback_trace(trace: &TraceSpec) -> ResolvedTrace {
    ResolvedTrace::new(trace.0.clone())
}

/// Move keys like `deltareference` under their `delta` container object.
/// Source and aggregation keys stay flat.
fn fold_container(fields: &mut Map<String, Value>, container: &str) {
    let nested: Vec<String> = fields
        .keys()
        .filter(|k| {
            k.len() > container.len()
                && k.starts_with(container)
                && !is_source_key(k)
                && !is_aggregation_key(k)
        })
        .cloned()
        .collect();
    if nested.is_empty() {
        return;
    }
    let mut object = match fields.remove(container) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for key in nested {
        if let Some(value) = fields.remove(&key) {
            object.insert(key[container.len()..].to_string(), value);
        }
    }
    fields.insert(container.to_string(), Value::Object(object));
}

/// Carry the raw transforms into the output. The splitting groupby entry
/// gains the partition's group values and a style stub per label.
fn attach_transforms(fields: &mut Map<String, Value>, trace: &TraceSpec, derived: &DerivedTable) {
    let raw = trace.transforms_raw();
    if raw.is_empty() {
        return;
    }
    let mut entries = raw.to_vec();
    if let (Some(index), Some(column)) = (derived.split_transform, derived.group_column.as_deref())
    {
        if let Some(Value::Object(entry)) = entries.get_mut(index) {
            let groups: Vec<Value> = derived
                .table
                .column(column)
                .map(|values| values.to_vec())
                .unwrap_or_default();
            let mut styles = Vec::new();
            let mut seen: Vec<Value> = Vec::new();
            for value in &groups {
                if seen.iter().any(|s| values_equal(s, value)) {
                    continue;
                }
                seen.push(value.clone());
                let mut style = Map::new();
                style.insert("target".to_string(), value.clone());
                style.insert("value".to_string(), Value::Object(Map::new()));
                styles.push(Value::Object(style));
            }
            entry.insert("groups".to_string(), Value::Array(groups));
            entry.insert("styles".to_string(), Value::Array(styles));
        }
    }
    fields.insert("transforms".to_string(), Value::Array(entries));
}

/// Partition layout keys by the layout registry, then repair axis
/// objects in the validated half.
pub fn validate_layout(
    layout: &Map<String, Value>,
    catalog: &SchemaCatalog,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut validated = Map::new();
    let mut unrecognized = Map::new();
    for (key, value) in layout {
        if catalog.layout_allows(key) {
            validated.insert(key.clone(), value.clone());
        } else {
            unrecognized.insert(key.clone(), value.clone());
        }
    }

    let axis_keys: Vec<String> = validated
        .keys()
        .filter(|k| is_axis_key(k))
        .cloned()
        .collect();
    for key in &axis_keys {
        fix_axis(&mut validated, key, &axis_keys);
    }
    (validated, unrecognized)
}

/// A falsy or dangling `overlaying` becomes "free"; a truthy `autorange`
/// drops any stale `range`.
fn fix_axis(validated: &mut Map<String, Value>, key: &str, axis_keys: &[String]) {
    let Some(Value::Object(axis)) = validated.get_mut(key) else {
        return;
    };
    if let Some(overlaying) = axis.get("overlaying") {
        let keep = match overlaying {
            Value::String(s) if !s.is_empty() => axis_ref_to_key(s)
                .map_or(false, |target| axis_keys.iter().any(|k| k == &target)),
            _ => false,
        };
        if !keep {
            axis.insert("overlaying".to_string(), Value::String("free".to_string()));
        }
    }
    if axis.get("autorange").map_or(false, is_truthy) {
        axis.remove("range");
    }
}
