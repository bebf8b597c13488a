// Per-trace transform pipeline: restrict, filter, split, order, aggregate.

use chrono::NaiveDate;
use serde_json::Value;

use crate::aggregate::{aggregate, AggregatorRegistry};
use crate::data::{compare_values, values_equal, Table};
use crate::filter::apply_filter;
use crate::schema::SchemaCatalog;
use crate::spec::{non_empty, AggregateTransform, SortOrder, TraceSpec, Transform};

/// One table feeding one rendered trace. A groupby split yields several,
/// each labelled with its group value; otherwise there is exactly one,
/// unlabelled.
#[derive(Debug, Clone)]
pub struct DerivedTable {
    pub table: Table,
    pub group_column: Option<String>,
    pub group_label: Option<Value>,
    /// Index into the trace's raw transforms array of the stage that
    /// produced the split, if any.
    pub split_transform: Option<usize>,
}

/// Run a trace's transform stages against the source table.
pub fn derive_tables(
    source: &Table,
    trace: &TraceSpec,
    registry: &AggregatorRegistry,
    today: NaiveDate,
) -> Vec<DerivedTable> {
    let transforms = trace.transforms();

    // 1. Work on just the columns the trace references.
    let mut work = source.select(&referenced_columns(trace, &transforms));

    // 2. Filters, in listed order, on the whole table.
    for (_, transform) in &transforms {
        if let Transform::Filter(filter) = transform {
            work = apply_filter(&work, filter, today);
        }
    }

    // 3. One split at most: the first enabled groupby wins.
    let split = split_stage(&transforms, &work);
    let mut derived = match &split {
        Some((index, column)) => partition(&work, column)
            .into_iter()
            .map(|(label, table)| DerivedTable {
                table,
                group_column: Some(column.clone()),
                group_label: Some(label),
                split_transform: Some(*index),
            })
            .collect(),
        None => vec![DerivedTable {
            table: work,
            group_column: None,
            group_label: None,
            split_transform: None,
        }],
    };

    // 4. Sorts order the group labels, never the rows. Last enabled wins.
    if let Some(order) = label_order(&transforms) {
        derived.sort_by(|a, b| {
            let ord = match (&a.group_label, &b.group_label) {
                (Some(a), Some(b)) => compare_values(a, b),
                _ => std::cmp::Ordering::Equal,
            };
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
    }

    // 5. Aggregations run per partition.
    for (_, transform) in &transforms {
        if let Transform::Aggregate(stage) = transform {
            if !stage.enabled {
                continue;
            }
            for part in &mut derived {
                part.table = run_aggregate(&part.table, stage, trace, registry);
            }
        }
    }

    derived
}

/// Every column name the trace can touch: source references (including
/// list-valued ones) plus transform targets and grouping columns.
fn referenced_columns(trace: &TraceSpec, transforms: &[(usize, Transform)]) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    let mut push = |cols: &mut Vec<String>, name: &str| {
        if !name.is_empty() && !cols.iter().any(|c| c == name) {
            cols.push(name.to_string());
        }
    };

    for key in trace.source_keys() {
        match trace.get(key) {
            Some(Value::String(name)) => push(&mut cols, name),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Some(name) = item.as_str() {
                        push(&mut cols, name);
                    }
                }
            }
            _ => {}
        }
    }
    for (_, transform) in transforms {
        let target = match transform {
            Transform::Filter(f) => non_empty(&f.targetsrc),
            Transform::GroupBy(g) => non_empty(&g.groupssrc),
            Transform::Sort(s) => non_empty(&s.targetsrc),
            Transform::Aggregate(a) => non_empty(&a.groupssrc),
        };
        if let Some(name) = target {
            push(&mut cols, name);
        }
    }
    cols
}

/// Locate the splitting groupby. Only the first enabled stage with a
/// grouping column is considered; later ones are ignored.
fn split_stage(transforms: &[(usize, Transform)], table: &Table) -> Option<(usize, String)> {
    let mut chosen: Option<(usize, String)> = None;
    let mut seen = false;
    for (index, transform) in transforms {
        let Transform::GroupBy(group) = transform else {
            continue;
        };
        if !group.enabled {
            continue;
        }
        let Some(column) = non_empty(&group.groupssrc) else {
            continue;
        };
        if seen {
            log::warn!("ignoring extra groupby on '{}': a trace splits at most once", column);
            continue;
        }
        seen = true;
        if table.has_column(column) {
            chosen = Some((*index, column.to_string()));
        } else {
            log::warn!("groupby column '{}' not in data, skipping split", column);
        }
    }
    chosen
}

/// Partition rows by distinct group value, in first-appearance order.
/// Every row lands in exactly one partition.
fn partition(table: &Table, column: &str) -> Vec<(Value, Table)> {
    let Some(values) = table.column(column) else {
        return Vec::new();
    };
    let values = values.to_vec();
    let mut labels: Vec<Value> = Vec::new();
    for value in &values {
        if !labels.iter().any(|label| values_equal(label, value)) {
            labels.push(value.clone());
        }
    }
    labels
        .into_iter()
        .map(|label| {
            let mask: Vec<bool> = values.iter().map(|v| values_equal(v, &label)).collect();
            let part = table.retain_rows(&mask);
            (label, part)
        })
        .collect()
}

fn label_order(transforms: &[(usize, Transform)]) -> Option<SortOrder> {
    let mut order = None;
    for (_, transform) in transforms {
        if let Transform::Sort(sort) = transform {
            if sort.enabled {
                order = Some(sort.order);
            }
        }
    }
    order
}

/// Apply one aggregate stage. Groups by the stage's own column or, when
/// none is set, the trace's primary x source. Unsupported functions fall
/// back to `first` so one bad directive cannot blank a trace.
fn run_aggregate(
    table: &Table,
    stage: &AggregateTransform,
    trace: &TraceSpec,
    registry: &AggregatorRegistry,
) -> Table {
    let (x_key, _) = SchemaCatalog::global().primary_sources(trace);
    let group_col = non_empty(&stage.groupssrc)
        .or_else(|| trace.get_str(x_key).filter(|s| !s.is_empty()));
    let Some(group_col) = group_col else {
        log::warn!("aggregate stage has no grouping column, skipping");
        return table.clone();
    };
    if !table.has_column(group_col) {
        log::warn!("aggregate grouping column '{}' not in data, skipping", group_col);
        return table.clone();
    }

    let mut directives: Vec<(String, String)> = Vec::new();
    for entry in &stage.aggregations {
        if !entry.enabled {
            continue;
        }
        let Some(target) = non_empty(&entry.target) else {
            continue;
        };
        let func = if registry.contains(&entry.func) {
            entry.func.clone()
        } else {
            log::warn!(
                "unsupported aggregation '{}' on '{}', falling back to first",
                entry.func,
                target
            );
            "first".to_string()
        };
        directives.push((target.to_string(), func));
    }

    match aggregate(table, group_col, &directives, registry) {
        Ok(reduced) => reduced,
        Err(err) => {
            log::warn!("aggregate on '{}' failed: {}", group_col, err);
            table.clone()
        }
    }
}
