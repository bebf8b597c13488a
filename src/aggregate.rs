use serde_json::Value;
use std::collections::HashMap;

use crate::data::{compare_values, value_to_f64, values_equal, Table};
use crate::error::{ChartError, Result};

// =============================================================================
// Registry
// =============================================================================

pub type Aggregator = Box<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Named reductions over a column of cells. The registry is a plain value
/// threaded through resolution, so embedders and tests can install their own
/// reducers instead of patching a global table.
pub struct AggregatorRegistry {
    funcs: HashMap<String, Aggregator>,
}

impl AggregatorRegistry {
    pub fn empty() -> Self {
        Self {
            funcs: HashMap::new(),
        }
    }

    /// The stock vocabulary, including the aliases chart specs use
    /// interchangeably ("avg"/"average" for mean, "stddev" for std).
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        let builtins: &[(&str, fn(&[Value]) -> Value)] = &[
            ("sum", agg_sum),
            ("mean", agg_mean),
            ("avg", agg_mean),
            ("average", agg_mean),
            ("count", agg_count),
            ("first", agg_first),
            ("last", agg_last),
            ("min", agg_min),
            ("max", agg_max),
            ("median", agg_median),
            ("mode", agg_mode),
            ("std", agg_std),
            ("stddev", agg_std),
            ("rms", agg_rms),
            ("range", agg_range),
        ];
        for (name, func) in builtins {
            reg.register(name, *func);
        }
        reg
    }

    pub fn register<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.funcs.insert(name.to_string(), Box::new(func));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn reduce(&self, name: &str, cells: &[Value]) -> Result<Value> {
        let func = self
            .funcs
            .get(name)
            .ok_or_else(|| ChartError::UnsupportedAggregationError(name.to_string()))?;
        Ok(func(cells))
    }
}

impl Default for AggregatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// =============================================================================
// Grouped reduction
// =============================================================================

/// Group `table` by `group_col` and reduce every column: directive-named
/// columns by their function, all others by `first`. One output row per
/// distinct group value, in ascending value order, so every input column
/// survives for later stages.
pub fn aggregate(
    table: &Table,
    group_col: &str,
    directives: &[(String, String)],
    registry: &AggregatorRegistry,
) -> Result<Table> {
    let keys = table.column(group_col).ok_or_else(|| {
        ChartError::ResolutionError(format!("grouping column '{}' not found", group_col))
    })?;
    for (_, func) in directives {
        if !registry.contains(func) {
            return Err(ChartError::UnsupportedAggregationError(func.clone()));
        }
    }

    let mut groups: Vec<(Value, Vec<usize>)> = Vec::new();
    for (row, key) in keys.iter().enumerate() {
        match groups.iter_mut().find(|(label, _)| values_equal(label, key)) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((key.clone(), vec![row])),
        }
    }
    groups.sort_by(|a, b| compare_values(&a.0, &b.0));

    let mut pairs = Vec::with_capacity(table.names().len());
    for name in table.names() {
        let Some(column) = table.column(name) else {
            continue;
        };
        let func = directives
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, f)| f.as_str())
            .unwrap_or("first");
        let mut cells = Vec::with_capacity(groups.len());
        for (_, rows) in &groups {
            let subset: Vec<Value> = rows.iter().map(|&r| column[r].clone()).collect();
            cells.push(registry.reduce(func, &subset)?);
        }
        pairs.push((name.clone(), cells));
    }

    Table::from_columns(pairs)
}

/// Single-directive form: reduce `target_col` by `func` within each group.
pub fn aggregate_column(
    table: &Table,
    group_col: &str,
    target_col: &str,
    func: &str,
    registry: &AggregatorRegistry,
) -> Result<Table> {
    aggregate(
        table,
        group_col,
        &[(target_col.to_string(), func.to_string())],
        registry,
    )
}

// =============================================================================
// Builtin reducers
// =============================================================================

fn numeric_cells(cells: &[Value]) -> Vec<f64> {
    cells.iter().filter_map(value_to_f64).collect()
}

/// Integral results stay integers so integer columns survive reduction.
fn number_value(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.007199254740992e15 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn agg_first(cells: &[Value]) -> Value {
    cells.first().cloned().unwrap_or(Value::Null)
}

fn agg_last(cells: &[Value]) -> Value {
    cells.last().cloned().unwrap_or(Value::Null)
}

fn agg_count(cells: &[Value]) -> Value {
    Value::from(cells.iter().filter(|v| !v.is_null()).count() as u64)
}

fn agg_sum(cells: &[Value]) -> Value {
    number_value(numeric_cells(cells).iter().sum())
}

fn agg_mean(cells: &[Value]) -> Value {
    let nums = numeric_cells(cells);
    if nums.is_empty() {
        return Value::Null;
    }
    number_value(nums.iter().sum::<f64>() / nums.len() as f64)
}

fn agg_min(cells: &[Value]) -> Value {
    cells
        .iter()
        .filter(|v| !v.is_null())
        .min_by(|a, b| compare_values(a, b))
        .cloned()
        .unwrap_or(Value::Null)
}

fn agg_max(cells: &[Value]) -> Value {
    cells
        .iter()
        .filter(|v| !v.is_null())
        .max_by(|a, b| compare_values(a, b))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Middle cell by value order; an even split of numbers interpolates,
/// anything else takes the lower middle.
fn agg_median(cells: &[Value]) -> Value {
    let mut sorted: Vec<&Value> = cells.iter().filter(|v| !v.is_null()).collect();
    if sorted.is_empty() {
        return Value::Null;
    }
    sorted.sort_by(|a, b| compare_values(a, b));
    let n = sorted.len();
    if n % 2 == 1 {
        return sorted[n / 2].clone();
    }
    let (lo, hi) = (sorted[n / 2 - 1], sorted[n / 2]);
    match (value_to_f64(lo), value_to_f64(hi)) {
        (Some(a), Some(b)) => number_value((a + b) / 2.0),
        _ => lo.clone(),
    }
}

/// Most frequent cell; ties resolve to the first encountered.
fn agg_mode(cells: &[Value]) -> Value {
    let mut seen: Vec<(&Value, usize)> = Vec::new();
    for cell in cells.iter().filter(|v| !v.is_null()) {
        match seen.iter_mut().find(|(v, _)| values_equal(v, cell)) {
            Some((_, n)) => *n += 1,
            None => seen.push((cell, 1)),
        }
    }
    let mut best: Option<(&Value, usize)> = None;
    for (v, n) in seen {
        if best.map_or(true, |(_, bn)| n > bn) {
            best = Some((v, n));
        }
    }
    best.map(|(v, _)| v.clone()).unwrap_or(Value::Null)
}

/// Sample standard deviation; null for fewer than two numeric cells.
fn agg_std(cells: &[Value]) -> Value {
    let nums = numeric_cells(cells);
    if nums.len() < 2 {
        return Value::Null;
    }
    let n = nums.len() as f64;
    let mean = nums.iter().sum::<f64>() / n;
    let var = nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    number_value(var.sqrt())
}

fn agg_rms(cells: &[Value]) -> Value {
    let nums = numeric_cells(cells);
    if nums.is_empty() {
        return Value::Null;
    }
    let n = nums.len() as f64;
    number_value((nums.iter().map(|x| x * x).sum::<f64>() / n).sqrt())
}

fn agg_range(cells: &[Value]) -> Value {
    let nums = numeric_cells(cells);
    if nums.is_empty() {
        return Value::Null;
    }
    let min = nums.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    number_value(max - min)
}
