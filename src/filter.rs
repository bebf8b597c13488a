use chrono::NaiveDate;
use serde_json::Value;
use std::cmp::Ordering;

use crate::data::{coerce_to_f64, compare_values, value_to_f64, value_to_string, Table};
use crate::dates::{is_date_token, resolve_date_token};
use crate::error::{ChartError, Result};
use crate::spec::{non_empty, FilterTransform};

// =============================================================================
// Operator vocabulary
// =============================================================================

/// Filter operators. `parse` returns None for anything else, which callers
/// treat as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Compare(CompareOp),
    /// Keep rows between the two bounds; flags mark inclusive ends.
    Within { lo: bool, hi: bool },
    /// Keep exactly the rows the mirrored Within rejects.
    Outside { lo: bool, hi: bool },
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Ge,
    Le,
    Gt,
    Lt,
    Ne,
    Eq,
}

impl FilterOp {
    pub fn parse(op: &str) -> Option<FilterOp> {
        match op {
            ">=" => Some(FilterOp::Compare(CompareOp::Ge)),
            "<=" => Some(FilterOp::Compare(CompareOp::Le)),
            ">" => Some(FilterOp::Compare(CompareOp::Gt)),
            "<" => Some(FilterOp::Compare(CompareOp::Lt)),
            "!=" => Some(FilterOp::Compare(CompareOp::Ne)),
            "=" => Some(FilterOp::Compare(CompareOp::Eq)),
            "[]" => Some(FilterOp::Within { lo: true, hi: true }),
            "()" => Some(FilterOp::Within { lo: false, hi: false }),
            "[)" => Some(FilterOp::Within { lo: true, hi: false }),
            "(]" => Some(FilterOp::Within { lo: false, hi: true }),
            "][" => Some(FilterOp::Outside { lo: true, hi: true }),
            ")(" => Some(FilterOp::Outside { lo: false, hi: false }),
            "](" => Some(FilterOp::Outside { lo: false, hi: true }),
            ")[" => Some(FilterOp::Outside { lo: true, hi: false }),
            "{}" => Some(FilterOp::In),
            "}{" => Some(FilterOp::NotIn),
            _ => None,
        }
    }
}

impl CompareOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Eq => ord == Ordering::Equal,
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Execute one filter transform. Failures degrade rather than propagate:
/// disabled transforms, missing targets and unknown operators leave the rows
/// unchanged; a missing column, an uncoercible value or a bad date token
/// drops every row, keeping the columns.
///
/// Null cells are treated as empty strings before matching, and survive the
/// filter in that form.
pub fn apply_filter(table: &Table, filter: &FilterTransform, today: NaiveDate) -> Table {
    if !filter.enabled {
        return table.clone();
    }
    let Some(target) = non_empty(&filter.targetsrc) else {
        return table.clone();
    };
    if !table.has_column(target) {
        log::warn!(
            "filter target column '{}' not found, dropping all rows",
            target
        );
        return table.empty_like();
    }

    let work = table.filled(&Value::String(String::new()));
    let Some(op) = FilterOp::parse(&filter.operation) else {
        log::warn!(
            "unknown filter operation '{}', leaving rows unchanged",
            filter.operation
        );
        return work;
    };

    match build_mask(&work, target, op, &filter.value, today) {
        Ok(mask) => work.retain_rows(&mask),
        Err(e) => {
            log::warn!("filter on '{}' failed ({}), dropping all rows", target, e);
            table.empty_like()
        }
    }
}

fn build_mask(
    table: &Table,
    target: &str,
    op: FilterOp,
    value: &Value,
    today: NaiveDate,
) -> Result<Vec<bool>> {
    let column = table.column(target).ok_or_else(|| {
        ChartError::ResolutionError(format!("column '{}' disappeared during filtering", target))
    })?;
    match op {
        FilterOp::Compare(cmp) => compare_mask(table, column, cmp, value, today),
        FilterOp::Within { lo, hi } => range_mask(column, lo, hi, false, value, today),
        FilterOp::Outside { lo, hi } => range_mask(column, lo, hi, true, value, today),
        FilterOp::In => membership_mask(column, value, false),
        FilterOp::NotIn => membership_mask(column, value, true),
    }
}

fn compare_mask(
    table: &Table,
    column: &[Value],
    cmp: CompareOp,
    value: &Value,
    today: NaiveDate,
) -> Result<Vec<bool>> {
    if let Value::String(s) = value {
        // A value naming another column compares element-wise against it
        if let Some(other) = table.column(s) {
            return Ok(column
                .iter()
                .zip(other.iter())
                .map(|(a, b)| cmp.holds(compare_values(a, b)))
                .collect());
        }
        if is_date_token(s) {
            let rhs = resolve_date_token(s, today)?;
            return Ok(column
                .iter()
                .map(|cell| match parse_cell_date(cell) {
                    Some(d) => cmp.holds(d.cmp(&rhs)),
                    None => false,
                })
                .collect());
        }
    }

    if is_numeric_column(column) {
        let rhs = coerce_to_f64(value).ok_or_else(|| {
            ChartError::ResolutionError(format!(
                "cannot compare numeric column to '{}'",
                value_to_string(value)
            ))
        })?;
        return Ok(column
            .iter()
            .map(|cell| match value_to_f64(cell) {
                Some(f) => cmp.holds(f.total_cmp(&rhs)),
                None => false,
            })
            .collect());
    }

    Ok(column
        .iter()
        .map(|cell| cmp.holds(compare_values(cell, value)))
        .collect())
}

fn range_mask(
    column: &[Value],
    lo_incl: bool,
    hi_incl: bool,
    negate: bool,
    value: &Value,
    today: NaiveDate,
) -> Result<Vec<bool>> {
    let (v1, v2) = range_bounds(value)?;

    let date_mode = [&v1, &v2]
        .iter()
        .any(|v| v.as_str().map_or(false, is_date_token));
    if date_mode {
        let lo = endpoint_date(&v1, today)?;
        let hi = endpoint_date(&v2, today)?;
        return Ok(column
            .iter()
            .map(|cell| match parse_cell_date(cell) {
                Some(d) => in_range(d.cmp(&lo), d.cmp(&hi), lo_incl, hi_incl) != negate,
                None => false,
            })
            .collect());
    }

    if is_numeric_column(column) {
        let lo = coerce_to_f64(&v1).ok_or_else(|| range_endpoint_error(&v1))?;
        let hi = coerce_to_f64(&v2).ok_or_else(|| range_endpoint_error(&v2))?;
        return Ok(column
            .iter()
            .map(|cell| match value_to_f64(cell) {
                Some(f) => in_range(f.total_cmp(&lo), f.total_cmp(&hi), lo_incl, hi_incl) != negate,
                None => false,
            })
            .collect());
    }

    Ok(column
        .iter()
        .map(|cell| {
            in_range(
                compare_values(cell, &v1),
                compare_values(cell, &v2),
                lo_incl,
                hi_incl,
            ) != negate
        })
        .collect())
}

fn membership_mask(column: &[Value], value: &Value, negate: bool) -> Result<Vec<bool>> {
    let members: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };

    if is_numeric_column(column) {
        let mut parsed = Vec::with_capacity(members.len());
        for m in &members {
            parsed.push(coerce_to_f64(m).ok_or_else(|| {
                ChartError::ResolutionError(format!(
                    "cannot match numeric column against '{}'",
                    value_to_string(m)
                ))
            })?);
        }
        return Ok(column
            .iter()
            .map(|cell| {
                let hit = value_to_f64(cell)
                    .map_or(false, |f| parsed.iter().any(|m| f.total_cmp(m) == Ordering::Equal));
                hit != negate
            })
            .collect());
    }

    Ok(column
        .iter()
        .map(|cell| {
            let hit = members
                .iter()
                .any(|m| compare_values(cell, m) == Ordering::Equal);
            hit != negate
        })
        .collect())
}

/// Bounds of a range filter value: a two-element list, or one element used
/// for both ends.
fn range_bounds(value: &Value) -> Result<(Value, Value)> {
    match value {
        Value::Array(items) => match items.as_slice() {
            [] => Err(ChartError::ResolutionError(
                "range filter needs at least one bound".to_string(),
            )),
            [only] => Ok((only.clone(), only.clone())),
            [lo, hi, ..] => Ok((lo.clone(), hi.clone())),
        },
        other => Ok((other.clone(), other.clone())),
    }
}

fn in_range(ord_lo: Ordering, ord_hi: Ordering, lo_incl: bool, hi_incl: bool) -> bool {
    let above = ord_lo == Ordering::Greater || (lo_incl && ord_lo == Ordering::Equal);
    let below = ord_hi == Ordering::Less || (hi_incl && ord_hi == Ordering::Equal);
    above && below
}

fn range_endpoint_error(v: &Value) -> ChartError {
    ChartError::ResolutionError(format!(
        "cannot interpret range bound '{}' as a number",
        value_to_string(v)
    ))
}

/// A range or comparison endpoint in date mode: a symbolic token or a
/// literal date string.
fn endpoint_date(v: &Value, today: NaiveDate) -> Result<NaiveDate> {
    if let Value::String(s) = v {
        if is_date_token(s) {
            return resolve_date_token(s, today);
        }
    }
    parse_cell_date(v).ok_or_else(|| {
        ChartError::ResolutionError(format!(
            "cannot interpret '{}' as a date",
            value_to_string(v)
        ))
    })
}

/// Date view of a data cell: "YYYY-MM-DD" or an ISO-8601 datetime string,
/// date part taken, anything else unparseable.
fn parse_cell_date(cell: &Value) -> Option<NaiveDate> {
    let s = cell.as_str()?.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    None
}

fn is_numeric_column(column: &[Value]) -> bool {
    column.iter().all(Value::is_number)
}
