// Symbolic date token resolution for filter values.
//
// Tokens come in two forms: fixed keywords ("today", "start_of_month") and
// an offset grammar ("offsetDay(-7)"). Both resolve against an explicit
// reference date so callers control the clock.

use chrono::{Datelike, Days, Months, NaiveDate};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt, recognize},
    sequence::{delimited, pair},
    IResult,
};

use crate::error::{ChartError, Result};

pub const DATE_KEYWORDS: &[&str] = &[
    "today",
    "yesterday",
    "tomorrow",
    "start_of_week",
    "end_of_week",
    "start_of_month",
    "end_of_month",
    "start_of_year",
    "end_of_year",
    "start_of_last_month",
    "end_of_last_month",
    "start_of_next_month",
    "end_of_next_month",
    "start_of_quarter",
    "end_of_quarter",
    "start_of_last_quarter",
    "end_of_last_quarter",
    "start_of_next_quarter",
    "end_of_next_quarter",
];

/// Quick check whether a filter value could be a symbolic date token.
/// A positive here does not guarantee the token resolves.
pub fn is_date_token(value: &str) -> bool {
    let t = value.trim();
    DATE_KEYWORDS.contains(&t) || t.contains("offset")
}

/// Resolve a symbolic token against a reference date. A token that looks
/// symbolic but matches neither the keyword table nor the offset grammar
/// is a parse error; callers are expected to catch it and degrade.
pub fn resolve_date_token(token: &str, today: NaiveDate) -> Result<NaiveDate> {
    let trimmed = token.trim();
    keyword_date(trimmed, today)
        .or_else(|| offset_date(trimmed, today))
        .ok_or_else(|| ChartError::ParseError(format!("unrecognized date token '{}'", token)))
}

/// Resolve against the system clock, read once per call.
pub fn resolve_date_token_now(token: &str) -> Result<NaiveDate> {
    resolve_date_token(token, chrono::Local::now().date_naive())
}

fn keyword_date(token: &str, today: NaiveDate) -> Option<NaiveDate> {
    match token {
        "today" => Some(today),
        "yesterday" => today.pred_opt(),
        "tomorrow" => today.succ_opt(),
        "start_of_week" => week_start(today),
        "end_of_week" => week_start(today)?.checked_add_days(Days::new(6)),
        "start_of_month" => today.with_day(1),
        "end_of_month" => month_end(today),
        "start_of_year" => NaiveDate::from_ymd_opt(today.year(), 1, 1),
        "end_of_year" => NaiveDate::from_ymd_opt(today.year(), 12, 31),
        "start_of_last_month" => today.with_day(1)?.checked_sub_months(Months::new(1)),
        "end_of_last_month" => today.with_day(1)?.pred_opt(),
        "start_of_next_month" => today.with_day(1)?.checked_add_months(Months::new(1)),
        "end_of_next_month" => month_end(today.with_day(1)?.checked_add_months(Months::new(1))?),
        "start_of_quarter" => quarter_start(today),
        "end_of_quarter" => quarter_start(today)?
            .checked_add_months(Months::new(3))?
            .pred_opt(),
        "start_of_last_quarter" => quarter_start(today)?.checked_sub_months(Months::new(3)),
        "end_of_last_quarter" => quarter_start(today)?.pred_opt(),
        "start_of_next_quarter" => quarter_start(today)?.checked_add_months(Months::new(3)),
        "end_of_next_quarter" => quarter_start(today)?
            .checked_add_months(Months::new(6))?
            .pred_opt(),
        _ => None,
    }
}

/// Monday of the week containing `d`.
fn week_start(d: NaiveDate) -> Option<NaiveDate> {
    d.checked_sub_days(Days::new(u64::from(d.weekday().num_days_from_monday())))
}

fn month_end(d: NaiveDate) -> Option<NaiveDate> {
    d.with_day(1)?.checked_add_months(Months::new(1))?.pred_opt()
}

fn quarter_start(d: NaiveDate) -> Option<NaiveDate> {
    let month = (d.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(d.year(), month, 1)
}

// =============================================================================
// Offset grammar: offsetDay(n) / offsetMonth(n) / offsetYear(n)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum OffsetUnit {
    Day,
    Month,
    Year,
}

fn parse_signed_int(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse)(input)
}

fn parse_offset(input: &str) -> IResult<&str, (OffsetUnit, i64)> {
    let (input, unit) = alt((
        map(tag("offsetDay"), |_| OffsetUnit::Day),
        map(tag("offsetMonth"), |_| OffsetUnit::Month),
        map(tag("offsetYear"), |_| OffsetUnit::Year),
    ))(input)?;
    let (input, n) = delimited(char('('), parse_signed_int, char(')'))(input)?;
    Ok((input, (unit, n)))
}

fn offset_date(token: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (_, (unit, n)) = all_consuming(parse_offset)(token).ok()?;
    apply_offset(today, unit, n)
}

/// Month and year offsets preserve the day-of-month where valid and clamp
/// to the end of a shorter month otherwise.
fn apply_offset(today: NaiveDate, unit: OffsetUnit, n: i64) -> Option<NaiveDate> {
    match unit {
        OffsetUnit::Day => {
            if n >= 0 {
                today.checked_add_days(Days::new(n as u64))
            } else {
                today.checked_sub_days(Days::new(n.unsigned_abs()))
            }
        }
        OffsetUnit::Month => shift_months(today, n),
        OffsetUnit::Year => shift_months(today, n.checked_mul(12)?),
    }
}

fn shift_months(date: NaiveDate, n: i64) -> Option<NaiveDate> {
    let months = u32::try_from(n.unsigned_abs()).ok()?;
    if n >= 0 {
        date.checked_add_months(Months::new(months))
    } else {
        date.checked_sub_months(Months::new(months))
    }
}
