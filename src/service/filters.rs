//! Query-string filters: map declared filter params to typed [`Filter`]s.

use crate::error::{AppError, FieldErrors};
use crate::model::{EntityDef, FieldKind, FilterDef, FilterOp};
use crate::service::validation::parse_bool_str;
use crate::store::{format_timestamp, Filter};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Build filters from query params. Params the entity does not declare are ignored,
/// as are empty values. Unparseable values fail with a field error on the param.
pub fn parse_filters(entity: &EntityDef, params: &HashMap<String, String>) -> Result<Vec<Filter>, AppError> {
    let mut filters = Vec::new();
    let mut errors = FieldErrors::new();
    for def in entity.filters {
        let Some(raw) = params.get(def.param).map(|v| v.trim()) else { continue };
        if raw.is_empty() {
            continue;
        }
        match build(entity, def, raw) {
            Ok(mut f) => filters.append(&mut f),
            Err(msg) => errors.add(def.param, msg),
        }
    }
    errors.into_result()?;
    Ok(filters)
}

fn build(entity: &EntityDef, def: &FilterDef, raw: &str) -> Result<Vec<Filter>, String> {
    let col = entity
        .column(def.column)
        .ok_or_else(|| format!("unknown column {}", def.column))?;
    let column = col.name;
    Ok(match def.op {
        FilterOp::IContains => vec![Filter::IContains {
            column,
            needle: raw.to_string(),
        }],
        FilterOp::Exact => vec![Filter::Eq {
            column,
            value: exact_value(col.kind, raw)?,
        }],
        FilterOp::Moment => match parse_day(raw) {
            Some(day) => {
                let (start, end) = day_bounds(day)?;
                vec![
                    Filter::AtLeast { column, value: ts_value(&start) },
                    Filter::Before { column, value: ts_value(&end) },
                ]
            }
            None => vec![Filter::Eq {
                column,
                value: ts_value(&parse_instant(raw)?),
            }],
        },
        FilterOp::After => vec![Filter::AtLeast {
            column,
            value: ts_value(&parse_bound(raw)?),
        }],
        FilterOp::Before => vec![Filter::Before {
            column,
            value: ts_value(&parse_bound(raw)?),
        }],
    })
}

fn exact_value(kind: FieldKind, raw: &str) -> Result<Value, String> {
    match kind {
        FieldKind::Id | FieldKind::ForeignKey { .. } => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| "Enter a whole number.".to_string()),
        FieldKind::Bool => parse_bool_str(raw)
            .map(Value::Bool)
            .ok_or_else(|| "Must be a valid boolean.".to_string()),
        FieldKind::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| "Enter a number.".to_string()),
        FieldKind::Text { .. } => Ok(Value::String(raw.to_string())),
        FieldKind::Timestamp => parse_instant(raw).map(|d| ts_value(&d)),
    }
}

fn ts_value(d: &DateTime<Utc>) -> Value {
    Value::String(format_timestamp(d))
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn day_bounds(day: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
    let start = day
        .and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .ok_or_else(|| "Enter a valid date.".to_string())?;
    Ok((start, start + Duration::days(1)))
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| "Enter a valid date (YYYY-MM-DD) or RFC 3339 date/time.".to_string())
}

/// Range bounds accept a day (midnight UTC) or an instant.
fn parse_bound(raw: &str) -> Result<DateTime<Utc>, String> {
    match parse_day(raw) {
        Some(day) => day_bounds(day).map(|(start, _)| start),
        None => parse_instant(raw),
    }
}
