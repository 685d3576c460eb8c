//! Request validation: JSON payload to column values, with coercion and per-field messages.

use crate::error::{AppError, FieldErrors};
use crate::model::{ColumnDef, EntityDef, FieldKind};
use crate::store::Record;
use serde_json::Value;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Which fields a write must carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// POST and PUT: every required field.
    Full,
    /// PATCH: only the supplied fields are validated and written.
    Partial,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate `body` against the entity's writable columns and return coerced values.
    /// Read-only and unknown keys are ignored. All field errors are collected before failing.
    pub fn validate(body: &Value, entity: &EntityDef, mode: WriteMode) -> Result<Record, AppError> {
        let obj = match body {
            Value::Object(m) => m,
            other => {
                return Err(AppError::Validation(FieldErrors::single(
                    NON_FIELD_ERRORS,
                    format!("Invalid data. Expected a dictionary, but got {}.", json_type(other)),
                )))
            }
        };
        let mut errors = FieldErrors::new();
        let mut record = Record::new();
        for col in entity.writable_columns() {
            match obj.get(col.name) {
                None => {
                    if mode == WriteMode::Full && col.required {
                        errors.add(col.name, "This field is required.");
                    }
                }
                Some(v) => match coerce(col, v) {
                    Ok(value) => {
                        record.insert(col.name.to_string(), value);
                    }
                    Err(msg) => errors.add(col.name, msg),
                },
            }
        }
        errors.into_result()?;
        Ok(record)
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Coerce one input value to the column's kind.
pub fn coerce(col: &ColumnDef, v: &Value) -> Result<Value, String> {
    if v.is_null() {
        return Err("This field may not be null.".into());
    }
    match col.kind {
        FieldKind::Text { max_length } => {
            let s = match v {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return Err("Not a valid string.".into()),
            };
            if s.is_empty() {
                return Err("This field may not be blank.".into());
            }
            if s.chars().count() > max_length {
                return Err(format!(
                    "Ensure this field has no more than {} characters.",
                    max_length
                ));
            }
            Ok(Value::String(s))
        }
        FieldKind::Float => {
            let n = match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            n.and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| "A valid number is required.".to_string())
        }
        FieldKind::Bool => parse_bool(v)
            .map(Value::Bool)
            .ok_or_else(|| "Must be a valid boolean.".to_string()),
        FieldKind::ForeignKey { .. } | FieldKind::Id => match v {
            Value::Number(n) => n
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| format!("Invalid pk \"{}\" - object does not exist.", n)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("Incorrect type. Expected pk value, received {}.", json_type(v))),
            _ => Err(format!("Incorrect type. Expected pk value, received {}.", json_type(v))),
        },
        FieldKind::Timestamp => match v {
            Value::String(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
                .map(|d| Value::String(crate::store::format_timestamp(&d.with_timezone(&chrono::Utc))))
                .map_err(|_| "Datetime has wrong format.".to_string()),
            _ => Err("Datetime has wrong format.".into()),
        },
    }
}

/// Boolean spellings accepted in payloads and query strings.
pub fn parse_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => parse_bool_str(s),
        _ => None,
    }
}

pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}
