//! Value coercion for entry fields.
//!
//! Raw request values are checked against each attached field's type and
//! turned into their stored form. Absent, null and blank-string values are
//! treated as unset.

use super::error::{ContentError, Result};
use super::types::{CustomField, FieldType};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

const NAIVE_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Whether a raw value counts as unset.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Coerce one raw value for `field`. Returns `Ok(None)` when the value is unset.
pub fn coerce_field_value(field: &CustomField, raw: Option<&Value>) -> Result<Option<Value>> {
    if is_empty_value(raw) {
        return Ok(None);
    }
    let Some(raw) = raw else {
        return Ok(None);
    };

    let coerced = match field.field_type {
        FieldType::Text => match raw {
            Value::String(s) => Value::String(s.clone()),
            _ => return Err(invalid(field, "must be text")),
        },
        FieldType::Number => coerce_number(field, raw)?,
        FieldType::Boolean => coerce_boolean(field, raw)?,
        FieldType::Date => coerce_date(field, raw)?,
        FieldType::Select => coerce_select(field, raw)?,
    };
    Ok(Some(coerced))
}

/// Coerce a full set of raw entry values against the fields attached to a
/// content type.
///
/// Keys that do not belong to an attached field are rejected. Required fields
/// that end up unset are rejected. Unset optional fields are omitted.
pub fn coerce_entry_fields(
    attached: &[&CustomField],
    raw: &Map<String, Value>,
) -> Result<BTreeMap<String, Value>> {
    if let Some(unknown) = raw
        .keys()
        .find(|key| !attached.iter().any(|field| &field.key == *key))
    {
        return Err(ContentError::validation(format!("Unknown field: {}", unknown)));
    }

    let mut values = BTreeMap::new();
    for field in attached {
        match coerce_field_value(field, raw.get(&field.key))? {
            Some(value) => {
                values.insert(field.key.clone(), value);
            }
            None if field.required => {
                return Err(ContentError::validation(format!("{} is required.", field.label)));
            }
            None => {}
        }
    }
    Ok(values)
}

fn coerce_number(field: &CustomField, raw: &Value) -> Result<Value> {
    match raw {
        Value::Number(n) => Ok(Value::Number(n.clone())),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return Ok(Value::from(n));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(field, "must be a number"))
        }
        _ => Err(invalid(field, "must be a number")),
    }
}

fn coerce_boolean(field: &CustomField, raw: &Value) -> Result<Value> {
    match raw {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid(field, "must be true or false")),
        },
        _ => Err(invalid(field, "must be true or false")),
    }
}

fn coerce_date(field: &CustomField, raw: &Value) -> Result<Value> {
    let Value::String(s) = raw else {
        return Err(invalid(field, "must be a valid date"));
    };
    let s = s.trim();
    let parses = DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NAIVE_DATETIME_FORMATS
            .iter()
            .any(|format| NaiveDateTime::parse_from_str(s, format).is_ok());
    if parses {
        Ok(Value::String(s.to_string()))
    } else {
        Err(invalid(field, "must be a valid date"))
    }
}

fn coerce_select(field: &CustomField, raw: &Value) -> Result<Value> {
    let options = field.options.as_deref().unwrap_or_default();
    let Value::String(s) = raw else {
        return Err(not_an_option(field, options));
    };
    let s = s.trim();
    if options.iter().any(|option| option == s) {
        Ok(Value::String(s.to_string()))
    } else {
        Err(not_an_option(field, options))
    }
}

fn invalid(field: &CustomField, rule: &str) -> ContentError {
    ContentError::validation(format!("{} {}.", field.label, rule))
}

fn not_an_option(field: &CustomField, options: &[String]) -> ContentError {
    ContentError::validation(format!(
        "{} must be one of: {}.",
        field.label,
        options.join(", ")
    ))
}
