use std::rc::Rc;

use regex::Regex;

use crate::error::CastError;
use crate::schema::types::Predicate;
use crate::value::Value;

/// Truthy scalars and arrays become their string form, arrays joined with
/// commas; falsy values pass through.
pub(super) fn cast(path: &str, value: Value) -> Result<Value, CastError> {
    if !value.is_truthy() {
        return Ok(value);
    }
    match value {
        Value::String(_) => Ok(value),
        Value::Number(_) | Value::Bool(_) | Value::Date(_) | Value::Array(_) => {
            Ok(Value::String(value.to_string()))
        }
        other => Err(CastError::new(path, "string", &other)),
    }
}

pub(super) fn match_validator(regex: Regex) -> Predicate {
    Rc::new(move |value, _| {
        !value.is_truthy() || value.as_str().map_or(false, |s| regex.is_match(s))
    })
}

pub(super) fn enum_validator(values: Vec<String>) -> Predicate {
    Rc::new(move |value, _| {
        !value.is_truthy()
            || value
                .as_str()
                .map_or(false, |s| values.iter().any(|allowed| allowed == s))
    })
}

/// Character-count bound; empty values are left to `required`.
pub(super) fn length_bound(bound: f64, lower: bool) -> Predicate {
    Rc::new(move |value, _| match value.as_str() {
        None | Some("") => true,
        Some(s) => {
            let len = s.chars().count() as f64;
            if lower {
                len >= bound
            } else {
                len <= bound
            }
        }
    })
}
