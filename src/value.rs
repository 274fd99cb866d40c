//! Typed values and the string-to-typed-value converter.
//!
//! [`convert_field`] applies the emptiness rules before any parse is attempted:
//!
//! - an absent cell (row shorter than the schema) is `None`;
//! - a blank or whitespace-only cell is `None` for every type except `String`,
//!   which keeps the raw text as-is;
//! - anything else must parse with locale-invariant rules or the conversion
//!   fails with [`CsvRecordsError::Conversion`].

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{
    error::{CsvRecordsError, Result},
    schema::{FieldDefinition, FieldType},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    String(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl TypedValue {
    pub fn as_display(&self) -> String {
        match self {
            TypedValue::String(s) => s.clone(),
            TypedValue::Int(i) => i.to_string(),
            TypedValue::Long(l) => l.to_string(),
            TypedValue::Double(d) => d.to_string(),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parses an invariant-culture date/time. Offsets are normalised to UTC; a bare
/// date resolves to midnight.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn parse_boolean(value: &str) -> Option<bool> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parses a present, non-blank value. `None` means the text is not a valid
/// literal of `ty`.
pub fn parse_typed_value(value: &str, ty: FieldType) -> Option<TypedValue> {
    let trimmed = value.trim();
    match ty {
        FieldType::String => Some(TypedValue::String(value.to_string())),
        FieldType::Int => trimmed.parse::<i32>().ok().map(TypedValue::Int),
        FieldType::Long => trimmed.parse::<i64>().ok().map(TypedValue::Long),
        FieldType::Double => trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(TypedValue::Double),
        FieldType::Boolean => parse_boolean(trimmed).map(TypedValue::Boolean),
        FieldType::DateTime => parse_datetime(trimmed).map(TypedValue::DateTime),
    }
}

/// Converts one raw cell into the field's declared type.
pub fn convert_field(raw: Option<&str>, field: &FieldDefinition) -> Result<Option<TypedValue>> {
    let Some(value) = raw else {
        return Ok(None);
    };
    if field.field_type != FieldType::String && value.trim().is_empty() {
        return Ok(None);
    }
    parse_typed_value(value, field.field_type)
        .map(Some)
        .ok_or_else(|| CsvRecordsError::Conversion {
            field: field.name.clone(),
            raw_value: value.to_string(),
            target: field.field_type,
            row: None,
            path: None,
        })
}
