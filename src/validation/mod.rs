// validation/mod.rs - Request payload checks that go beyond `validator` derives
//
// Linked-record bodies are free-form JSON objects checked against the column
// schema of their `EntityKind`. All failures collect into one 400 response
// with per-field messages.

use chrono::{DateTime, NaiveDate};
use serde_json::{json, Map, Value};
use uuid::Uuid;
use validator::{ValidateEmail, ValidationError};

use crate::database::models::record::SYSTEM_FIELDS;
use crate::database::models::{ColumnSpec, ColumnType, ColumnValue, EntityKind, LinkedRecord, RecordValues};
use crate::error::ApiError;

const MAX_NAME_LEN: usize = 200;

/// Field diagnostics keyed by field name
#[derive(Debug, Default)]
pub struct FieldErrors(Map<String, Value>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let entry = self
            .0
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(messages) = entry {
            messages.push(Value::String(message.into()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation("Request validation failed", Some(Value::Object(self.0))))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every required column must be present; defaults fill the rest
    Create,
    /// Only the given columns change; null clears optional ones
    Update,
}

/// Check a record body against the kind's schema and convert it to typed values
pub fn record_values(kind: EntityKind, body: &Map<String, Value>, mode: Mode) -> Result<RecordValues, ApiError> {
    let mut errors = FieldErrors::new();

    for key in body.keys() {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            errors.add(key, "is read-only");
        } else if kind.column(key).is_none() {
            errors.add(key, "is not a known field");
        }
    }

    let mut values = RecordValues::new();
    for spec in kind.columns() {
        match (body.get(spec.name), mode) {
            (None, Mode::Update) => {}
            (None, Mode::Create) | (Some(Value::Null), Mode::Create) => {
                if spec.required {
                    errors.add(spec.name, "is required");
                } else if let Some(default) = spec.default {
                    values.push(spec.name, ColumnValue::Text(Some(default.to_string())));
                }
            }
            (Some(Value::Null), Mode::Update) => {
                if spec.required || spec.default.is_some() {
                    errors.add(spec.name, "cannot be null");
                } else {
                    values.push(spec.name, null_of(spec.column_type));
                }
            }
            (Some(value), _) => match coerce(spec, value) {
                Ok(v) if v.is_null() && (spec.required || spec.default.is_some()) => {
                    errors.add(spec.name, "cannot be empty");
                }
                Ok(v) => values.push(spec.name, v),
                Err(message) => errors.add(spec.name, message),
            },
        }
    }

    errors.into_result()?;
    Ok(values)
}

fn null_of(column_type: ColumnType) -> ColumnValue {
    match column_type {
        ColumnType::Number { .. } => ColumnValue::Number(None),
        ColumnType::Date => ColumnValue::Date(None),
        _ => ColumnValue::Text(None),
    }
}

fn coerce(spec: &ColumnSpec, value: &Value) -> Result<ColumnValue, String> {
    match spec.column_type {
        ColumnType::Text { max_len } => {
            let text = expect_str(value)?.trim();
            if text.is_empty() {
                return Ok(ColumnValue::Text(None));
            }
            if text.chars().count() > max_len {
                return Err(format!("must be at most {} characters", max_len));
            }
            Ok(ColumnValue::Text(Some(text.to_string())))
        }
        ColumnType::Email => {
            let text = expect_str(value)?.trim();
            if text.is_empty() {
                return Ok(ColumnValue::Text(None));
            }
            if !text.to_string().validate_email() {
                return Err("must be a valid email address".to_string());
            }
            Ok(ColumnValue::Text(Some(text.to_lowercase())))
        }
        ColumnType::Url => {
            let text = expect_str(value)?.trim();
            if text.is_empty() {
                return Ok(ColumnValue::Text(None));
            }
            match url::Url::parse(text) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
                    Ok(ColumnValue::Text(Some(text.to_string())))
                }
                _ => Err("must be an http(s) URL".to_string()),
            }
        }
        ColumnType::Number { min, max } => {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) if s.trim().is_empty() => return Ok(ColumnValue::Number(None)),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|n| n.is_finite())
            .ok_or_else(|| "must be a number".to_string())?;

            if number < min {
                return Err(format!("must be at least {}", min));
            }
            if let Some(max) = max {
                if number > max {
                    return Err(format!("must be at most {}", max));
                }
            }
            Ok(ColumnValue::Number(Some(number)))
        }
        ColumnType::Date => {
            let text = expect_str(value)?.trim();
            if text.is_empty() {
                return Ok(ColumnValue::Date(None));
            }
            parse_date(text)
                .map(|d| ColumnValue::Date(Some(d)))
                .ok_or_else(|| "must be a date (YYYY-MM-DD)".to_string())
        }
        ColumnType::Choice(choices) => {
            let text = expect_str(value)?.trim().to_uppercase();
            if choices.contains(&text.as_str()) {
                Ok(ColumnValue::Text(Some(text)))
            } else {
                Err(format!("must be one of {}", choices.join(", ")))
            }
        }
    }
}

fn expect_str(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| "must be a string".to_string())
}

/// Plain dates, or the date part of an RFC 3339 timestamp
fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Reject a date range whose end precedes its start, considering the values
/// already stored for fields the update leaves untouched
pub fn check_date_range(
    kind: EntityKind,
    values: &RecordValues,
    existing: Option<&LinkedRecord>,
) -> Result<(), ApiError> {
    let Some((start_col, end_col)) = kind.date_range() else {
        return Ok(());
    };

    let effective = |column: &str| match values.get(column) {
        Some(value) => value.as_date(),
        None => existing.and_then(|record| record.date(column)),
    };

    if let (Some(start), Some(end)) = (effective(start_col), effective(end_col)) {
        if end < start {
            return Err(ApiError::invalid_field(end_col, format!("must not be before {}", start_col)));
        }
    }
    Ok(())
}

/// `property_ids` for a new record: a non-empty array of UUIDs, deduplicated
pub fn parse_property_ids(value: Option<&Value>) -> Result<Vec<Uuid>, ApiError> {
    const FIELD: &str = "property_ids";

    let items = match value {
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) | None | Some(Value::Null) => {
            return Err(ApiError::invalid_field(FIELD, "at least one property is required"));
        }
        Some(_) => return Err(ApiError::invalid_field(FIELD, "must be an array of property ids")),
    };

    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        let id = item
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| ApiError::invalid_field(FIELD, "must be an array of property ids"))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Reduce user input such as `https://WWW.Example.com/path` to its host
pub fn normalize_domain(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("domain", "Domain is required"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = url::Url::parse(&candidate).map_err(|_| invalid("domain", "Domain is not a valid host name"))?;
    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_lowercase())
        .filter(|h| h.contains('.') && !h.starts_with('.'))
        .ok_or_else(|| invalid("domain", "Domain is not a valid host name"))?;

    if host.len() > 253 {
        return Err(invalid("domain", "Domain is too long"));
    }
    Ok(host)
}

/// `validator` custom hook for domain fields
pub fn validate_domain(input: &str) -> Result<(), ValidationError> {
    normalize_domain(input).map(|_| ())
}

/// Display names: 1 to 200 characters once surrounding whitespace is removed
pub fn validate_name(input: &str) -> Result<(), ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("name", "Name must not be blank"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(invalid("name", "Name must be at most 200 characters"));
    }
    Ok(())
}

/// IANA-style zone names such as `UTC` or `America/Argentina/Buenos_Aires`
pub fn validate_timezone(input: &str) -> Result<(), ValidationError> {
    let valid = !input.is_empty()
        && input.len() <= 64
        && !input.starts_with('/')
        && !input.ends_with('/')
        && !input.contains("//")
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '+'));

    if valid {
        Ok(())
    } else {
        Err(invalid("timezone", "Timezone must be an IANA zone name"))
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Trimmed, deduplicated, non-empty tags
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

/// Echo of the validated values for activity details
pub fn changed_fields(values: &RecordValues) -> Value {
    json!(values.iter().map(|(name, _)| *name).collect::<Vec<_>>())
}
