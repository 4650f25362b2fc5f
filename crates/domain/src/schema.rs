//! Declarative record schemas and the validator that interprets them.
//!
//! A [`RecordSchema`] names the backing table, the conflict key used for
//! upserts, and a list of [`FieldSpec`]s. Validation returns a cleaned copy
//! of the input holding only declared fields, or every field-level
//! violation found.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use time::{Date, macros::format_description};
use validator::ValidateEmail;

use crate::util::{is_hyphenated_uuid, parse_rfc3339};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldViolation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|violation| violation.field == field)
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldViolation {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(|violation| format!("{}: {}", violation.field, violation.message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&rendered)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    Uuid,
    Text { min: usize, max: Option<usize> },
    Email,
    /// Calendar date, `YYYY-MM-DD`.
    Date,
    /// RFC 3339 instant.
    Timestamp,
    Integer { min: Option<i64>, max: Option<i64> },
    Number { min: Option<f64>, max: Option<f64> },
    Boolean,
    Enum(&'static [&'static str]),
    List {
        item: &'static FieldKind,
        max_items: Option<usize>,
    },
    Object(&'static [FieldSpec]),
    /// Any JSON value, stored as-is.
    Json,
}

impl FieldKind {
    pub const fn text(min: usize) -> Self {
        Self::Text { min, max: None }
    }

    pub const fn bounded_text(min: usize, max: usize) -> Self {
        Self::Text {
            min,
            max: Some(max),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    Required,
    /// May be absent; `null` is rejected.
    Optional,
    /// May be absent or `null`.
    Nullable,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Required,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
        }
    }

    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Nullable,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RecordSchema {
    /// Backing table; also the entity name written to the audit log.
    pub table: &'static str,
    pub conflict_key: &'static [&'static str],
    pub fields: &'static [FieldSpec],
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn on_conflict(&self) -> String {
        self.conflict_key.join(",")
    }

    /// Full validation: required fields must be present, unknown keys are dropped.
    pub fn validate(
        &self,
        input: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let cleaned = validate_fields(self.fields, input, "", &mut errors);
        if errors.is_empty() {
            Ok(cleaned)
        } else {
            Err(errors)
        }
    }

    /// Patch validation: only the keys present are checked.
    pub fn validate_patch(
        &self,
        patch: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let mut cleaned = Map::new();
        for (key, value) in patch {
            let Some(spec) = self.field(key) else {
                continue;
            };
            if let Some(value) = validate_present(spec, value, key, &mut errors) {
                cleaned.insert(key.clone(), value);
            }
        }
        if errors.is_empty() {
            Ok(cleaned)
        } else {
            Err(errors)
        }
    }
}

fn validate_fields(
    fields: &[FieldSpec],
    input: &Map<String, Value>,
    prefix: &str,
    errors: &mut ValidationErrors,
) -> Map<String, Value> {
    let mut cleaned = Map::new();
    for spec in fields {
        let path = join_path(prefix, spec.name);
        match input.get(spec.name) {
            None => {
                if spec.presence == Presence::Required {
                    errors.push(&path, "is required");
                }
            }
            Some(value) => {
                if let Some(value) = validate_present(spec, value, &path, errors) {
                    cleaned.insert(spec.name.to_string(), value);
                }
            }
        }
    }
    cleaned
}

fn validate_present(
    spec: &FieldSpec,
    value: &Value,
    path: &str,
    errors: &mut ValidationErrors,
) -> Option<Value> {
    if value.is_null() {
        return match spec.presence {
            Presence::Nullable => Some(Value::Null),
            Presence::Required => {
                errors.push(path, "is required");
                None
            }
            Presence::Optional => {
                errors.push(path, "must not be null");
                None
            }
        };
    }
    check_kind(&spec.kind, value, path, errors)
}

fn check_kind(
    kind: &FieldKind,
    value: &Value,
    path: &str,
    errors: &mut ValidationErrors,
) -> Option<Value> {
    match kind {
        FieldKind::Uuid => {
            let text = expect_str(value, path, errors)?;
            if !is_hyphenated_uuid(text) {
                errors.push(path, "must be a valid uuid");
                return None;
            }
        }
        FieldKind::Text { min, max } => {
            let text = expect_str(value, path, errors)?;
            let length = text.chars().count();
            if length < *min {
                errors.push(path, format!("must contain at least {min} character(s)"));
                return None;
            }
            if let Some(max) = max {
                if length > *max {
                    errors.push(path, format!("must contain at most {max} character(s)"));
                    return None;
                }
            }
        }
        FieldKind::Email => {
            let text = expect_str(value, path, errors)?;
            if !text.to_string().validate_email() {
                errors.push(path, "must be a valid email address");
                return None;
            }
        }
        FieldKind::Date => {
            let text = expect_str(value, path, errors)?;
            if Date::parse(text, format_description!("[year]-[month]-[day]")).is_err() {
                errors.push(path, "must be a date formatted as YYYY-MM-DD");
                return None;
            }
        }
        FieldKind::Timestamp => {
            let text = expect_str(value, path, errors)?;
            if parse_rfc3339(text).is_none() {
                errors.push(path, "must be an RFC 3339 timestamp");
                return None;
            }
        }
        FieldKind::Integer { min, max } => {
            let Some(number) = value.as_i64() else {
                errors.push(path, "must be an integer");
                return None;
            };
            if min.is_some_and(|min| number < min) || max.is_some_and(|max| number > max) {
                errors.push(path, range_message(min.map(|v| v as f64), max.map(|v| v as f64)));
                return None;
            }
        }
        FieldKind::Number { min, max } => {
            let Some(number) = value.as_f64() else {
                errors.push(path, "must be a number");
                return None;
            };
            if min.is_some_and(|min| number < min) || max.is_some_and(|max| number > max) {
                errors.push(path, range_message(*min, *max));
                return None;
            }
        }
        FieldKind::Boolean => {
            if !value.is_boolean() {
                errors.push(path, "must be a boolean");
                return None;
            }
        }
        FieldKind::Enum(options) => {
            let text = expect_str(value, path, errors)?;
            if !options.contains(&text) {
                errors.push(path, format!("must be one of: {}", options.join(", ")));
                return None;
            }
        }
        FieldKind::List { item, max_items } => {
            let Some(items) = value.as_array() else {
                errors.push(path, "must be a list");
                return None;
            };
            if let Some(max_items) = max_items {
                if items.len() > *max_items {
                    errors.push(path, format!("must contain at most {max_items} item(s)"));
                    return None;
                }
            }
            let before = errors.len();
            let cleaned = items
                .iter()
                .enumerate()
                .filter_map(|(index, element)| {
                    let element_path = format!("{path}[{index}]");
                    if element.is_null() {
                        errors.push(&element_path, "must not be null");
                        return None;
                    }
                    check_kind(item, element, &element_path, errors)
                })
                .collect::<Vec<_>>();
            if errors.len() != before {
                return None;
            }
            return Some(Value::Array(cleaned));
        }
        FieldKind::Object(fields) => {
            let Some(map) = value.as_object() else {
                errors.push(path, "must be an object");
                return None;
            };
            let before = errors.len();
            let cleaned = validate_fields(fields, map, path, errors);
            if errors.len() != before {
                return None;
            }
            return Some(Value::Object(cleaned));
        }
        FieldKind::Json => {}
    }
    Some(value.clone())
}

fn expect_str<'a>(value: &'a Value, path: &str, errors: &mut ValidationErrors) -> Option<&'a str> {
    let text = value.as_str();
    if text.is_none() {
        errors.push(path, "must be a string");
    }
    text
}

fn range_message(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("must be between {min} and {max}"),
        (Some(min), None) => format!("must be at least {min}"),
        (None, Some(max)) => format!("must be at most {max}"),
        (None, None) => "is out of range".to_string(),
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
