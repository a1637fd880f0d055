// Copyright (c) 2025 - Cowboy AI, Inc.
//! Payload schema validation
//!
//! Schemas are static tables of [`FieldSpec`]s. Validation collects every
//! failing field instead of stopping at the first, so the operator can fix
//! the whole form in one pass.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const TEXT: FieldKind = FieldKind::Text;
pub(crate) const AMOUNT: FieldKind = FieldKind::Amount;

/// Accepted shape of a payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-blank string
    Text,
    /// Positive monetary amount: a number, or a decimal string with at most two fraction digits
    Amount,
    /// One of the listed strings
    OneOf(&'static [&'static str]),
    /// JSON object
    Object,
}

/// Schema entry for one payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field-level failures of one payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&rendered.join("; "))
    }
}

/// Validate a payload against a schema
pub fn validate_payload(schema: &[FieldSpec], payload: &Value) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    let Some(object) = payload.as_object() else {
        errors.push("payload", "must be a JSON object");
        return errors;
    };

    for spec in schema {
        match object.get(spec.name) {
            None | Some(Value::Null) if spec.required => errors.push(spec.name, "is required"),
            None | Some(Value::Null) => {}
            Some(value) => {
                if let Err(message) = check_kind(spec.kind, value) {
                    errors.push(spec.name, message);
                }
            }
        }
    }

    for field in object.keys() {
        if !schema.iter().any(|spec| spec.name == field) {
            errors.push(field.clone(), "is not a recognised field");
        }
    }

    errors
}

fn check_kind(kind: FieldKind, value: &Value) -> Result<(), String> {
    match kind {
        FieldKind::Text => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            Some(_) => Err("must not be blank".to_string()),
            None => Err("must be a string".to_string()),
        },
        FieldKind::Amount => check_amount(value),
        FieldKind::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => Ok(()),
            Some(s) => Err(format!("'{}' is not one of: {}", s, allowed.join(", "))),
            None => Err("must be a string".to_string()),
        },
        FieldKind::Object => {
            if value.is_object() {
                Ok(())
            } else {
                Err("must be an object".to_string())
            }
        }
    }
}

fn check_amount(value: &Value) -> Result<(), String> {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() && v > 0.0 => Ok(()),
            _ => Err("must be a positive amount".to_string()),
        },
        Value::String(s) => {
            let (whole, fraction) = s.split_once('.').unwrap_or((s.as_str(), ""));
            let well_formed = !whole.is_empty()
                && whole.chars().all(|c| c.is_ascii_digit())
                && fraction.len() <= 2
                && fraction.chars().all(|c| c.is_ascii_digit())
                && !(s.contains('.') && fraction.is_empty());
            if !well_formed {
                return Err("must be a decimal amount with at most two fraction digits".to_string());
            }
            if s.chars().any(|c| c.is_ascii_digit() && c != '0') {
                Ok(())
            } else {
                Err("must be a positive amount".to_string())
            }
        }
        _ => Err("must be a number or decimal string".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    const SCHEMA: &[FieldSpec] = &[
        FieldSpec::required("name", TEXT),
        FieldSpec::required("amount", AMOUNT),
        FieldSpec::optional("kind", FieldKind::OneOf(&["a", "b"])),
    ];

    #[test_case(json!(12.5) => true ; "positive number")]
    #[test_case(json!(0) => false ; "zero")]
    #[test_case(json!("100.05") => true ; "two fraction digits")]
    #[test_case(json!("100.055") => false ; "three fraction digits")]
    #[test_case(json!("0.00") => false ; "zero string")]
    #[test_case(json!("-4") => false ; "negative string")]
    #[test_case(json!("12.") => false ; "dangling point")]
    #[test_case(json!(true) => false ; "boolean")]
    fn test_amounts(value: Value) -> bool {
        check_amount(&value).is_ok()
    }

    #[test]
    fn test_collects_every_failure() {
        let errors = validate_payload(SCHEMA, &json!({"name": " ", "kind": "c", "other": 1}));

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "amount", "kind", "other"]);
    }

    #[test]
    fn test_optional_null_is_accepted() {
        let errors = validate_payload(SCHEMA, &json!({"name": "x", "amount": 1, "kind": null}));
        assert!(errors.is_empty(), "{}", errors);
    }

    #[test]
    fn test_non_object_payload() {
        let errors = validate_payload(SCHEMA, &json!([1, 2]));
        assert_eq!(errors, ValidationErrors::single("payload", "must be a JSON object"));
    }
}
