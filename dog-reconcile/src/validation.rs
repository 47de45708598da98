//! Base-field validation for tenant configs.
//!
//! Field errors are collected into a `field -> [messages]` map, with nested
//! and list errors flattened into dotted / indexed paths (`themes[0].name`).

use serde_json::{Map, Value};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::{ReconcileError, ReconcileResult};
use crate::types::TenantConfig;

const VALIDATION_MESSAGE: &str = "Tenant configuration validation failed";

/// Struct fields that serde flattens into their parent; their errors are
/// reported without the field prefix.
const FLATTENED: &[&str] = &["profile"];

#[derive(Debug, Default)]
pub struct SchemaErrors {
    map: Map<String, Value>,
}

impl SchemaErrors {
    pub fn push_schema(&mut self, msg: impl Into<String>) {
        Self::push_to(&mut self.map, "_schema", msg);
    }

    pub fn push_field(&mut self, field: &str, msg: impl Into<String>) {
        Self::push_to(&mut self.map, field, msg);
    }

    fn push_to(map: &mut Map<String, Value>, key: &str, msg: impl Into<String>) {
        let msg = Value::String(msg.into());
        match map.get_mut(key) {
            Some(Value::Array(arr)) => arr.push(msg),
            _ => {
                map.insert(key.to_string(), Value::Array(vec![msg]));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.map)
    }

    pub fn into_error(self, message: &str) -> ReconcileError {
        ReconcileError::validation(message, self.into_value())
    }
}

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "email" => Some("must be a valid email"),
        "length" => Some("has invalid length"),
        "url" => Some("must be a valid URL"),
        _ => None,
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn push_validation_errors(out: &mut SchemaErrors, prefix: &str, errs: &ValidationErrors) {
    for (field, kind) in errs.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let key = join_path(prefix, field);
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(|m| m.to_string()))
                        .unwrap_or_else(|| e.code.to_string());
                    out.push_field(&key, msg);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                let name: &str = field;
                let next = if FLATTENED.contains(&name) {
                    prefix.to_string()
                } else {
                    join_path(prefix, field)
                };
                push_validation_errors(out, &next, nested.as_ref());
            }
            ValidationErrorsKind::List(list) => {
                let base = join_path(prefix, field);
                for (idx, nested) in list {
                    push_validation_errors(out, &format!("{base}[{idx}]"), nested.as_ref());
                }
            }
        }
    }
}

/// Tenant keys: non-empty, letters, digits, `-`, `_` or `.`.
pub fn validate_tenant_key(key: &str) -> Result<(), ValidationError> {
    let ok = !key.trim().is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        return Ok(());
    }

    let mut err = ValidationError::new("tenant_key");
    err.message =
        Some("key must be non-empty and contain only letters, digits, '-', '_' or '.'".into());
    Err(err)
}

/// Schema conformance of the scalar config fields. Item lists (routes,
/// menus, components, users) are validated per item by their stages.
pub fn validate_tenant_config(config: &TenantConfig) -> ReconcileResult<()> {
    let mut errors = SchemaErrors::default();

    if let Err(e) = config.validate() {
        push_validation_errors(&mut errors, "", &e);
    }

    for (idx, theme) in config.profile.themes.iter().enumerate() {
        if !theme.is_object() {
            errors.push_field(&format!("themes[{idx}]"), "must be an object");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into_error(VALIDATION_MESSAGE))
    }
}
