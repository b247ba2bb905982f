use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{Field, FieldType, Schema};

/// A problem found while checking raw attributes against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("\"{0}\": required field is not set")]
    MissingRequired(String),

    #[error("\"{0}\": unsupported argument")]
    Unknown(String),

    #[error("\"{name}\": this field has been removed. {message}")]
    Removed { name: String, message: String },

    #[error("\"{name}\": expected {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("attributes must be an object, got {0}")]
    NotAnObject(&'static str),
}

impl Schema {
    /// Check a raw attribute object against the schema.
    ///
    /// Returns every problem found; an empty vector means the attributes are
    /// acceptable. Null values count as unset.
    pub fn validate(&self, attrs: &Value) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        match attrs {
            Value::Object(map) => validate_fields(&self.fields, map, "", &mut errors),
            other => errors.push(SchemaError::NotAnObject(kind(other))),
        }
        errors
    }

    /// Drop nulls, empty optional strings and removed fields and coerce
    /// scalars to their declared types, leaving unset fields unset.
    ///
    /// Assumes `attrs` already passed [`Schema::validate`].
    pub fn coerce(&self, attrs: &Map<String, Value>) -> Map<String, Value> {
        coerce_fields(&self.fields, attrs, false)
    }

    /// Produce the value the state is expected to hold for this config:
    /// coerced like [`Schema::coerce`], with defaults filled in and state
    /// functions applied.
    pub fn normalize(&self, attrs: &Map<String, Value>) -> Map<String, Value> {
        coerce_fields(&self.fields, attrs, true)
    }
}

fn validate_fields(
    fields: &[Field],
    map: &Map<String, Value>,
    prefix: &str,
    errors: &mut Vec<SchemaError>,
) {
    for (key, value) in map {
        let path = format!("{}{}", prefix, key);
        let Some(field) = fields.iter().find(|f| f.name == key) else {
            errors.push(SchemaError::Unknown(path));
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(message) = field.removed {
            errors.push(SchemaError::Removed {
                name: path,
                message: message.to_string(),
            });
            continue;
        }
        if field.computed && !field.optional {
            errors.push(SchemaError::Unknown(path));
            continue;
        }
        validate_value(&field.ty, value, &path, errors);
    }

    for field in fields {
        if field.required && map.get(field.name).map_or(true, Value::is_null) {
            errors.push(SchemaError::MissingRequired(format!(
                "{}{}",
                prefix, field.name
            )));
        }
    }
}

fn validate_value(ty: &FieldType, value: &Value, path: &str, errors: &mut Vec<SchemaError>) {
    let mismatch = |expected: &'static str| SchemaError::TypeMismatch {
        name: path.to_string(),
        expected,
        found: kind(value),
    };

    match (ty, value) {
        (FieldType::String, Value::String(_)) => {}
        // Numbers and bools are accepted where strings are expected, the way
        // HCL literals coerce.
        (FieldType::String, Value::Number(_) | Value::Bool(_)) => {}
        (FieldType::Bool, Value::Bool(_)) => {}
        (FieldType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => {}
        (FieldType::Map, Value::Object(_)) => {}
        (FieldType::Set(elem), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                validate_value(elem, item, &format!("{}[{}]", path, i), errors);
            }
        }
        (FieldType::Block(fields), Value::Object(map)) => {
            validate_fields(fields, map, &format!("{}.", path), errors);
        }
        (other, _) => errors.push(mismatch(other.name())),
    }
}

fn coerce_fields(
    fields: &[Field],
    attrs: &Map<String, Value>,
    with_defaults: bool,
) -> Map<String, Value> {
    let mut out = Map::new();
    for field in fields {
        if field.removed.is_some() {
            continue;
        }
        let value = match attrs.get(field.name) {
            Some(v) if is_set(field, v) => coerce_value(&field.ty, v, with_defaults),
            _ => match &field.default {
                Some(default) if with_defaults => default.clone(),
                _ => continue,
            },
        };
        let value = match field.state_func {
            Some(f) if with_defaults => f(&value),
            _ => value,
        };
        out.insert(field.name.to_string(), value);
    }
    out
}

/// Null counts as unset, and so does an empty optional string: the API
/// cannot tell an empty string from an absent one.
fn is_set(field: &Field, value: &Value) -> bool {
    match (&field.ty, value) {
        (_, Value::Null) => false,
        (FieldType::String, Value::String(s)) => !s.is_empty() || field.required,
        _ => true,
    }
}

fn coerce_value(ty: &FieldType, value: &Value, with_defaults: bool) -> Value {
    match (ty, value) {
        (FieldType::String, Value::Number(n)) => Value::String(n.to_string()),
        (FieldType::String, Value::Bool(b)) => Value::String(b.to_string()),
        (FieldType::Set(elem), Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|i| coerce_value(elem, i, with_defaults))
                .collect(),
        ),
        (FieldType::Block(fields), Value::Object(map)) => {
            Value::Object(coerce_fields(fields, map, with_defaults))
        }
        _ => value.clone(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
