//! Optional payload schemas for concept actions
//!
//! An action may declare the shape it expects its payload to have. The
//! schema is applied before the action body runs: missing or mistyped
//! fields reject the dispatch, and a few permissive coercions are applied
//! (numeric strings become numbers, integers widen to floats). Actions
//! without a schema accept any payload untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Expected type of one payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Any JSON string
    String,
    /// An integer, or a string parseable as one
    Integer,
    /// Any number, or a string parseable as one
    Float,
    /// A boolean
    Bool,
    /// A JSON object
    Object,
    /// A JSON array
    Array,
}

impl FieldKind {
    fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Bool => "bool",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }
}

/// Errors produced by payload validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload is not an object but the schema declares fields
    #[error("payload must be an object, got {0}")]
    NotAnObject(String),

    /// A declared field is absent
    #[error("missing payload field `{0}`")]
    MissingField(String),

    /// A field has the wrong type and cannot be coerced
    #[error("payload field `{field}` expects {expected}, got {actual}")]
    TypeMismatch {
        /// The offending field name
        field: String,
        /// The declared kind
        expected: &'static str,
        /// A short description of the actual value
        actual: String,
    },
}

/// Declarative payload validator attached to an action
///
/// Field declarations are ordered; validation checks each declared field
/// in turn and leaves undeclared fields untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadSchema {
    fields: Vec<(String, FieldKind)>,
}

impl PayloadSchema {
    /// Create an empty schema (accepts any object)
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field with its expected kind
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }

    /// The declared fields, in declaration order
    pub fn fields(&self) -> &[(String, FieldKind)] {
        &self.fields
    }

    /// Validate and coerce a payload against this schema
    ///
    /// Returns the (possibly coerced) payload on success. The input is
    /// consumed; callers keep no alias to the pre-coercion value.
    pub fn validate(&self, payload: Value) -> Result<Value, PayloadError> {
        if self.fields.is_empty() {
            return Ok(payload);
        }

        let mut map = match payload {
            Value::Object(map) => map,
            other => return Err(PayloadError::NotAnObject(kind_of(&other).to_string())),
        };

        for (name, kind) in &self.fields {
            let value = map
                .remove(name)
                .ok_or_else(|| PayloadError::MissingField(name.clone()))?;
            let coerced = coerce(name, *kind, value)?;
            map.insert(name.clone(), coerced);
        }

        Ok(Value::Object(map))
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(field: &str, kind: FieldKind, value: &Value) -> PayloadError {
    PayloadError::TypeMismatch {
        field: field.to_string(),
        expected: kind.name(),
        actual: kind_of(value).to_string(),
    }
}

fn coerce(field: &str, kind: FieldKind, value: Value) -> Result<Value, PayloadError> {
    match kind {
        FieldKind::String => match value {
            Value::String(_) => Ok(value),
            other => Err(mismatch(field, kind, &other)),
        },
        FieldKind::Integer => match value {
            Value::Number(ref n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::String(s) => match s.parse::<i64>() {
                Ok(n) => Ok(Value::from(n)),
                Err(_) => Err(mismatch(field, kind, &Value::String(s))),
            },
            other => Err(mismatch(field, kind, &other)),
        },
        FieldKind::Float => match value {
            Value::Number(_) => Ok(value),
            Value::String(s) => match s.parse::<f64>() {
                Ok(n) => Ok(Value::from(n)),
                Err(_) => Err(mismatch(field, kind, &Value::String(s))),
            },
            other => Err(mismatch(field, kind, &other)),
        },
        FieldKind::Bool => match value {
            Value::Bool(_) => Ok(value),
            other => Err(mismatch(field, kind, &other)),
        },
        FieldKind::Object => match value {
            Value::Object(_) => Ok(value),
            other => Err(mismatch(field, kind, &other)),
        },
        FieldKind::Array => match value {
            Value::Array(_) => Ok(value),
            other => Err(mismatch(field, kind, &other)),
        },
    }
}
