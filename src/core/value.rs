//! core::value
//!
//! Canonical value model for object fields.
//!
//! # Types
//!
//! - [`Value`] - A normalized object field value
//! - [`ArrayItem`] - An element of a homogeneous sequence
//!
//! # Invariants
//!
//! - Sequences are homogeneous: all elements are strings or all are numbers
//! - Nested mappings cannot be represented; the parser rejects them
//! - Numbers are 64-bit floats; integer-ness is a validation predicate
//!
//! Equality is deep and structural: sequences compare element-wise and
//! order-sensitive, scalars compare by value.
//!
//! # Example
//!
//! ```
//! use worktreefoundry::core::value::{ArrayItem, Value};
//!
//! let ports = Value::sequence(vec![Value::Number(443.0), Value::Number(8443.0)]).unwrap();
//! assert_eq!(ports, Value::Array(vec![ArrayItem::Number(443.0), ArrayItem::Number(8443.0)]));
//!
//! // Mixed-kind sequences are rejected
//! assert!(Value::sequence(vec![Value::Number(1.0), Value::String("a".into())]).is_err());
//! ```

use thiserror::Error;

/// Errors from value normalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    /// Sequence elements are of more than one primitive kind.
    #[error("array elements must all be same primitive type")]
    MixedSequence,

    /// Sequence contains a boolean, null, or nested sequence.
    #[error("arrays may contain only strings or numbers")]
    UnsupportedSequenceElement,
}

/// A normalized object field value.
///
/// This is the closed set of shapes an object field can take. Nested
/// mappings and sequences of mappings do not exist in this model; the
/// YAML codec rejects them before a `Value` is ever constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The null literal.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit floating point number (also carries integer logical types).
    Number(f64),
    /// A text string.
    String(String),
    /// A homogeneous ordered sequence of strings or numbers.
    Array(Vec<ArrayItem>),
}

/// An element of a homogeneous sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    /// A string element.
    String(String),
    /// A numeric element.
    Number(f64),
}

impl Value {
    /// Build a sequence value from parsed scalars, enforcing homogeneity.
    ///
    /// # Errors
    ///
    /// - [`ValueError::UnsupportedSequenceElement`] for booleans, nulls, or
    ///   nested sequences
    /// - [`ValueError::MixedSequence`] when elements mix strings and numbers
    pub fn sequence(items: Vec<Value>) -> Result<Value, ValueError> {
        let mut out = Vec::with_capacity(items.len());
        let mut kind: Option<&'static str> = None;
        for item in items {
            let element = match item {
                Value::String(s) => {
                    if *kind.get_or_insert("string") != "string" {
                        return Err(ValueError::MixedSequence);
                    }
                    ArrayItem::String(s)
                }
                Value::Number(n) => {
                    if *kind.get_or_insert("number") != "number" {
                        return Err(ValueError::MixedSequence);
                    }
                    ArrayItem::Number(n)
                }
                _ => return Err(ValueError::UnsupportedSequenceElement),
            };
            out.push(element);
        }
        Ok(Value::Array(out))
    }

    /// Human-readable kind name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
        }
    }

    /// The string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value for export artifacts.
    ///
    /// Integral numbers export without a fractional part.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => json_number(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        ArrayItem::String(s) => serde_json::Value::String(s.clone()),
                        ArrayItem::Number(n) => json_number(*n),
                    })
                    .collect(),
            ),
        }
    }
}

/// Check whether a number is integral (`n == trunc(n)`).
///
/// Integer logical types are a validation predicate over the single
/// float representation, not a stored tag.
pub fn is_integral(n: f64) -> bool {
    n.is_finite() && n == n.trunc()
}

fn json_number(n: f64) -> serde_json::Value {
    if is_integral(n) && n.abs() < i64::MAX as f64 {
        serde_json::Value::Number(serde_json::Number::from(n as i64))
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}
