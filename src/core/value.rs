use serde_json::Value as Json;
use std::cmp::Ordering;

/// Scalar view over a document field.
///
/// Documents are stored as JSON; comparisons between field values and
/// filter operands go through this type so numeric values compare across
/// integer and float representations.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
}

impl Value {
    /// Scalar view of a JSON value. Arrays and objects have none.
    pub fn from_json(json: &Json) -> Option<Self> {
        match json {
            Json::Null => Some(Self::Null),
            Json::Bool(b) => Some(Self::Boolean(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            Json::String(s) => Some(Self::Text(s.clone())),
            Json::Array(_) | Json::Object(_) => None,
        }
    }

    /// Orders two scalars of the same kind.
    ///
    /// Returns `None` when the kinds differ or either side is null: such
    /// values never satisfy an ordering predicate.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,

            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),

            // ========================================
            // Mixed numeric types (implicit coercion)
            // ========================================
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),

            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),

            _ => None,
        }
    }

    /// True for the storage layer's native zero value of each kind.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Integer(i) => *i == 0,
            Self::Float(f) => *f == 0.0,
            Self::Text(s) => s.is_empty(),
            Self::Boolean(b) => !*b,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => (a - b).abs() < f64::EPSILON,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                (*i as f64 - f).abs() < f64::EPSILON
            }
            _ => false,
        }
    }
}

/// Equality between two JSON values: numeric-aware for scalars,
/// structural for arrays and objects.
pub fn json_equals(left: &Json, right: &Json) -> bool {
    match (Value::from_json(left), Value::from_json(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

/// Ordering between two JSON values, `None` when they are not comparable.
pub fn json_compare(left: &Json, right: &Json) -> Option<Ordering> {
    let left = Value::from_json(left)?;
    let right = Value::from_json(right)?;
    left.compare(&right)
}

/// True when `json` holds the native zero value of its kind.
pub fn is_zero_json(json: &Json) -> bool {
    match json {
        Json::Array(items) => items.is_empty(),
        Json::Object(fields) => fields.is_empty(),
        scalar => Value::from_json(scalar).is_none_or(|v| v.is_zero()),
    }
}
