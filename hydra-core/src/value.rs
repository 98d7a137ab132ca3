use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::error::ClientError;
use crate::metadata::{FieldDescriptor, FieldKind};
use crate::resource::Resource;

/// The in-memory value of a resource field.
///
/// Values read from the wire arrive untyped (see [`FieldValue::from_json`])
/// and are coerced to the declared [`FieldKind`] when stored on a resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<FixedOffset>),
    Resource(Resource),
    List(Vec<FieldValue>),
    Map(IndexMap<String, FieldValue>),
}

impl FieldValue {
    /// Converts a decoded JSON value without any type information.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from_json).collect())
            }
            Value::Object(map) => FieldValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts back to JSON, delegating nested resources to `reference`.
    pub fn to_json_with(
        &self,
        reference: &mut dyn FnMut(&Resource) -> Result<Value, ClientError>,
    ) -> Result<Value, ClientError> {
        Ok(match self {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            FieldValue::Resource(resource) => reference(resource)?,
            FieldValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json_with(reference))
                    .collect::<Result<_, _>>()?,
            ),
            FieldValue::Map(entries) => {
                let mut map = Map::new();
                for (key, item) in entries {
                    map.insert(key.clone(), item.to_json_with(reference)?);
                }
                Value::Object(map)
            }
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            FieldValue::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::Resource(_) => "resource",
            FieldValue::List(_) => "list",
            FieldValue::Map(_) => "map",
        }
    }
}

/// Coerces one non-reference value to `kind`.
///
/// Reference kinds need the identity map and are resolved by the resource
/// itself; they are returned untouched here.
pub(crate) fn coerce_scalar(kind: &FieldKind, value: FieldValue) -> Result<FieldValue, String> {
    if value.is_null() {
        return Ok(FieldValue::Null);
    }
    match kind {
        FieldKind::Integer => match value {
            FieldValue::Integer(i) => Ok(FieldValue::Integer(i)),
            FieldValue::Float(f) if f.is_finite() => Ok(FieldValue::Integer(f.trunc() as i64)),
            FieldValue::Boolean(b) => Ok(FieldValue::Integer(i64::from(b))),
            FieldValue::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .or_else(|_| trimmed.parse::<f64>().map(|f| f.trunc() as i64))
                    .map(FieldValue::Integer)
                    .map_err(|_| format!("{s:?} is not an integer"))
            }
            other => Err(format!("expected integer, got {}", other.type_name())),
        },
        FieldKind::Float => match value {
            FieldValue::Float(f) => Ok(FieldValue::Float(f)),
            FieldValue::Integer(i) => Ok(FieldValue::Float(i as f64)),
            FieldValue::Boolean(b) => Ok(FieldValue::Float(if b { 1.0 } else { 0.0 })),
            FieldValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| format!("{s:?} is not a number")),
            other => Err(format!("expected float, got {}", other.type_name())),
        },
        FieldKind::Boolean => match value {
            FieldValue::Boolean(b) => Ok(FieldValue::Boolean(b)),
            FieldValue::Integer(i) => Ok(FieldValue::Boolean(i != 0)),
            FieldValue::Float(f) => Ok(FieldValue::Boolean(f != 0.0)),
            FieldValue::String(s) => Ok(FieldValue::Boolean(!(s.is_empty() || s == "0"))),
            other => Err(format!("expected boolean, got {}", other.type_name())),
        },
        FieldKind::String => match value {
            FieldValue::String(s) => Ok(FieldValue::String(s)),
            FieldValue::Integer(i) => Ok(FieldValue::String(i.to_string())),
            FieldValue::Float(f) => Ok(FieldValue::String(f.to_string())),
            FieldValue::Boolean(b) => Ok(FieldValue::String(b.to_string())),
            FieldValue::DateTime(dt) => Ok(FieldValue::String(dt.to_rfc3339())),
            other => Err(format!("expected string, got {}", other.type_name())),
        },
        FieldKind::DateTime => match value {
            FieldValue::DateTime(dt) => Ok(FieldValue::DateTime(dt)),
            FieldValue::String(s) => parse_datetime(&s)
                .map(FieldValue::DateTime)
                .ok_or_else(|| format!("{s:?} is not a date-time")),
            FieldValue::Integer(ts) => DateTime::<Utc>::from_timestamp(ts, 0)
                .map(|dt| FieldValue::DateTime(dt.fixed_offset()))
                .ok_or_else(|| format!("timestamp {ts} out of range")),
            other => Err(format!("expected date-time, got {}", other.type_name())),
        },
        FieldKind::Reference(_) | FieldKind::Json => Ok(value),
    }
}

/// Encodes a nested resource as its last received `@id`, or null.
pub(crate) fn known_reference(resource: &Resource) -> Result<Value, ClientError> {
    Ok(resource
        .iri()
        .map_or(Value::Null, |iri| Value::String(iri.into_string())))
}

/// Parses RFC 3339, falling back to naive `Y-m-d H:M:S` and `Y-m-d` read as UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// A Rust type usable as a typed resource field.
///
/// `#[resource]` declarations derive their metadata and accessors from this
/// trait; the macro also implements it for every declared resource type so
/// that resources can reference each other.
pub trait FieldType: Sized {
    fn descriptor() -> FieldDescriptor;

    /// Extracts the typed value; `None` when the stored value has another shape.
    fn from_field(value: FieldValue) -> Option<Self>;

    fn into_field(self) -> FieldValue;
}

impl FieldType for i64 {
    fn descriptor() -> FieldDescriptor {
        FieldDescriptor::integer()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        value.as_i64()
    }

    fn into_field(self) -> FieldValue {
        FieldValue::Integer(self)
    }
}

impl FieldType for i32 {
    fn descriptor() -> FieldDescriptor {
        FieldDescriptor::integer()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        value.as_i64().and_then(|i| i32::try_from(i).ok())
    }

    fn into_field(self) -> FieldValue {
        FieldValue::Integer(self.into())
    }
}

impl FieldType for f64 {
    fn descriptor() -> FieldDescriptor {
        FieldDescriptor::float()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        value.as_f64()
    }

    fn into_field(self) -> FieldValue {
        FieldValue::Float(self)
    }
}

impl FieldType for bool {
    fn descriptor() -> FieldDescriptor {
        FieldDescriptor::boolean()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        value.as_bool()
    }

    fn into_field(self) -> FieldValue {
        FieldValue::Boolean(self)
    }
}

impl FieldType for String {
    fn descriptor() -> FieldDescriptor {
        FieldDescriptor::string()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn into_field(self) -> FieldValue {
        FieldValue::String(self)
    }
}

impl FieldType for DateTime<FixedOffset> {
    fn descriptor() -> FieldDescriptor {
        FieldDescriptor::datetime()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    fn into_field(self) -> FieldValue {
        FieldValue::DateTime(self)
    }
}

impl FieldType for DateTime<Utc> {
    fn descriptor() -> FieldDescriptor {
        FieldDescriptor::datetime()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::DateTime(dt) => Some(dt.with_timezone(&Utc)),
            _ => None,
        }
    }

    fn into_field(self) -> FieldValue {
        FieldValue::DateTime(self.fixed_offset())
    }
}

impl FieldType for Value {
    fn descriptor() -> FieldDescriptor {
        FieldDescriptor::json()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        value.to_json_with(&mut known_reference).ok()
    }

    fn into_field(self) -> FieldValue {
        FieldValue::from_json(self)
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn descriptor() -> FieldDescriptor {
        T::descriptor().array()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::List(items) => items.into_iter().map(T::from_field).collect(),
            FieldValue::Map(entries) => entries.into_values().map(T::from_field).collect(),
            _ => None,
        }
    }

    fn into_field(self) -> FieldValue {
        FieldValue::List(self.into_iter().map(T::into_field).collect())
    }
}

impl<T: FieldType> FieldType for IndexMap<String, T> {
    fn descriptor() -> FieldDescriptor {
        T::descriptor().array()
    }

    fn from_field(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_field(v).map(|v| (k, v)))
                .collect(),
            FieldValue::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| T::from_field(v).map(|v| (i.to_string(), v)))
                .collect(),
            _ => None,
        }
    }

    fn into_field(self) -> FieldValue {
        FieldValue::Map(self.into_iter().map(|(k, v)| (k, v.into_field())).collect())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        FieldValue::DateTime(value)
    }
}

impl From<Resource> for FieldValue {
    fn from(value: Resource) -> Self {
        FieldValue::Resource(value)
    }
}

impl From<&Resource> for FieldValue {
    fn from(value: &Resource) -> Self {
        FieldValue::Resource(value.clone())
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::from_json(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        FieldValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}
