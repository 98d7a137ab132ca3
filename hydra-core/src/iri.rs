use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;

/// The canonical reference of a remote resource, e.g. `/sports/12`.
///
/// IRIs are opaque to the engine: they are only compared, hashed and handed
/// back to the resolver and the adapter. They key the identity map.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iri(String);

impl Iri {
    pub fn new(value: impl Into<String>) -> Self {
        Iri(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Iri {
    fn from(value: String) -> Self {
        Iri(value)
    }
}

impl From<&str> for Iri {
    fn from(value: &str) -> Self {
        Iri(value.to_string())
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Iri {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iri({})", self.0)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Iri {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Iri {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Iri)
    }
}

/// The identifier of a resource within its class.
///
/// APIs expose either numeric or string identifiers; a path segment is read
/// back as an integer only when it is that integer's canonical spelling.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Integer(i64),
    String(String),
}

impl ResourceId {
    /// Parses a path segment, preferring the integer form.
    ///
    /// `"007"` stays a string: turning it into `7` would address another resource.
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<i64>() {
            Ok(id) if id.to_string() == segment => ResourceId::Integer(id),
            _ => ResourceId::String(segment.to_string()),
        }
    }

    /// Reads an identifier out of a JSON value (`"id": 12` or `"id": "abc"`).
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(ResourceId::Integer),
            Value::String(s) if !s.is_empty() => Some(ResourceId::parse(s)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ResourceId::Integer(id) => Value::from(*id),
            ResourceId::String(id) => Value::from(id.as_str()),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(value: i64) -> Self {
        ResourceId::Integer(value)
    }
}

impl From<i32> for ResourceId {
    fn from(value: i32) -> Self {
        ResourceId::Integer(value.into())
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        ResourceId::parse(value)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        ResourceId::parse(&value)
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Integer(id) => write!(f, "ResourceId({id})"),
            ResourceId::String(id) => write!(f, "ResourceId({id:?})"),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Integer(id) => write!(f, "{id}"),
            ResourceId::String(id) => f.write_str(id),
        }
    }
}
