use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use tracing::trace;

use crate::error::SerializerError;
use crate::hydra;
use crate::metadata::ClassMetadata;
use crate::value::FieldValue;

/// What a (de)serialization is performed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
        })
    }
}

/// Scopes a (de)serialization to a class and an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationContext {
    pub class: String,
    pub operation: Operation,
    /// Restricts the payload to these fields (the edited set of an update).
    pub only: Option<Vec<String>>,
}

impl SerializationContext {
    pub fn read(class: impl Into<String>) -> Self {
        SerializationContext {
            class: class.into(),
            operation: Operation::Read,
            only: None,
        }
    }

    pub fn create(class: impl Into<String>) -> Self {
        SerializationContext {
            class: class.into(),
            operation: Operation::Create,
            only: None,
        }
    }

    pub fn update(class: impl Into<String>, edited: Vec<String>) -> Self {
        SerializationContext {
            class: class.into(),
            operation: Operation::Update,
            only: Some(edited),
        }
    }

    /// Context tag, e.g. `Sport:update`.
    pub fn tag(&self) -> String {
        format!("{}:{}", self.class, self.operation)
    }

    fn admits(&self, field: &str) -> bool {
        self.only
            .as_ref()
            .is_none_or(|only| only.iter().any(|name| name == field))
    }
}

/// Converts between field tables and wire mappings.
///
/// `serialize` receives field values already encoded as JSON (nested
/// resources as references) in payload order; `deserialize` receives a
/// decoded mapping and returns the field values to store.
pub trait Serializer {
    fn serialize(
        &self,
        fields: &IndexMap<String, Value>,
        metadata: &ClassMetadata,
        context: &SerializationContext,
    ) -> Result<Vec<u8>, SerializerError>;

    fn deserialize(
        &self,
        content: &Map<String, Value>,
        metadata: &ClassMetadata,
        context: &SerializationContext,
    ) -> Result<IndexMap<String, FieldValue>, SerializerError>;
}

/// Plain JSON objects.
///
/// Writes keep writable declared fields (and the identifier on create);
/// updates are further restricted to the context's edited fields. Reads keep
/// declared fields and the identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        JsonSerializer
    }
}

impl Serializer for JsonSerializer {
    fn serialize(
        &self,
        fields: &IndexMap<String, Value>,
        metadata: &ClassMetadata,
        context: &SerializationContext,
    ) -> Result<Vec<u8>, SerializerError> {
        let mut payload = Map::new();
        for (name, value) in fields {
            let keep = match metadata.field(name) {
                Some(descriptor) => match context.operation {
                    Operation::Read => true,
                    Operation::Create | Operation::Update => descriptor.writable,
                },
                None => name == hydra::IDENTIFIER && context.operation != Operation::Update,
            };
            if keep && context.admits(name) {
                payload.insert(name.clone(), value.clone());
            } else {
                trace!(context = %context.tag(), field = %name, "field left out of payload");
            }
        }
        Ok(serde_json::to_vec(&payload)?)
    }

    fn deserialize(
        &self,
        content: &Map<String, Value>,
        metadata: &ClassMetadata,
        context: &SerializationContext,
    ) -> Result<IndexMap<String, FieldValue>, SerializerError> {
        let mut values = IndexMap::new();
        for (name, value) in content {
            if name == hydra::IDENTIFIER {
                if !matches!(value, Value::Null | Value::Number(_) | Value::String(_)) {
                    return Err(SerializerError::Decode {
                        class: context.class.clone(),
                        reason: format!("identifier must be a number or a string, got {value}"),
                    });
                }
            } else if hydra::is_meta_field(name) || !metadata.has_field(name) {
                trace!(context = %context.tag(), field = %name, "ignoring unknown field");
                continue;
            }
            values.insert(name.clone(), FieldValue::from_json(value.clone()));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldDescriptor;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn thing() -> ClassMetadata {
        ClassMetadata::new("Thing")
            .with_field("name", FieldDescriptor::string())
            .with_field("count", FieldDescriptor::integer())
            .with_field("createdAt", FieldDescriptor::datetime().read_only())
    }

    fn fields(value: Value) -> IndexMap<String, Value> {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => unreachable!(),
        }
    }

    fn encoded(bytes: Vec<u8>) -> Value {
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn create_keeps_writable_fields_and_id() {
        let payload = JsonSerializer
            .serialize(
                &fields(json!({"id": 3, "name": "a", "count": 1, "createdAt": "2024-01-01"})),
                &thing(),
                &SerializationContext::create("Thing"),
            )
            .unwrap();
        assert_eq!(encoded(payload), json!({"id": 3, "name": "a", "count": 1}));
    }

    #[test]
    fn update_only_sends_edited_fields() {
        let context = SerializationContext::update("Thing", vec!["count".into()]);
        let payload = JsonSerializer
            .serialize(
                &fields(json!({"id": 3, "name": "a", "count": 2})),
                &thing(),
                &context,
            )
            .unwrap();
        assert_eq!(String::from_utf8(payload).unwrap(), r#"{"count":2}"#);
        assert_eq!(context.tag(), "Thing:update");
    }

    #[test]
    fn payload_keeps_field_order() {
        let payload = JsonSerializer
            .serialize(
                &fields(json!({"count": 1, "name": "a"})),
                &thing(),
                &SerializationContext::create("Thing"),
            )
            .unwrap();
        assert_eq!(String::from_utf8(payload).unwrap(), r#"{"count":1,"name":"a"}"#);
    }

    #[test]
    fn read_keeps_declared_fields_and_id() {
        let content = json!({
            "@id": "/things/1",
            "@type": "Thing",
            "id": 1,
            "name": "a",
            "colour": "red"
        });
        let Value::Object(content) = content else {
            unreachable!()
        };
        let values = JsonSerializer
            .deserialize(&content, &thing(), &SerializationContext::read("Thing"))
            .unwrap();
        let names: Vec<_> = values.keys().cloned().collect();
        assert_eq!(names, ["id", "name"]);
        assert_eq!(values["id"], FieldValue::Integer(1));
    }

    #[test]
    fn malformed_identifier_is_rejected() {
        let Value::Object(content) = json!({"id": [1]}) else {
            unreachable!()
        };
        let err = JsonSerializer
            .deserialize(&content, &thing(), &SerializationContext::read("Thing"))
            .unwrap_err();
        assert!(matches!(err, SerializerError::Decode { .. }));
    }
}
