//! Dirty-field detection for minimal updates.
//!
//! Both sides of a field are brought to a canonical JSON form before being
//! compared: references become their IRI, date-times their RFC 3339 text,
//! numbers the declared numeric type. Array fields are compared without
//! regard to element order (lists are sorted, keyed maps are sorted by key),
//! so reordering a list is not an edit.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::ClientError;
use crate::iri::ResourceId;
use crate::metadata::{FieldDescriptor, FieldKind};
use crate::resolver::IdentifierResolver;
use crate::resource::Resource;
use crate::value::{FieldValue, coerce_scalar};
use crate::{hydra, value};

/// Declared fields of `resource` whose value no longer matches the last
/// remote snapshot, in declaration order.
pub fn edited_fields(
    resource: &Resource,
    resolver: &dyn IdentifierResolver,
) -> Result<Vec<String>, ClientError> {
    let mut edited = Vec::new();
    for (name, descriptor) in resource.metadata().fields() {
        let remote = resource
            .remote_value(name)
            .map_or(Value::Null, |value| canonical_remote(descriptor, value, resolver));
        let current = match resource.stored(name) {
            Some(value) => encode_value(&value, resolver)?,
            None => Value::Null,
        };
        if encode(remote) != encode(current) {
            edited.push(name.to_string());
        }
    }
    Ok(edited)
}

/// Encodes a live value, turning nested resources into references.
pub(crate) fn encode_value(
    value: &FieldValue,
    resolver: &dyn IdentifierResolver,
) -> Result<Value, ClientError> {
    value.to_json_with(&mut |resource| {
        resolver
            .reference_of_resource(resource)
            .map(|iri| Value::String(iri.into_string()))
    })
}

/// Brings a raw server value to the form its live counterpart would encode to.
fn canonical_remote(
    descriptor: &FieldDescriptor,
    value: Value,
    resolver: &dyn IdentifierResolver,
) -> Value {
    match value {
        Value::Array(items) if descriptor.array => Value::Array(
            items
                .into_iter()
                .map(|item| canonical_item(&descriptor.kind, item, resolver))
                .collect(),
        ),
        Value::Object(entries) if descriptor.array => Value::Object(
            entries
                .into_iter()
                .map(|(key, item)| (key, canonical_item(&descriptor.kind, item, resolver)))
                .collect(),
        ),
        other => canonical_item(&descriptor.kind, other, resolver),
    }
}

fn canonical_item(kind: &FieldKind, value: Value, resolver: &dyn IdentifierResolver) -> Value {
    match kind {
        FieldKind::Json => value,
        FieldKind::Reference(class) => match value {
            Value::Object(embedded) => {
                hydra::id_of(&embedded).map_or(Value::Object(embedded), |iri| {
                    Value::String(iri.into_string())
                })
            }
            Value::String(reference) if resolver.is_reference(&reference) => {
                Value::String(reference)
            }
            other => match ResourceId::from_json(&other) {
                Some(id) => resolver
                    .reference_of(class, &id)
                    .map_or(other, |iri| Value::String(iri.into_string())),
                None => other,
            },
        },
        _ => match coerce_scalar(kind, FieldValue::from_json(value.clone())) {
            Ok(coerced) => coerced
                .to_json_with(&mut value::known_reference)
                .unwrap_or(value),
            Err(_) => value,
        },
    }
}

/// Order-insensitive encoding of array-valued fields, plain encoding otherwise.
fn encode(value: Value) -> String {
    normalize(value).to_string()
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Array(mut items) => {
            items.sort_by(compare);
            Value::Array(items)
        }
        Value::Object(entries) => {
            let mut entries: Vec<_> = entries.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(entries.into_iter().collect::<Map<_, _>>())
        }
        other => other,
    }
}

/// Total order over JSON values: by type, then numbers numerically and
/// everything else by encoding.
fn compare(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    rank(a).cmp(&rank(b)).then_with(|| match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.to_string().cmp(&b.to_string()),
    })
}
