//! Hydra / JSON-LD vocabulary as consumed by the engine.

use serde_json::{Map, Value};

use crate::iri::Iri;

pub const TYPE: &str = "@type";
pub const ID: &str = "@id";
pub const CONTEXT: &str = "@context";
pub const COLLECTION: &str = "hydra:Collection";
pub const MEMBER: &str = "hydra:member";
pub const VIEW: &str = "hydra:view";
pub const NEXT: &str = "hydra:next";
pub const TOTAL_ITEMS: &str = "hydra:totalItems";

/// Plain identifier field carried next to `@id`.
pub const IDENTIFIER: &str = "id";

/// JSON-LD keywords (`@id`, `@type`, ...) are bookkeeping, never fields.
pub fn is_meta_field(name: &str) -> bool {
    name.starts_with('@')
}

pub fn type_of(document: &Map<String, Value>) -> Option<&str> {
    document.get(TYPE).and_then(Value::as_str)
}

/// The collection discriminator, accepting the compact form used by Hydra 3.
pub fn is_collection(document: &Map<String, Value>) -> bool {
    matches!(type_of(document), Some(COLLECTION | "Collection"))
}

pub fn id_of(document: &Map<String, Value>) -> Option<Iri> {
    match document.get(ID) {
        Some(Value::String(iri)) if !iri.is_empty() => Some(Iri::new(iri.as_str())),
        _ => None,
    }
}

pub fn next_page(document: &Map<String, Value>) -> Option<Iri> {
    document
        .get(VIEW)
        .and_then(|view| view.get(NEXT))
        .and_then(Value::as_str)
        .filter(|next| !next.is_empty())
        .map(Iri::from)
}

pub fn members(document: &Map<String, Value>) -> &[Value] {
    document
        .get(MEMBER)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn total_items(document: &Map<String, Value>) -> Option<u64> {
    document.get(TOTAL_ITEMS).and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn collection_page() {
        let page = object(json!({
            "@type": "hydra:Collection",
            "hydra:member": [{"@id": "/sports/1"}, {"@id": "/sports/2"}],
            "hydra:totalItems": 5,
            "hydra:view": {"@id": "/sports?page=1", "hydra:next": "/sports?page=2"}
        }));
        assert!(is_collection(&page));
        assert_eq!(members(&page).len(), 2);
        assert_eq!(total_items(&page), Some(5));
        assert_eq!(next_page(&page), Some(Iri::from("/sports?page=2")));
    }

    #[test]
    fn last_page_has_no_next() {
        let page = object(json!({"@type": "Collection", "hydra:view": {"@id": "/x?page=3"}}));
        assert!(is_collection(&page));
        assert!(members(&page).is_empty());
        assert_eq!(next_page(&page), None);
    }

    #[test]
    fn object_identity() {
        let doc = object(json!({"@type": "Sport", "@id": "/sports/1", "id": 1}));
        assert!(!is_collection(&doc));
        assert_eq!(id_of(&doc), Some(Iri::from("/sports/1")));
        assert!(id_of(&object(json!({"@id": ""}))).is_none());
        assert!(is_meta_field("@context"));
        assert!(!is_meta_field("name"));
    }
}
