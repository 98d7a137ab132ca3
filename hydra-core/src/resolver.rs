use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::ClientError;
use crate::iri::{Iri, ResourceId};
use crate::resource::Resource;

/// RFC 3986 unreserved characters stay as-is, everything else is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Maps between resource references and (class, id) pairs.
pub trait IdentifierResolver {
    fn reference_of(&self, class: &str, id: &ResourceId) -> Result<Iri, ClientError>;

    fn class_and_id_of(&self, iri: &Iri) -> Result<(String, ResourceId), ClientError>;

    /// The listing reference of a class, narrowed by `filters`.
    fn collection_reference_of(&self, class: &str, filters: &Filters) -> Result<Iri, ClientError>;

    /// Whether `value` already is a reference rather than a bare id.
    fn is_reference(&self, value: &str) -> bool;

    /// The reference of a live resource.
    fn reference_of_resource(&self, resource: &Resource) -> Result<Iri, ClientError> {
        if let Some(iri) = resource.iri() {
            return Ok(iri);
        }
        let id = resource.id().ok_or_else(|| {
            ClientError::Precondition(format!(
                "{} has no identifier, it must be created first",
                resource.class()
            ))
        })?;
        self.reference_of(resource.class(), &id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterValue {
    One(String),
    Many(Vec<String>),
}

/// Query filters of a collection request, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    entries: IndexMap<String, FilterValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// `key=value`
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries
            .insert(key.into(), FilterValue::One(value.to_string()));
        self
    }

    /// `key[]=a&key[]=b`
    pub fn with_any<I>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.entries.insert(key.into(), FilterValue::Many(values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            let key = utf8_percent_encode(key, COMPONENT).to_string();
            match value {
                FilterValue::One(v) => {
                    pairs.push(format!("{key}={}", utf8_percent_encode(v, COMPONENT)));
                }
                FilterValue::Many(values) => {
                    for v in values {
                        pairs.push(format!("{key}[]={}", utf8_percent_encode(v, COMPONENT)));
                    }
                }
            }
        }
        pairs.join("&")
    }
}

/// Resolver over a table of `class → route prefix`, e.g. `Sport → /sports`.
///
/// Item references are `{route}/{id}`; listings are `{route}?{filters}`.
#[derive(Debug, Clone, Default)]
pub struct RouteResolver {
    routes: IndexMap<String, String>,
}

impl RouteResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, class: impl Into<String>, route: impl Into<String>) -> Self {
        let route = route.into();
        self.routes
            .insert(class.into(), route.trim_end_matches('/').to_string());
        self
    }

    /// Registers the route declared on a `#[resource]` type.
    pub fn with_type<T: crate::ResourceType>(self) -> Self {
        self.route(T::CLASS, T::ROUTE)
    }

    fn route_of(&self, class: &str) -> Result<&str, ClientError> {
        self.routes
            .get(class)
            .map(String::as_str)
            .ok_or_else(|| ClientError::Configuration(format!("no route registered for {class}")))
    }

    /// Finds the longest route that `path` is a direct item of.
    fn match_item<'a>(&'a self, path: &'a str) -> Option<(&'a str, &'a str)> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        self.routes
            .iter()
            .filter_map(|(class, route)| {
                let segment = path.strip_prefix(route.as_str())?.strip_prefix('/')?;
                (!segment.is_empty() && !segment.contains('/'))
                    .then_some((class.as_str(), route.len(), segment))
            })
            .max_by_key(|(_, len, _)| *len)
            .map(|(class, _, segment)| (class, segment))
    }
}

impl IdentifierResolver for RouteResolver {
    fn reference_of(&self, class: &str, id: &ResourceId) -> Result<Iri, ClientError> {
        let route = self.route_of(class)?;
        let id = id.to_string();
        Ok(Iri::new(format!("{route}/{}", utf8_percent_encode(&id, COMPONENT))))
    }

    fn class_and_id_of(&self, iri: &Iri) -> Result<(String, ResourceId), ClientError> {
        let (class, segment) = self
            .match_item(iri.as_str())
            .ok_or_else(|| ClientError::InvalidReference(iri.to_string()))?;
        let segment = percent_decode_str(segment)
            .decode_utf8()
            .map_err(|_| ClientError::InvalidReference(iri.to_string()))?;
        Ok((class.to_string(), ResourceId::parse(&segment)))
    }

    fn collection_reference_of(&self, class: &str, filters: &Filters) -> Result<Iri, ClientError> {
        let route = self.route_of(class)?;
        if filters.is_empty() {
            Ok(Iri::new(route))
        } else {
            Ok(Iri::new(format!("{route}?{}", filters.to_query_string())))
        }
    }

    fn is_reference(&self, value: &str) -> bool {
        value.starts_with('/') && self.match_item(value).is_some()
    }
}
