use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The value type of a declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Boolean,
    String,
    /// RFC 3339 date-time with offset.
    DateTime,
    /// Nested resource of the named class, resolved through the identity map.
    Reference(String),
    /// Free-form JSON kept as-is.
    Json,
}

/// Describes one declared field of a resource class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    /// The field holds a list or keyed map of `kind` values.
    pub array: bool,
    /// The field is sent on create and update.
    pub writable: bool,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind) -> Self {
        FieldDescriptor {
            kind,
            array: false,
            writable: true,
        }
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn datetime() -> Self {
        Self::new(FieldKind::DateTime)
    }

    pub fn json() -> Self {
        Self::new(FieldKind::Json)
    }

    pub fn reference(class: impl Into<String>) -> Self {
        Self::new(FieldKind::Reference(class.into()))
    }

    /// Turns the descriptor into an array-of descriptor.
    pub fn array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Excludes the field from create and update payloads.
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FieldKind::Reference(_))
    }

    /// The class a reference field points to.
    pub fn reference_class(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Reference(class) => Some(class),
            _ => None,
        }
    }
}

/// Who may share a persistently cached response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    #[default]
    Private,
    Public,
}

/// Persistent caching rules of a resource class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePolicy {
    pub enabled: bool,
    pub scope: CacheScope,
    pub ttl: Duration,
    /// Load the whole class into the identity map during cache warm-up.
    pub warmup: bool,
}

impl CachePolicy {
    /// An enabled policy with the given time-to-live.
    pub fn enabled(ttl: Duration) -> Self {
        CachePolicy {
            enabled: true,
            scope: CacheScope::Private,
            ttl,
            warmup: false,
        }
    }

    pub fn public(mut self) -> Self {
        self.scope = CacheScope::Public;
        self
    }

    pub fn with_warmup(mut self) -> Self {
        self.warmup = true;
        self
    }

    /// Warm-up only makes sense for classes whose responses are cached.
    pub fn is_warmup_eligible(&self) -> bool {
        self.enabled && self.warmup
    }
}

/// Field table and cache policy of one resource class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMetadata {
    class: String,
    fields: IndexMap<String, FieldDescriptor>,
    cache: CachePolicy,
}

impl ClassMetadata {
    pub fn new(class: impl Into<String>) -> Self {
        ClassMetadata {
            class: class.into(),
            fields: IndexMap::new(),
            cache: CachePolicy::default(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Looks up a declared field. The identifier is not a declared field.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(name, d)| (name.as_str(), d))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn cache(&self) -> &CachePolicy {
        &self.cache
    }
}

/// Per-class metadata lookup.
pub trait MetadataSource {
    fn class_metadata(&self, class: &str) -> Option<&ClassMetadata>;

    /// Every known class, in registration order.
    fn classes(&self) -> Vec<&ClassMetadata>;

    fn fields_of(&self, class: &str) -> Option<Vec<(&str, &FieldDescriptor)>> {
        self.class_metadata(class).map(|m| m.fields().collect())
    }

    fn cache_policy_of(&self, class: &str) -> Option<&CachePolicy> {
        self.class_metadata(class).map(|m| m.cache())
    }
}

/// An in-memory metadata table.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    classes: IndexMap<String, ClassMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metadata: ClassMetadata) {
        self.classes.insert(metadata.class().to_string(), metadata);
    }

    pub fn with(mut self, metadata: ClassMetadata) -> Self {
        self.register(metadata);
        self
    }

    /// Registers the metadata generated for a `#[resource]` type.
    pub fn with_type<T: crate::ResourceType>(self) -> Self {
        self.with(T::metadata())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl MetadataSource for MetadataRegistry {
    fn class_metadata(&self, class: &str) -> Option<&ClassMetadata> {
        self.classes.get(class)
    }

    fn classes(&self) -> Vec<&ClassMetadata> {
        self.classes.values().collect()
    }
}
