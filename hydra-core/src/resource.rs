use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

use crate::client::{Client, ClientInner};
use crate::error::ClientError;
use crate::hydra;
use crate::iri::{Iri, ResourceId};
use crate::metadata::{ClassMetadata, FieldDescriptor, FieldKind};
use crate::serializer::SerializationContext;
use crate::value::{self, FieldType, FieldValue};

/// How much of a resource's remote state has been loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationState {
    /// No identifier yet; the resource only exists locally.
    Uninitialized,
    /// Identifier known, no field loaded.
    Identified,
    /// Some declared fields loaded.
    Partial,
    /// Every declared field loaded.
    Full,
}

/// A lazily hydrated remote resource.
///
/// Resources are handles: cloning one yields another handle to the same
/// instance, and two handles compare equal only if they point to the same
/// instance. A client hands out at most one instance per reference, see
/// [`Client::get_by_reference`].
///
/// Reading a declared field that has not been loaded fetches the resource
/// first (unless auto-hydration is disabled); writing such a field does so
/// unconditionally, so a partial write never hides an unseen remote value.
#[derive(Clone)]
pub struct Resource {
    inner: Rc<ResourceInner>,
}

struct ResourceInner {
    metadata: Rc<ClassMetadata>,
    client: Weak<ClientInner>,
    state: RefCell<State>,
    /// Depth of refreshes currently applying to this instance.
    refreshing: Cell<u32>,
    auto_hydrate: Cell<bool>,
}

#[derive(Default)]
struct State {
    id: Option<ResourceId>,
    iri: Option<Iri>,
    values: IndexMap<String, FieldValue>,
    hydrated: IndexSet<String>,
    /// Last known remote value of each field, as received.
    remote: IndexMap<String, Value>,
}

/// Marks a resource as refreshing for as long as it lives.
struct RefreshGuard<'a>(&'a Cell<u32>);

impl<'a> RefreshGuard<'a> {
    fn enter(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        RefreshGuard(depth)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl Resource {
    pub(crate) fn new(metadata: Rc<ClassMetadata>, client: Weak<ClientInner>) -> Self {
        Resource {
            inner: Rc::new(ResourceInner {
                metadata,
                client,
                state: RefCell::new(State::default()),
                refreshing: Cell::new(0),
                auto_hydrate: Cell::new(true),
            }),
        }
    }

    pub(crate) fn identified(
        metadata: Rc<ClassMetadata>,
        client: Weak<ClientInner>,
        id: ResourceId,
        iri: Iri,
    ) -> Self {
        let resource = Self::new(metadata, client);
        resource.assign(id, Some(iri));
        resource
    }

    pub fn class(&self) -> &str {
        self.inner.metadata.class()
    }

    pub fn metadata(&self) -> &ClassMetadata {
        &self.inner.metadata
    }

    /// The client this resource belongs to.
    pub fn client(&self) -> Result<Client, ClientError> {
        self.inner
            .client
            .upgrade()
            .map(Client::from_inner)
            .ok_or_else(|| ClientError::Detached(self.label()))
    }

    pub fn id(&self) -> Option<ResourceId> {
        self.inner.state.borrow().id.clone()
    }

    /// Sets the identifier. A changed identifier invalidates the known reference.
    pub fn set_id(&self, id: impl Into<ResourceId>) {
        let id = id.into();
        let mut state = self.inner.state.borrow_mut();
        if state.id.as_ref() != Some(&id) {
            state.iri = None;
        }
        state.id = Some(id);
    }

    /// The `@id` last received for this resource, if any.
    pub fn iri(&self) -> Option<Iri> {
        self.inner.state.borrow().iri.clone()
    }

    pub(crate) fn assign(&self, id: ResourceId, iri: Option<Iri>) {
        let mut state = self.inner.state.borrow_mut();
        state.id = Some(id);
        if iri.is_some() {
            state.iri = iri;
        }
    }

    /// The reference of this resource, resolved through the client.
    pub fn reference(&self) -> Result<Iri, ClientError> {
        let client = self.client()?;
        client.resolver().reference_of_resource(self)
    }

    pub fn auto_hydrate(&self) -> bool {
        self.inner.auto_hydrate.get()
    }

    /// Wraps this resource into its declared entity type.
    pub fn into_typed<T: ResourceType>(self) -> Result<T, ClientError> {
        if self.class() != T::CLASS {
            return Err(ClientError::Precondition(format!(
                "{} is a {}, not a {}",
                self.label(),
                self.class(),
                T::CLASS
            )));
        }
        Ok(T::from_resource(self))
    }

    /// Enables or disables fetching on reads of unloaded fields.
    pub fn set_auto_hydrate(&self, enabled: bool) {
        self.inner.auto_hydrate.set(enabled);
    }

    /// Whether a refresh is currently being applied to this instance.
    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.get() > 0
    }

    pub fn is_field_hydrated(&self, field: &str) -> bool {
        self.inner.state.borrow().hydrated.contains(field)
    }

    /// Whether every declared field has been loaded.
    pub fn is_hydrated(&self) -> bool {
        let state = self.inner.state.borrow();
        self.metadata()
            .fields()
            .all(|(name, _)| state.hydrated.contains(name))
    }

    pub fn hydration_state(&self) -> HydrationState {
        let state = self.inner.state.borrow();
        if state.id.is_none() {
            return HydrationState::Uninitialized;
        }
        let loaded = self
            .metadata()
            .fields()
            .filter(|(name, _)| state.hydrated.contains(*name))
            .count();
        match loaded {
            0 if self.metadata().field_count() > 0 => HydrationState::Identified,
            n if n == self.metadata().field_count() => HydrationState::Full,
            _ => HydrationState::Partial,
        }
    }

    /// The last value received from the server for `field`.
    pub fn remote_value(&self, field: &str) -> Option<Value> {
        self.inner.state.borrow().remote.get(field).cloned()
    }

    /// The stored value of `field`, without triggering hydration.
    pub(crate) fn stored(&self, field: &str) -> Option<FieldValue> {
        self.inner.state.borrow().values.get(field).cloned()
    }

    fn declared(&self, field: &str) -> Result<&FieldDescriptor, ClientError> {
        self.metadata()
            .field(field)
            .ok_or_else(|| ClientError::UndeclaredField {
                class: self.class().to_string(),
                field: field.to_string(),
            })
    }

    /// Reads a field, hydrating the resource first if the field is not loaded.
    ///
    /// The identifier is always read directly. Fields that were never loaded
    /// read as [`FieldValue::Null`].
    pub fn get(&self, field: &str) -> Result<FieldValue, ClientError> {
        if field == hydra::IDENTIFIER {
            return Ok(match self.id() {
                Some(ResourceId::Integer(id)) => FieldValue::Integer(id),
                Some(ResourceId::String(id)) => FieldValue::String(id),
                None => FieldValue::Null,
            });
        }
        self.declared(field)?;
        if self.auto_hydrate() && !self.is_refreshing() && !self.is_field_hydrated(field) {
            self.hydrate()?;
        }
        Ok(self.stored(field).unwrap_or_default())
    }

    /// Reads a field as `T`; `None` when the field is null.
    pub fn get_typed<T: FieldType>(&self, field: &str) -> Result<Option<T>, ClientError> {
        let value = self.get(field)?;
        if value.is_null() {
            return Ok(None);
        }
        let found = value.type_name();
        T::from_field(value).map(Some).ok_or_else(|| ClientError::Coercion {
            class: self.class().to_string(),
            field: field.to_string(),
            reason: format!("stored {found} does not fit the requested type"),
        })
    }

    /// Writes a field, coercing the value to its declared kind.
    ///
    /// An unloaded field forces a full hydration first. References accept a
    /// resource, a reference string, a bare id or an embedded object with `@id`.
    pub fn set(&self, field: &str, value: impl Into<FieldValue>) -> Result<(), ClientError> {
        let value = value.into();
        if field == hydra::IDENTIFIER {
            return self.set_identifier(value);
        }
        let descriptor = self.declared(field)?;
        if !self.is_refreshing() && !self.is_field_hydrated(field) {
            self.hydrate()?;
        }
        let value = self.coerce(field, descriptor, value)?;
        let mut state = self.inner.state.borrow_mut();
        state.hydrated.insert(field.to_string());
        state.values.insert(field.to_string(), value);
        Ok(())
    }

    pub fn set_typed<T: FieldType>(
        &self,
        field: &str,
        value: impl Into<Option<T>>,
    ) -> Result<(), ClientError> {
        let value = value.into().map_or(FieldValue::Null, T::into_field);
        self.set(field, value)
    }

    fn set_identifier(&self, value: FieldValue) -> Result<(), ClientError> {
        match value {
            FieldValue::Integer(id) => self.set_id(id),
            FieldValue::String(id) => self.set_id(ResourceId::parse(&id)),
            FieldValue::Null => {
                let mut state = self.inner.state.borrow_mut();
                state.id = None;
                state.iri = None;
            }
            other => {
                return Err(self.coercion(
                    hydra::IDENTIFIER,
                    format!("identifier cannot be a {}", other.type_name()),
                ));
            }
        }
        Ok(())
    }

    /// Applies server data to this resource.
    ///
    /// Every entry becomes the new remote snapshot of its field and is stored
    /// through the serializer. With `override_hydrated == false`, fields that
    /// are already loaded are left alone entirely.
    pub fn refresh(
        &self,
        data: &Map<String, Value>,
        override_hydrated: bool,
    ) -> Result<(), ClientError> {
        let client = self.client()?;
        let _guard = RefreshGuard::enter(&self.inner.refreshing);

        let mut accepted = Map::new();
        {
            let mut state = self.inner.state.borrow_mut();
            for (field, value) in data {
                if hydra::is_meta_field(field) {
                    if field == hydra::ID {
                        if let Some(iri) = value.as_str().filter(|iri| !iri.is_empty()) {
                            state.iri = Some(Iri::from(iri));
                        }
                    }
                    continue;
                }
                if !override_hydrated && state.hydrated.contains(field.as_str()) {
                    trace!(class = %self.class(), field = %field, "keeping loaded field");
                    continue;
                }
                accepted.insert(field.clone(), value.clone());
            }
        }

        let context = SerializationContext::read(self.class());
        let values = client
            .serializer()
            .deserialize(&accepted, self.metadata(), &context)?;

        for (field, value) in values {
            if field == hydra::IDENTIFIER {
                if !value.is_null() {
                    self.set_identifier(value)?;
                }
                continue;
            }
            let descriptor = self.declared(&field)?;
            let value = self.coerce(&field, descriptor, value)?;
            let remote = accepted.get(&field).cloned().unwrap_or(Value::Null);
            let mut state = self.inner.state.borrow_mut();
            state.remote.insert(field.clone(), remote);
            state.hydrated.insert(field.clone());
            state.values.insert(field, value);
        }
        Ok(())
    }

    /// Loads the resource from the server unless it is fully loaded or has no
    /// identifier. Loaded fields are kept.
    pub fn hydrate(&self) -> Result<(), ClientError> {
        if self.is_hydrated() || self.id().is_none() {
            return Ok(());
        }
        let client = self.client()?;
        let data = client.fetch_document(self)?;
        self.refresh(&data, false)?;

        // The response is the whole remote state: omitted fields are null.
        let mut state = self.inner.state.borrow_mut();
        for (name, _) in self.metadata().fields() {
            if state.hydrated.insert(name.to_string()) {
                state.remote.insert(name.to_string(), Value::Null);
            }
        }
        Ok(())
    }

    /// Hydrates from already available data, e.g. an embedded object.
    pub fn hydrate_from(&self, data: &Map<String, Value>) -> Result<(), ClientError> {
        if self.is_hydrated() || self.id().is_none() {
            return Ok(());
        }
        self.refresh(data, false)
    }

    /// Declared fields whose current value differs from the last remote one.
    pub fn edited_fields(&self) -> Result<Vec<String>, ClientError> {
        let client = self.client()?;
        crate::diff::edited_fields(self, client.resolver())
    }

    fn coerce(
        &self,
        field: &str,
        descriptor: &FieldDescriptor,
        value: FieldValue,
    ) -> Result<FieldValue, ClientError> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }
        if !descriptor.array {
            return self.coerce_item(field, &descriptor.kind, value);
        }
        match value {
            FieldValue::List(items) => items
                .into_iter()
                .map(|item| self.coerce_item(field, &descriptor.kind, item))
                .collect::<Result<_, _>>()
                .map(FieldValue::List),
            FieldValue::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| Ok((key, self.coerce_item(field, &descriptor.kind, item)?)))
                .collect::<Result<_, ClientError>>()
                .map(FieldValue::Map),
            other => Err(self.coercion(
                field,
                format!("cannot set a non-array value ({})", other.type_name()),
            )),
        }
    }

    fn coerce_item(
        &self,
        field: &str,
        kind: &FieldKind,
        value: FieldValue,
    ) -> Result<FieldValue, ClientError> {
        let FieldKind::Reference(class) = kind else {
            return value::coerce_scalar(kind, value).map_err(|reason| self.coercion(field, reason));
        };
        let client = self.client()?;
        let resource = match value {
            FieldValue::Null => return Ok(FieldValue::Null),
            FieldValue::Resource(resource) => resource,
            FieldValue::Integer(id) => client.get_by_class_and_id(class, id, false)?,
            FieldValue::String(id) => {
                client.get_by_class_and_id(class, ResourceId::parse(&id), false)?
            }
            FieldValue::Map(entries) => {
                let Value::Object(embedded) =
                    FieldValue::Map(entries).to_json_with(&mut value::known_reference)?
                else {
                    return Err(self.coercion(field, "embedded object expected".into()));
                };
                let resource = match hydra::id_of(&embedded) {
                    Some(iri) => client.get_by_reference(iri, false)?,
                    None => {
                        let id = embedded
                            .get(hydra::IDENTIFIER)
                            .and_then(ResourceId::from_json)
                            .ok_or_else(|| {
                                self.coercion(field, "embedded object has no @id".into())
                            })?;
                        client.get_by_class_and_id(class, id, false)?
                    }
                };
                resource.hydrate_from(&embedded)?;
                resource
            }
            other => {
                return Err(self.coercion(
                    field,
                    format!("a {} cannot reference {class}", other.type_name()),
                ));
            }
        };
        Ok(FieldValue::Resource(resource))
    }

    fn coercion(&self, field: &str, reason: String) -> ClientError {
        ClientError::Coercion {
            class: self.class().to_string(),
            field: field.to_string(),
            reason,
        }
    }

    fn label(&self) -> String {
        let state = self.inner.state.borrow();
        match (&state.iri, &state.id) {
            (Some(iri), _) => iri.to_string(),
            (None, Some(id)) => format!("{}#{id}", self.class()),
            (None, None) => format!("{} (new)", self.class()),
        }
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Resource {}

// Field values are left out: resources may reference each other in cycles.
impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Resource")
            .field("class", &self.class())
            .field("id", &state.id)
            .field("iri", &state.iri)
            .field("hydrated", &state.hydrated.len())
            .finish()
    }
}

/// A typed entity declared with `#[resource]`.
///
/// The generated type wraps a [`Resource`] and exposes one accessor pair per
/// declared field.
pub trait ResourceType: Sized {
    const CLASS: &'static str;
    /// Route prefix of the class, e.g. `/sports`.
    const ROUTE: &'static str;

    fn metadata() -> ClassMetadata;

    fn from_resource(resource: Resource) -> Self;

    fn resource(&self) -> &Resource;
}
