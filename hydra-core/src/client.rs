use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, instrument, trace};

use crate::adapter::{Adapter, CacheHints, Method, Request, Response, WarmUpEntry};
use crate::collection::{Collection, CollectionOptions, Typed};
use crate::config::ClientConfig;
use crate::diff;
use crate::error::ClientError;
use crate::hydra;
use crate::identity::IdentityMap;
use crate::iri::{Iri, ResourceId};
use crate::metadata::{ClassMetadata, MetadataSource};
use crate::resolver::{Filters, IdentifierResolver};
use crate::resource::{Resource, ResourceType};
use crate::serializer::{JsonSerializer, SerializationContext, Serializer};

/// The collaborators a client works with.
pub struct Context {
    pub adapter: Box<dyn Adapter>,
    pub serializer: Box<dyn Serializer>,
    pub resolver: Box<dyn IdentifierResolver>,
    pub metadata: Box<dyn MetadataSource>,
}

impl Context {
    /// A context using [`JsonSerializer`].
    pub fn new(
        adapter: impl Adapter + 'static,
        resolver: impl IdentifierResolver + 'static,
        metadata: impl MetadataSource + 'static,
    ) -> Self {
        Context {
            adapter: Box::new(adapter),
            serializer: Box::new(JsonSerializer),
            resolver: Box::new(resolver),
            metadata: Box::new(metadata),
        }
    }

    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Box::new(serializer);
        self
    }
}

/// What a response turned out to contain.
#[derive(Debug)]
pub enum ParsedResponse {
    Resource(Resource),
    Collection(Collection),
}

/// Entry point of the engine: identity map, verbs and cache warm-up.
///
/// A client is a cheap handle; clones share one session. Every resource and
/// collection it hands out reaches the collaborators through it, and there is
/// at most one [`Resource`] per reference for the life of the session.
///
/// # Example
///
/// ```
/// use hydra_core::{Client, ClassMetadata, Context, FieldDescriptor, MemoryAdapter, MetadataRegistry, RouteResolver};
/// use serde_json::json;
///
/// let adapter = MemoryAdapter::new()
///     .with_document("/things/1", json!({"@id": "/things/1", "@type": "Thing", "id": 1, "count": 1}));
/// let metadata = MetadataRegistry::new()
///     .with(ClassMetadata::new("Thing").with_field("count", FieldDescriptor::integer()));
/// let client = Client::new(Context::new(adapter, RouteResolver::new().route("Thing", "/things"), metadata));
///
/// let thing = client.get_by_reference("/things/1", false).unwrap();
/// assert_eq!(thing, client.get_by_reference("/things/1", false).unwrap());
/// assert_eq!(thing.get("count").unwrap().as_i64(), Some(1));
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Rc<ClientInner>,
}

pub(crate) struct ClientInner {
    context: Context,
    config: ClientConfig,
    identity: RefCell<IdentityMap>,
    classes: RefCell<HashMap<String, Rc<ClassMetadata>>>,
    warmed_up: Cell<bool>,
}

impl Client {
    pub fn new(context: Context) -> Self {
        Self::with_config(context, ClientConfig::default())
    }

    pub fn with_config(context: Context, config: ClientConfig) -> Self {
        Client {
            inner: Rc::new(ClientInner {
                context,
                config,
                identity: RefCell::new(IdentityMap::new()),
                classes: RefCell::new(HashMap::new()),
                warmed_up: Cell::new(false),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ClientInner>) -> Self {
        Client { inner }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn adapter(&self) -> &dyn Adapter {
        self.inner.context.adapter.as_ref()
    }

    pub fn serializer(&self) -> &dyn Serializer {
        self.inner.context.serializer.as_ref()
    }

    pub fn resolver(&self) -> &dyn IdentifierResolver {
        self.inner.context.resolver.as_ref()
    }

    pub fn metadata_source(&self) -> &dyn MetadataSource {
        self.inner.context.metadata.as_ref()
    }

    /// Collection options built from the configured defaults.
    pub fn collection_options(&self) -> CollectionOptions {
        let defaults = self.inner.config.collections;
        CollectionOptions {
            execution_cache: defaults.execution_cache,
            load_all: false,
            auto_hydrate: defaults.auto_hydrate,
        }
    }

    /// Shared metadata of `class`; unknown classes are a configuration error.
    fn class_metadata(&self, class: &str) -> Result<Rc<ClassMetadata>, ClientError> {
        if let Some(metadata) = self.inner.classes.borrow().get(class) {
            return Ok(Rc::clone(metadata));
        }
        let metadata = self
            .metadata_source()
            .class_metadata(class)
            .cloned()
            .map(Rc::new)
            .ok_or_else(|| ClientError::Configuration(format!("no metadata for class {class}")))?;
        self.inner
            .classes
            .borrow_mut()
            .insert(class.to_string(), Rc::clone(&metadata));
        Ok(metadata)
    }

    /// Number of resources in the identity map.
    pub fn len(&self) -> usize {
        self.inner.identity.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.identity.borrow().is_empty()
    }

    /// Whether this exact instance is registered in the identity map.
    pub fn contains(&self, resource: &Resource) -> bool {
        self.inner.identity.borrow().contains(resource)
    }

    /// A fresh, uninitialized resource of `class`, to be sent with [`Client::post`].
    pub fn create(&self, class: &str) -> Result<Resource, ClientError> {
        let metadata = self.class_metadata(class)?;
        Ok(Resource::new(metadata, Rc::downgrade(&self.inner)))
    }

    /// The resource registered under `iri`, created un-hydrated on first use.
    ///
    /// With `auto_hydrate`, the resource is loaded before being returned.
    pub fn get_by_reference(
        &self,
        iri: impl Into<Iri>,
        auto_hydrate: bool,
    ) -> Result<Resource, ClientError> {
        self.lookup(iri.into(), auto_hydrate)
    }

    #[instrument(level = "debug", skip(self))]
    fn lookup(&self, iri: Iri, auto_hydrate: bool) -> Result<Resource, ClientError> {
        self.warm_up_on_first_use()?;

        let known = self.inner.identity.borrow().get(&iri);
        let resource = match known {
            Some(resource) => {
                trace!("identity map hit");
                resource
            }
            None => {
                let (class, id) = self.resolver().class_and_id_of(&iri)?;
                let metadata = self.class_metadata(&class)?;
                let resource =
                    Resource::identified(metadata, Rc::downgrade(&self.inner), id, iri.clone());
                self.inner.identity.borrow_mut().insert(iri, resource)
            }
        };
        if auto_hydrate {
            resource.hydrate()?;
        }
        Ok(resource)
    }

    /// Looks a resource up by class and id. The id may already be a reference.
    pub fn get_by_class_and_id(
        &self,
        class: &str,
        id: impl Into<ResourceId>,
        auto_hydrate: bool,
    ) -> Result<Resource, ClientError> {
        let iri = self.reference_for(class, id.into())?;
        self.lookup(iri, auto_hydrate)
    }

    fn reference_for(&self, class: &str, id: ResourceId) -> Result<Iri, ClientError> {
        match id {
            ResourceId::String(reference) if self.resolver().is_reference(&reference) => {
                Ok(Iri::from(reference))
            }
            id => self.resolver().reference_of(class, &id),
        }
    }

    /// The listing of `class` narrowed by `filters`.
    ///
    /// Nothing is fetched unless `options.load_all` is set, in which case every
    /// page is fetched before returning.
    #[instrument(level = "debug", skip(self))]
    pub fn get_collection(
        &self,
        class: &str,
        filters: &Filters,
        options: CollectionOptions,
    ) -> Result<Collection, ClientError> {
        self.warm_up_on_first_use()?;
        let first = self.resolver().collection_reference_of(class, filters)?;
        self.open_collection(Some(class.to_string()), first, options)
    }

    /// A collection starting at an explicit listing reference.
    pub fn get_collection_from(
        &self,
        class: Option<&str>,
        first: impl Into<Iri>,
        options: CollectionOptions,
    ) -> Result<Collection, ClientError> {
        self.warm_up_on_first_use()?;
        self.open_collection(class.map(str::to_string), first.into(), options)
    }

    fn open_collection(
        &self,
        class: Option<String>,
        first: Iri,
        options: CollectionOptions,
    ) -> Result<Collection, ClientError> {
        let mut collection = Collection::new(self.clone(), class, Some(first), options);
        if options.load_all {
            collection.load_all()?;
        }
        Ok(collection)
    }

    /// Sends the edited fields of `resource` and refreshes it from the response.
    ///
    /// Nothing is sent when no writable field was edited.
    #[instrument(level = "debug", skip_all, fields(class = %resource.class()))]
    pub fn put(&self, resource: &Resource) -> Result<Resource, ClientError> {
        let iri = self
            .resolver()
            .reference_of_resource(resource)
            .ok()
            .filter(|iri| self.inner.identity.borrow().is_registered(iri, resource))
            .ok_or_else(|| {
                ClientError::Precondition(format!(
                    "{} must be registered before update",
                    resource.class()
                ))
            })?;

        let metadata = resource.metadata();
        let edited: Vec<String> = diff::edited_fields(resource, self.resolver())?
            .into_iter()
            .filter(|field| metadata.field(field).is_some_and(|d| d.writable))
            .collect();
        if edited.is_empty() {
            trace!(%iri, "nothing writable edited");
            return Ok(resource.clone());
        }

        let fields = self.payload_fields(resource, Some(&edited))?;
        let context = SerializationContext::update(resource.class(), edited);
        let body = self
            .serializer()
            .serialize(&fields, resource.metadata(), &context)?;
        debug!(%iri, fields = ?context.only, "sending update");
        let content = self
            .adapter()
            .call(Request::new(Method::Put, iri).with_body(body))?
            .into_content("update a resource")?;
        resource.refresh(&content, true)?;
        Ok(resource.clone())
    }

    /// Creates `resource` remotely, adopts the returned identity and registers it.
    #[instrument(level = "debug", skip_all, fields(class = %resource.class()))]
    pub fn post(&self, resource: &Resource) -> Result<Resource, ClientError> {
        let fields = self.payload_fields(resource, None)?;
        let context = SerializationContext::create(resource.class());
        let body = self
            .serializer()
            .serialize(&fields, resource.metadata(), &context)?;
        let target = self
            .resolver()
            .collection_reference_of(resource.class(), &Filters::new())?;
        debug!(%target, "sending create");
        let content = self
            .adapter()
            .call(Request::new(Method::Post, target).with_body(body))?
            .into_content("create a resource")?;

        let iri = hydra::id_of(&content);
        let id = content
            .get(hydra::IDENTIFIER)
            .and_then(ResourceId::from_json)
            .or_else(|| {
                let iri = iri.as_ref()?;
                self.resolver().class_and_id_of(iri).ok().map(|(_, id)| id)
            })
            .ok_or_else(|| {
                ClientError::Protocol("created resource came back without an identifier".into())
            })?;
        resource.assign(id, iri);
        resource.refresh(&content, true)?;

        let iri = self.resolver().reference_of_resource(resource)?;
        let shadowed = self
            .inner
            .identity
            .borrow_mut()
            .replace(iri.clone(), resource.clone());
        if shadowed.is_some_and(|previous| previous != *resource) {
            debug!(%iri, "created resource replaces an instance of the identity map");
        }
        Ok(resource.clone())
    }

    /// Deletes `resource` remotely and forgets it.
    pub fn delete(&self, resource: &Resource) -> Result<(), ClientError> {
        let iri = self.resolver().reference_of_resource(resource)?;
        self.delete_reference(iri)
    }

    /// Deletes the resource of `class` with `id` remotely and forgets it.
    pub fn delete_by_id(&self, class: &str, id: impl Into<ResourceId>) -> Result<(), ClientError> {
        let iri = self.reference_for(class, id.into())?;
        self.delete_reference(iri)
    }

    #[instrument(level = "debug", skip(self))]
    fn delete_reference(&self, iri: Iri) -> Result<(), ClientError> {
        self.adapter()
            .call(Request::new(Method::Delete, iri.clone()))?;
        self.inner.identity.borrow_mut().remove(&iri);
        Ok(())
    }

    /// Whether the cache warm-up already ran for this client.
    pub fn is_warmed_up(&self) -> bool {
        self.inner.warmed_up.get()
    }

    /// Preloads every warm-up eligible class into the identity map.
    ///
    /// Runs at most once per client; later calls return immediately.
    pub fn cache_warm_up(&self) -> Result<(), ClientError> {
        if self.inner.warmed_up.replace(true) {
            return Ok(());
        }
        let batch: Vec<WarmUpEntry<'_>> = self
            .metadata_source()
            .classes()
            .into_iter()
            .filter(|metadata| metadata.cache().is_warmup_eligible())
            .map(|metadata| {
                let class = metadata.class().to_string();
                let ttl = metadata.cache().ttl;
                let fetch_class = class.clone();
                WarmUpEntry {
                    class,
                    ttl,
                    fetch: Box::new(move || {
                        let options = CollectionOptions::default()
                            .load_all()
                            .without_execution_cache();
                        self.get_collection(&fetch_class, &Filters::new(), options)
                            .map(drop)
                    }),
                }
            })
            .collect();
        if batch.is_empty() {
            trace!("no class to warm up");
            return Ok(());
        }

        debug!(classes = batch.len(), "warming up cache");
        for response in self.adapter().warm_up(batch)? {
            self.parse_response(response)?;
        }
        Ok(())
    }

    fn warm_up_on_first_use(&self) -> Result<(), ClientError> {
        if self.inner.config.warm_up_on_first_use && !self.is_warmed_up() {
            self.cache_warm_up()?;
        }
        Ok(())
    }

    /// Turns a response into the resource or collection it carries.
    ///
    /// Responses that are not JSON, or carry no `@type`, yield nothing.
    pub fn parse_response(&self, response: Response) -> Result<Option<ParsedResponse>, ClientError> {
        let Some(content) = response.content() else {
            return Ok(None);
        };
        if hydra::type_of(content).is_none() {
            return Ok(None);
        }
        if hydra::is_collection(content) {
            return Collection::from_page(self.clone(), content)
                .map(|collection| Some(ParsedResponse::Collection(collection)));
        }
        let iri = hydra::id_of(content).ok_or_else(|| {
            ClientError::Protocol("response is neither an object nor a collection".into())
        })?;
        let resource = self.lookup(iri, false)?;
        resource.refresh(content, true)?;
        Ok(Some(ParsedResponse::Resource(resource)))
    }

    /// GETs the document of `resource`, with cache hints from its class policy.
    pub(crate) fn fetch_document(&self, resource: &Resource) -> Result<Map<String, Value>, ClientError> {
        let iri = self.resolver().reference_of_resource(resource)?;
        let hints = CacheHints::from_policy(resource.metadata().cache());
        debug!(%iri, "hydrating");
        self.adapter()
            .call(Request::get(iri).with_cache(hints))?
            .into_content("hydrate a resource")
    }

    /// Encodes the stored fields of `resource` in declaration order, the
    /// identifier first. `only` keeps the named fields.
    fn payload_fields(
        &self,
        resource: &Resource,
        only: Option<&[String]>,
    ) -> Result<IndexMap<String, Value>, ClientError> {
        let mut fields = IndexMap::new();
        if only.is_none() {
            if let Some(id) = resource.id() {
                fields.insert(hydra::IDENTIFIER.to_string(), id.to_json());
            }
        }
        for (name, _) in resource.metadata().fields() {
            if only.is_some_and(|only| !only.iter().any(|field| field == name)) {
                continue;
            }
            let Some(value) = resource.stored(name) else {
                continue;
            };
            fields.insert(name.to_string(), diff::encode_value(&value, self.resolver())?);
        }
        Ok(fields)
    }

    /// The entity of type `T` with `id`, un-hydrated until first read.
    pub fn get<T: ResourceType>(&self, id: impl Into<ResourceId>) -> Result<T, ClientError> {
        self.get_by_class_and_id(T::CLASS, id, false)?.into_typed()
    }

    /// The entities of type `T` matching `filters`.
    pub fn find<T: ResourceType>(&self, filters: &Filters) -> Result<Typed<T>, ClientError> {
        let collection = self.get_collection(T::CLASS, filters, self.collection_options())?;
        Ok(collection.typed())
    }

    /// A fresh, uninitialized `T`.
    pub fn create_typed<T: ResourceType>(&self) -> Result<T, ClientError> {
        self.create(T::CLASS)?.into_typed()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("resources", &self.len())
            .field("warmed_up", &self.is_warmed_up())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
