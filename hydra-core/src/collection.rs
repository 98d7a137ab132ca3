use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::adapter::{CacheHints, Request};
use crate::client::Client;
use crate::error::ClientError;
use crate::hydra;
use crate::iri::Iri;
use crate::resource::{Resource, ResourceType};

/// How a collection fetches and hands out its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Allow the adapter to answer page requests from its session cache.
    pub execution_cache: bool,
    /// Fetch every page before returning the collection.
    pub load_all: bool,
    /// Auto-hydration setting applied to every yielded resource.
    ///
    /// Yielded resources are the shared instances of the identity map, so
    /// the setting also applies to handles obtained elsewhere.
    pub auto_hydrate: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        CollectionOptions {
            execution_cache: true,
            load_all: false,
            auto_hydrate: true,
        }
    }
}

impl CollectionOptions {
    pub fn load_all(mut self) -> Self {
        self.load_all = true;
        self
    }

    pub fn without_execution_cache(mut self) -> Self {
        self.execution_cache = false;
        self
    }

    pub fn without_auto_hydrate(mut self) -> Self {
        self.auto_hydrate = false;
        self
    }
}

/// A hypermedia listing as a lazy, forward-only sequence of resources.
///
/// Pages are fetched on demand while iterating, following `hydra:next`.
/// Members go through the client's identity map, so an item that is already
/// known is yielded as that same instance. The iterator stops for good after
/// the first error, once the valid items of the failing page were yielded.
pub struct Collection {
    client: Client,
    class: Option<String>,
    next: Option<Iri>,
    pending: VecDeque<Resource>,
    execution_cache: bool,
    auto_hydrate: bool,
    page_limit: Option<usize>,
    pages: usize,
    total_items: Option<u64>,
    error: Option<ClientError>,
    failed: bool,
}

impl Collection {
    /// A collection starting at `first`. Nothing is fetched yet.
    pub(crate) fn new(
        client: Client,
        class: Option<String>,
        first: Option<Iri>,
        options: CollectionOptions,
    ) -> Self {
        let page_limit = client.config().page_limit;
        Collection {
            client,
            class,
            next: first,
            pending: VecDeque::new(),
            execution_cache: options.execution_cache,
            auto_hydrate: options.auto_hydrate,
            page_limit,
            pages: 0,
            total_items: None,
            error: None,
            failed: false,
        }
    }

    /// A collection whose first page was already received.
    pub(crate) fn from_page(client: Client, page: &Map<String, Value>) -> Result<Self, ClientError> {
        let options = client.collection_options();
        let mut collection = Collection::new(client, None, None, options);
        collection.pages = 1;
        collection.absorb(page)?;
        Ok(collection)
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Caps the number of pages fetched; going past it is a protocol error.
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// `hydra:totalItems` of the last page seen, if announced.
    pub fn total_items(&self) -> Option<u64> {
        self.total_items
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Whether another page remains to be fetched.
    pub fn has_next_page(&self) -> bool {
        self.next.is_some()
    }

    /// Fetches every remaining page; iteration then runs from memory.
    pub fn load_all(&mut self) -> Result<(), ClientError> {
        while let Some(next) = self.next.take() {
            if let Err(e) = self.fetch_page(next) {
                self.failed = true;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Yields the items as `T`.
    pub fn typed<T: ResourceType>(self) -> Typed<T> {
        Typed {
            inner: self,
            _marker: PhantomData,
        }
    }

    fn fetch_page(&mut self, iri: Iri) -> Result<(), ClientError> {
        if let Some(limit) = self.page_limit {
            if self.pages >= limit {
                return Err(ClientError::Protocol(format!(
                    "collection page {iri} exceeds the limit of {limit} pages"
                )));
            }
        }
        self.pages += 1;

        let hints = self
            .class
            .as_deref()
            .and_then(|class| self.client.metadata_source().cache_policy_of(class))
            .and_then(CacheHints::from_policy);
        debug!(%iri, page = self.pages, "fetching collection page");
        let request = Request::get(iri)
            .with_cache(hints)
            .with_execution_cache(self.execution_cache);
        let page = self
            .client
            .adapter()
            .call(request)?
            .into_content("read a collection page")?;
        self.absorb(&page)
    }

    /// Queues the members of `page`. A bad member does not hide the others:
    /// every valid member is queued and the first error is returned after.
    fn absorb(&mut self, page: &Map<String, Value>) -> Result<(), ClientError> {
        if let Some(total) = hydra::total_items(page) {
            self.total_items = Some(total);
        }
        let mut first_error = None;
        for member in hydra::members(page) {
            match self.member(member) {
                Ok(Some(resource)) => {
                    resource.set_auto_hydrate(self.auto_hydrate);
                    self.pending.push_back(resource);
                }
                Ok(None) => warn!(member = %member, "skipping malformed collection member"),
                Err(e) => {
                    warn!(member = %member, error = %e, "collection member failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        self.next = hydra::next_page(page);
        Ok(())
    }

    fn member(&self, member: &Value) -> Result<Option<Resource>, ClientError> {
        match member {
            Value::String(iri) => self.client.get_by_reference(iri.as_str(), false).map(Some),
            Value::Object(data) => {
                let iri = hydra::id_of(data).ok_or_else(|| {
                    ClientError::Protocol("collection member without @id".into())
                })?;
                let resource = self.client.get_by_reference(iri, false)?;
                resource.hydrate_from(data)?;
                Ok(Some(resource))
            }
            _ => Ok(None),
        }
    }
}

impl Iterator for Collection {
    type Item = Result<Resource, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(resource) = self.pending.pop_front() {
                return Some(Ok(resource));
            }
            if let Some(e) = self.error.take() {
                self.failed = true;
                return Some(Err(e));
            }
            if self.failed {
                return None;
            }
            let next = self.next.take()?;
            if let Err(e) = self.fetch_page(next) {
                // Items queued before the failure are yielded first.
                self.error = Some(e);
            }
        }
    }
}

impl std::iter::FusedIterator for Collection {}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("class", &self.class)
            .field("next", &self.next)
            .field("pending", &self.pending.len())
            .field("pages", &self.pages)
            .field("total_items", &self.total_items)
            .finish_non_exhaustive()
    }
}

/// A [`Collection`] yielding typed entities.
pub struct Typed<T> {
    inner: Collection,
    _marker: PhantomData<T>,
}

impl<T> Typed<T> {
    pub fn total_items(&self) -> Option<u64> {
        self.inner.total_items()
    }

    pub fn into_inner(self) -> Collection {
        self.inner
    }
}

impl<T: ResourceType> Iterator for Typed<T> {
    type Item = Result<T, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|item| item.and_then(|resource| resource.into_typed()))
    }
}
