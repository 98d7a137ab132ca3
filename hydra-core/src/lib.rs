//! Hydra is a lazy-hydration client engine for Hydra / JSON-LD REST APIs.
//!
//! Core concepts:
//! - **Resource**: A remote object loaded on first use and written back with minimal payloads
//! - **Iri**: The reference uniquely identifying a resource; keys the identity map
//! - **Client**: Owns the identity map and the collaborators, exposes the verbs
//! - **Collection**: A lazy sequence over a paginated hypermedia listing
//! - **Adapter / Serializer / IdentifierResolver / MetadataSource**: the seams
//!   to transport, encoding, routing and class descriptions
//!
//! # Example
//!
//! ```
//! use hydra_core::{
//!     Client, Context, MemoryAdapter, MetadataRegistry, ResourceType, RouteResolver, resource,
//! };
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! #[resource(class = "Thing", route = "/things")]
//! pub struct Thing {
//!     name: String,
//!     count: i64,
//! }
//!
//! let adapter = Rc::new(MemoryAdapter::new().with_document(
//!     "/things/1",
//!     json!({"@id": "/things/1", "@type": "Thing", "id": 1, "name": "a", "count": 1}),
//! ));
//! let context = Context::new(
//!     Rc::clone(&adapter),
//!     RouteResolver::new().with_type::<Thing>(),
//!     MetadataRegistry::new().with_type::<Thing>(),
//! );
//! let client = Client::new(context);
//!
//! let thing: Thing = client.get(1).unwrap();
//! assert_eq!(adapter.request_count(), 0);
//!
//! thing.set_count(2).unwrap();
//! client.put(thing.resource()).unwrap();
//! assert_eq!(adapter.last_request().unwrap().body.unwrap(), br#"{"count":2}"#);
//! ```

extern crate self as hydra_core;

mod adapter;
mod client;
mod collection;
mod config;
mod diff;
mod error;
pub mod hydra;
mod identity;
mod iri;
mod memory;
mod metadata;
mod resolver;
mod resource;
mod serializer;
mod value;

pub use adapter::{Adapter, CacheHints, Method, Request, Response, ResponseBody, WarmUpEntry};
pub use client::{Client, Context, ParsedResponse};
pub use collection::{Collection, CollectionOptions, Typed};
pub use config::{ClientConfig, CollectionDefaults};
pub use error::{AdapterError, BoxError, ClientError, SerializerError};
pub use identity::IdentityMap;
pub use iri::{Iri, ResourceId};
pub use memory::MemoryAdapter;
pub use metadata::{
    CachePolicy, CacheScope, ClassMetadata, FieldDescriptor, FieldKind, MetadataRegistry,
    MetadataSource,
};
pub use resolver::{Filters, IdentifierResolver, RouteResolver};
pub use resource::{HydrationState, Resource, ResourceType};
pub use serializer::{JsonSerializer, Operation, SerializationContext, Serializer};
pub use value::{FieldType, FieldValue, parse_datetime};

#[cfg(feature = "derive")]
pub use hydra_derive::resource;
