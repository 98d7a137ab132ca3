use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::adapter::{Adapter, Method, Request, Response, WarmUpEntry};
use crate::error::{AdapterError, ClientError};
use crate::hydra;

/// An in-memory API.
///
/// Serves stored JSON documents by target, applies PUT/POST/DELETE to them
/// and records every request it receives. Useful for testing and as a
/// reference implementation.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    documents: RefCell<IndexMap<String, Value>>,
    raw: RefCell<HashMap<String, (String, Vec<u8>)>>,
    warm: RefCell<HashMap<String, Vec<Response>>>,
    journal: RefCell<Vec<Request>>,
    warm_ups: Cell<usize>,
    next_id: Cell<i64>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, target: impl Into<String>, document: Value) -> Self {
        self.insert(target, document);
        self
    }

    /// Serves `bytes` with a non-JSON content type at `target`.
    pub fn with_raw(
        self,
        target: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.raw
            .borrow_mut()
            .insert(target.into(), (content_type.into(), bytes));
        self
    }

    /// Answers the warm-up of `class` with `responses` instead of fetching it,
    /// as a persistent cache hit would.
    pub fn with_warm_responses(self, class: impl Into<String>, responses: Vec<Response>) -> Self {
        self.warm.borrow_mut().insert(class.into(), responses);
        self
    }

    /// Identifier handed to the next created resource (defaults to 1).
    pub fn with_next_id(self, id: i64) -> Self {
        self.next_id.set(id);
        self
    }

    pub fn insert(&self, target: impl Into<String>, document: Value) {
        self.documents.borrow_mut().insert(target.into(), document);
    }

    pub fn document(&self, target: &str) -> Option<Value> {
        self.documents.borrow().get(target).cloned()
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.journal.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.journal.borrow().len()
    }

    /// Number of requests received with `method`.
    pub fn count(&self, method: Method) -> usize {
        self.journal
            .borrow()
            .iter()
            .filter(|request| request.method == method)
            .count()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.journal.borrow().last().cloned()
    }

    pub fn clear_requests(&self) {
        self.journal.borrow_mut().clear();
    }

    /// Number of warm-up batches received.
    pub fn warm_ups(&self) -> usize {
        self.warm_ups.get()
    }

    fn not_found(target: &str) -> AdapterError {
        AdapterError::Status {
            status: 404,
            message: format!("{target} not found"),
        }
    }

    fn body_object(request: &Request) -> Result<Map<String, Value>, AdapterError> {
        match request.json_body() {
            Some(Value::Object(body)) => Ok(body),
            _ => Err(AdapterError::Status {
                status: 400,
                message: format!("{} {} expects a JSON object body", request.method, request.target),
            }),
        }
    }

    fn allocate_id(&self) -> i64 {
        let id = self.next_id.get().max(1);
        self.next_id.set(id + 1);
        id
    }
}

impl Adapter for MemoryAdapter {
    fn call(&self, request: Request) -> Result<Response, AdapterError> {
        self.journal.borrow_mut().push(request.clone());
        let target = request.target.as_str();

        match request.method {
            Method::Get => {
                if let Some((content_type, bytes)) = self.raw.borrow().get(target) {
                    return Ok(Response::raw(200, content_type.clone(), bytes.clone()));
                }
                self.document(target)
                    .map(|document| Response::json(200, document))
                    .ok_or_else(|| Self::not_found(target))
            }
            Method::Put => {
                let body = Self::body_object(&request)?;
                let mut documents = self.documents.borrow_mut();
                let document = documents
                    .get_mut(target)
                    .and_then(Value::as_object_mut)
                    .ok_or_else(|| Self::not_found(target))?;
                document.extend(body);
                Ok(Response::json(200, Value::Object(document.clone())))
            }
            Method::Post => {
                let body = Self::body_object(&request)?;
                let collection = target.split('?').next().unwrap_or_default();
                let id = match body.get(hydra::IDENTIFIER) {
                    Some(id @ (Value::Number(_) | Value::String(_))) => id.clone(),
                    _ => Value::from(self.allocate_id()),
                };
                let iri = match &id {
                    Value::String(id) => format!("{collection}/{id}"),
                    other => format!("{collection}/{other}"),
                };
                let mut document = Map::new();
                document.insert(hydra::ID.to_string(), Value::String(iri.clone()));
                document.insert(hydra::IDENTIFIER.to_string(), id);
                for (key, value) in body {
                    document.entry(key).or_insert(value);
                }
                let document = Value::Object(document);
                self.insert(iri, document.clone());
                Ok(Response::json(201, document))
            }
            Method::Delete => {
                self.documents
                    .borrow_mut()
                    .shift_remove(target)
                    .map(|_| Response::empty(204))
                    .ok_or_else(|| Self::not_found(target))
            }
        }
    }

    fn warm_up(&self, batch: Vec<WarmUpEntry<'_>>) -> Result<Vec<Response>, AdapterError> {
        self.warm_ups.set(self.warm_ups.get() + 1);
        let mut responses = Vec::new();
        for entry in batch {
            let cached = self.warm.borrow().get(&entry.class).cloned();
            match cached {
                Some(cached) => responses.extend(cached),
                None => {
                    let class = entry.class;
                    (entry.fetch)().map_err(|e: ClientError| AdapterError::WarmUp {
                        class,
                        source: Box::new(e),
                    })?;
                }
            }
        }
        Ok(responses)
    }
}
