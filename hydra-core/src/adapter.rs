use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::error::{AdapterError, ClientError};
use crate::iri::Iri;
use crate::metadata::{CachePolicy, CacheScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// Persistent-cache instructions attached to a GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHints {
    pub scope: CacheScope,
    pub ttl: Duration,
}

impl CacheHints {
    /// Hints for a class policy, `None` when caching is disabled.
    pub fn from_policy(policy: &CachePolicy) -> Option<Self> {
        policy.enabled.then(|| CacheHints {
            scope: policy.scope,
            ttl: policy.ttl,
        })
    }
}

/// One call handed to the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub target: Iri,
    pub body: Option<Vec<u8>>,
    pub cache: Option<CacheHints>,
    /// Whether the adapter may answer from its per-session response cache.
    pub execution_cache: bool,
}

impl Request {
    pub fn new(method: Method, target: Iri) -> Self {
        Request {
            method,
            target,
            body: None,
            cache: None,
            execution_cache: true,
        }
    }

    pub fn get(target: Iri) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cache(mut self, cache: Option<CacheHints>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_execution_cache(mut self, enabled: bool) -> Self {
        self.execution_cache = enabled;
        self
    }

    /// The body decoded as JSON, if it is JSON.
    pub fn json_body(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// A JSON body, already decoded by the adapter.
    Json(Value),
    Raw { content_type: String, bytes: Vec<u8> },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: ResponseBody,
}

impl Response {
    pub fn json(status: u16, content: Value) -> Self {
        Response {
            status,
            body: ResponseBody::Json(content),
        }
    }

    pub fn raw(status: u16, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Response {
            status,
            body: ResponseBody::Raw {
                content_type: content_type.into(),
                bytes,
            },
        }
    }

    pub fn empty(status: u16) -> Self {
        Response {
            status,
            body: ResponseBody::Empty,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.body, ResponseBody::Json(_))
    }

    /// The JSON object carried by the response, if any.
    pub fn content(&self) -> Option<&Map<String, Value>> {
        match &self.body {
            ResponseBody::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Takes the JSON object out of the response; anything else is a protocol error.
    pub fn into_content(self, action: &str) -> Result<Map<String, Value>, ClientError> {
        match self.body {
            ResponseBody::Json(Value::Object(map)) => Ok(map),
            ResponseBody::Json(_) => Err(ClientError::Protocol(format!(
                "cannot {action} with a JSON response that is not an object"
            ))),
            ResponseBody::Raw { content_type, .. } => Err(ClientError::Protocol(format!(
                "cannot {action} with a non-JSON response ({content_type})"
            ))),
            ResponseBody::Empty => Err(ClientError::Protocol(format!(
                "cannot {action} with an empty response"
            ))),
        }
    }
}

/// One class to preload during cache warm-up.
pub struct WarmUpEntry<'a> {
    pub class: String,
    pub ttl: Duration,
    /// Materializes the whole class through the client.
    pub fetch: Box<dyn FnOnce() -> Result<(), ClientError> + 'a>,
}

impl fmt::Debug for WarmUpEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmUpEntry")
            .field("class", &self.class)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Transport seam of the client.
///
/// Adapters own everything below the engine: HTTP, TLS, retries, response
/// decoding and response caching. Non-success statuses are reported as
/// [`AdapterError::Status`].
pub trait Adapter {
    fn call(&self, request: Request) -> Result<Response, AdapterError>;

    /// Preloads a batch of classes, returning responses to feed back into the
    /// client (e.g. served from a persistent cache).
    ///
    /// The default has no persistent cache: it runs every fetch and returns
    /// nothing, since fetching already populates the identity map.
    fn warm_up(&self, batch: Vec<WarmUpEntry<'_>>) -> Result<Vec<Response>, AdapterError> {
        for entry in batch {
            let class = entry.class;
            (entry.fetch)().map_err(|e| AdapterError::WarmUp {
                class,
                source: Box::new(e),
            })?;
        }
        Ok(Vec::new())
    }
}

/// Shared adapters: lets callers keep a handle on an adapter owned by a client.
impl<A: Adapter + ?Sized> Adapter for Rc<A> {
    fn call(&self, request: Request) -> Result<Response, AdapterError> {
        (**self).call(request)
    }

    fn warm_up(&self, batch: Vec<WarmUpEntry<'_>>) -> Result<Vec<Response>, AdapterError> {
        (**self).warm_up(batch)
    }
}
