use thiserror::Error;

/// Boxed error used to carry collaborator failures across trait objects.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the client engine.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("{class}::{field} is not a declared field")]
    UndeclaredField { class: String, field: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot set {class}::{field}: {reason}")]
    Coercion {
        class: String,
        field: String,
        reason: String,
    },

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("resource {0} is detached from its client")]
    Detached(String),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("serializer error: {0}")]
    Serializer(#[from] SerializerError),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Returns true for caller mistakes (unregistered PUT, undeclared field, ...).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ClientError::Precondition(_) | ClientError::UndeclaredField { .. }
        )
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, ClientError::Protocol(_))
    }
}

/// Errors reported by an [`Adapter`](crate::Adapter).
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("warm-up fetch for {class} failed: {source}")]
    WarmUp {
        class: String,
        #[source]
        source: BoxError,
    },
}

impl AdapterError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AdapterError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors reported by a [`Serializer`](crate::Serializer).
#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot encode {class}: {reason}")]
    Encode { class: String, reason: String },

    #[error("cannot decode {class}: {reason}")]
    Decode { class: String, reason: String },
}
