use crate::classify::ErrorKind;
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Settings key or store key that caused the error (e.g., "cache_calls_ttl", "rate-limit.cache")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected shape, offending value)
    pub details: Option<String>,
    /// Source of the error (e.g., "settings", "file_store")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the call pipeline.
///
/// The first four variants are the outcomes a single call can end in; the rest are
/// ambient failures raised while configuring the pipeline or touching the cache store.
#[derive(Debug, Error)]
pub enum Error {
    /// A before-hook vetoed the call. No network activity happened.
    #[error("Request aborted: {reason}")]
    RequestAborted { reason: String },

    /// Replay mode is on, no fixture was recorded for this call and recording is off.
    #[error("No fixture available for call '{signature}'")]
    FixtureMissing { signature: String },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a status the classifier maps to a failure.
    #[error("Remote error: HTTP {status} ({kind}): {message}")]
    Remote {
        status: u16,
        kind: ErrorKind,
        message: String,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Cache error: {message}{}", format_context(.context))]
    Cache {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn aborted(reason: impl Into<String>) -> Self {
        Error::RequestAborted {
            reason: reason.into(),
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new cache error with structured context
    pub fn cache_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Cache {
            message: msg.into(),
            context,
        }
    }

    /// Taxonomy member of a call outcome, `None` for ambient failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::RequestAborted { .. } => Some(ErrorKind::RequestAborted),
            Error::FixtureMissing { .. } => Some(ErrorKind::FixtureMissing),
            Error::Transport(_) => Some(ErrorKind::TransportFailure),
            Error::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// HTTP status of the response that produced this error, if one was obtained.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Cache { context, .. } => Some(context),
            _ => None,
        }
    }
}
