use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.servers", "batch[2][1]")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "event_decoder", "session_client")
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

/// Unified error type for the relay session runtime
#[derive(Debug, Error)]
pub enum Error {
    /// An explicit server selection was outside the pool. Fatal to that call only.
    #[error("Server index {index} out of range (pool has {len} servers)")]
    ServerIndexOutOfRange { index: usize, len: usize },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// The responder instance already has a request in flight.
    #[error("Responder is already processing a message")]
    Busy,

    #[error("Decode error: {message}{}", format_context(.context))]
    Decode {
        message: String,
        context: ErrorContext,
    },

    /// A backend explicitly refused to answer (e.g. a `DENIED` body).
    #[error("Backend rejected the request: {message}")]
    Rejected { message: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
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
    /// Create a new runtime error
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::runtime_with_context(msg, ErrorContext::new())
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new decode error with structured context
    pub fn decode_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Decode {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a backend rejection
    pub fn rejected(msg: impl Into<String>) -> Self {
        Error::Rejected {
            message: msg.into(),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Decode { context, .. }
            | Error::Configuration { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True for network-level failures that tear the session down.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
