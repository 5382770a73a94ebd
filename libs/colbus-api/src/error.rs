use std::fmt;

/// Category of a backend error. Lets callers decide between
/// failing fast and retrying without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid client or backend configuration.
    Config,
    /// Cluster or broker cannot be reached.
    Unavailable,
    /// Transient I/O failure on an established connection.
    Io,
    /// Table, family or topic does not exist.
    NotFound,
    /// Table already exists.
    AlreadyExists,
    /// Operation not allowed in the current table state.
    InvalidState,
    /// Mutation refers to a column family the table does not define.
    Schema,
    /// Malformed name or payload.
    Format,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Unavailable => f.write_str("unavailable"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::NotFound => f.write_str("not found"),
            ErrorKind::AlreadyExists => f.write_str("already exists"),
            ErrorKind::InvalidState => f.write_str("invalid state"),
            ErrorKind::Schema => f.write_str("schema"),
            ErrorKind::Format => f.write_str("format"),
        }
    }
}

/// Error returned by every backend trait method, storage and broker alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    kind: ErrorKind,
    message: String,
}

impl BackendError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Unavailable, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::NotFound, message: msg.into() }
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::AlreadyExists, message: msg.into() }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::InvalidState, message: msg.into() }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Schema, message: msg.into() }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, ErrorKind::Unavailable | ErrorKind::Io)
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

impl From<std::str::Utf8Error> for BackendError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::format(e.to_string())
    }
}
