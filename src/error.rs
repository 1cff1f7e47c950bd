//! Error types and error handling strategy for streamsieve.
//!
//! Errors are explicit and typed: every failure carries an [`ErrorKind`],
//! an optional human-readable message, and an optional source error. The
//! heap primitives themselves return `bool`/`Option` and never construct
//! errors; the façade and the service layer translate their outcomes into
//! the kinds below.

use core::fmt;
use std::io;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A caller-supplied argument was rejected (e.g. capacity < 1).
    InvalidArgument,
    /// A read or remove was attempted on an empty filter.
    EmptyFilter,
    /// An invariant the core cannot localize was violated. Must not
    /// happen in a correct build; surfaced for diagnostics.
    Internal,
    /// Construction was attempted with an unrecognized heap variant.
    UnsupportedVariant,
    /// Configuration was rejected during validation.
    Config,
    /// An I/O failure in the service layer.
    Io,
    /// A malformed or unexpected wire frame.
    Protocol,
}

impl ErrorKind {
    /// Returns the wire-level name for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid-argument",
            Self::EmptyFilter => "empty-filter",
            Self::Internal => "internal",
            Self::UnsupportedVariant => "unsupported-variant",
            Self::Config => "config",
            Self::Io => "io",
            Self::Protocol => "protocol",
        }
    }

    /// Returns true if a caller may reasonably retry the operation
    /// after state changes (e.g. the filter receives items).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::EmptyFilter | Self::Io)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "invalid-argument" => Ok(Self::InvalidArgument),
            "empty-filter" => Ok(Self::EmptyFilter),
            "internal" => Ok(Self::Internal),
            "unsupported-variant" => Ok(Self::UnsupportedVariant),
            "config" => Ok(Self::Config),
            "io" => Ok(Self::Io),
            "protocol" => Ok(Self::Protocol),
            _ => Err(()),
        }
    }
}

/// The main error type for streamsieve operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns true if this error reports an empty filter.
    #[must_use]
    pub const fn is_empty_filter(&self) -> bool {
        matches!(self.kind, ErrorKind::EmptyFilter)
    }

    /// Creates an empty-filter error.
    #[must_use]
    pub fn empty_filter() -> Self {
        Self::new(ErrorKind::EmptyFilter).with_message("filter is empty")
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_message(detail)
    }

    /// Creates an unsupported-variant error naming the offending variant.
    #[must_use]
    pub fn unsupported_variant(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedVariant)
            .with_message(format!("unknown heap variant: {}", name.into()))
    }

    /// Creates an internal error (a bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Creates a protocol error for a malformed wire frame.
    #[must_use]
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(ErrorKind::Io)
            .with_message(e.to_string())
            .with_source(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Protocol)
            .with_message(e.to_string())
            .with_source(e)
    }
}

/// A specialized Result type for streamsieve operations.
pub type Result<T> = core::result::Result<T, Error>;
