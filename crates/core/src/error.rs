//! Error types for s3tree-core
//!
//! A single error enum covers configuration, transport, storage and local
//! failures. Callers that need to branch on the category use [`Error::kind`].

use thiserror::Error;

/// Result type alias for s3tree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any network call (bad input, missing flags)
    Configuration,
    /// Raised locally by the transport policy (read-only guard, cancellation)
    Transport,
    /// Reported by the object store for a listing or a single object
    Storage,
    /// Local filesystem or task failures
    Local,
}

/// Error type for s3tree operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation needs an object key but none was given
    #[error("missing key")]
    MissingKey,

    /// Whole-bucket mutation attempted without the force flag
    #[error("force required: use --force to operate on the whole bucket")]
    ForceRequired,

    /// Path could not be parsed or resolved
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Request rejected by the read-only guard
    #[error("blocked by read-only mode: {method} is not a safe method")]
    ReadOnly { method: String },

    /// Operation was cancelled before it completed
    #[error("operation cancelled")]
    Cancelled,

    /// Object or bucket not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication or authorization failure
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Network or dispatch failure talking to the store
    #[error("Network error: {0}")]
    Network(String),

    /// Store answered with an error status
    #[error("Storage error: {message} (status {status})")]
    Service { status: u16, message: String },

    /// Store accepted the request but reported a failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Classify the error into one of the four handling categories
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_)
            | Error::MissingKey
            | Error::ForceRequired
            | Error::InvalidPath(_)
            | Error::TomlParse(_) => ErrorKind::Configuration,
            Error::ReadOnly { .. } | Error::Cancelled => ErrorKind::Transport,
            Error::NotFound(_)
            | Error::Auth(_)
            | Error::Network(_)
            | Error::Service { .. }
            | Error::Storage(_) => ErrorKind::Storage,
            Error::Io(_) | Error::General(_) => ErrorKind::Local,
        }
    }

    /// Recover an error that travelled through an `io::Error`.
    ///
    /// Body readers can only report `io::Error`; when one wraps an s3tree
    /// error (for example a cancelled rate limiter) the original is returned.
    pub fn from_io(err: std::io::Error) -> Error {
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(inner) = inner.downcast::<Error>() {
                    return *inner;
                }
            }
            return Error::General("unrecoverable wrapped error".to_string());
        }
        Error::Io(err)
    }

    /// Rebuild an equivalent error for reporting from a shared reference.
    ///
    /// `Io` errors keep their kind and message only.
    pub fn duplicate(&self) -> Error {
        match self {
            Error::Config(m) => Error::Config(m.clone()),
            Error::MissingKey => Error::MissingKey,
            Error::ForceRequired => Error::ForceRequired,
            Error::InvalidPath(m) => Error::InvalidPath(m.clone()),
            Error::ReadOnly { method } => Error::ReadOnly {
                method: method.clone(),
            },
            Error::Cancelled => Error::Cancelled,
            Error::NotFound(m) => Error::NotFound(m.clone()),
            Error::Auth(m) => Error::Auth(m.clone()),
            Error::Network(m) => Error::Network(m.clone()),
            Error::Service { status, message } => Error::Service {
                status: *status,
                message: message.clone(),
            },
            Error::Storage(m) => Error::Storage(m.clone()),
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
            Error::TomlParse(e) => Error::Config(e.to_string()),
            Error::General(m) => Error::General(m.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::MissingKey.kind(), ErrorKind::Configuration);
        assert_eq!(Error::ForceRequired.kind(), ErrorKind::Configuration);
        assert_eq!(
            Error::ReadOnly {
                method: "PUT".into()
            }
            .kind(),
            ErrorKind::Transport
        );
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Transport);
        assert_eq!(Error::Network("x".into()).kind(), ErrorKind::Storage);
        assert_eq!(
            Error::Service {
                status: 503,
                message: "SlowDown".into()
            }
            .kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            Error::Io(std::io::Error::other("disk")).kind(),
            ErrorKind::Local
        );
    }

    #[test]
    fn test_read_only_message() {
        let err = Error::ReadOnly {
            method: "DELETE".into(),
        };
        assert!(err.to_string().starts_with("blocked by read-only mode"));
    }

    #[test]
    fn test_from_io_unwraps_inner_error() {
        let wrapped = std::io::Error::other(Error::Cancelled);
        assert!(matches!(Error::from_io(wrapped), Error::Cancelled));

        let plain = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(Error::from_io(plain), Error::Io(_)));
    }

    #[test]
    fn test_duplicate_keeps_io_kind() {
        let err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        match err.duplicate() {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("unexpected {other:?}"),
        }
    }
}
