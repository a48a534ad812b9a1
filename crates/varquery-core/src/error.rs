//! Error types for varquery.
//!
//! The variants map onto four failure kinds a caller must be able to tell
//! apart: malformed criteria (caught before the registry is touched), the
//! registry rejecting a search, the registry being unreachable, and the
//! output sink failing. An empty result set is not an error and has no
//! variant here; see [`crate::search::SearchOutcome::Empty`].

use thiserror::Error;

/// Main error type for varquery.
#[derive(Debug, Error)]
pub enum VarQueryError {
    // Validation errors
    #[error("Invalid search criteria {bits:#x}: {reason}")]
    InvalidCriteria { bits: u32, reason: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Registry errors
    #[error("Registry rejected the search: {message}")]
    RegistryInvalidArgument { message: String },

    #[error("Registry transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Output errors
    #[error("Output error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Result type alias for varquery operations.
pub type Result<T> = std::result::Result<T, VarQueryError>;

/// Coarse classification of a [`VarQueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Criteria were rejected before any registry call.
    Validation,
    /// The registry refused the specification or a handle.
    RegistryInvalidArgument,
    /// The registry could not be reached or answered garbage.
    Transport,
    /// The output sink could not be written.
    Output,
}

impl From<std::io::Error> for VarQueryError {
    fn from(err: std::io::Error) -> Self {
        VarQueryError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for VarQueryError {
    fn from(err: serde_json::Error) -> Self {
        VarQueryError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl VarQueryError {
    /// Create a transport error wrapping an I/O failure on the registry link.
    pub fn transport(err: std::io::Error, context: impl std::fmt::Display) -> Self {
        VarQueryError::Transport {
            message: format!("{}: {}", context, err),
            source: Some(err),
        }
    }

    /// Create a registry rejection.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        VarQueryError::RegistryInvalidArgument {
            message: message.into(),
        }
    }

    /// Classify this error.
    ///
    /// JSON errors count as transport failures: the only JSON this crate
    /// parses during a search is the registry's wire traffic.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VarQueryError::InvalidCriteria { .. } | VarQueryError::Validation { .. } => {
                ErrorKind::Validation
            }
            VarQueryError::RegistryInvalidArgument { .. } => ErrorKind::RegistryInvalidArgument,
            VarQueryError::Transport { .. } | VarQueryError::Json { .. } => ErrorKind::Transport,
            VarQueryError::Io { .. } => ErrorKind::Output,
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32700: Parse error
    /// - -32600: Invalid Request
    /// - -32601: Method not found
    /// - -32602: Invalid params (registry rejected the search or handle)
    /// - -32603: Internal error
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            VarQueryError::InvalidCriteria { .. }
            | VarQueryError::Validation { .. }
            | VarQueryError::RegistryInvalidArgument { .. } => -32602,
            VarQueryError::Json { .. } => -32700,
            _ => -32603,
        }
    }

    /// Rebuild an error from a JSON-RPC error object received over IPC.
    pub fn from_rpc_error(code: i32, message: String) -> Self {
        match code {
            -32602 => VarQueryError::RegistryInvalidArgument { message },
            _ => VarQueryError::Transport {
                message: format!("remote error {}: {}", code, message),
                source: None,
            },
        }
    }
}
