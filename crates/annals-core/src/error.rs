//! Store error types.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed source error carried by [`StoreError::Internal`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a [`StoreError`], independent of its diagnostic details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request cannot be translated into a backend query.
    InvalidArgument,
    /// An optimistic-concurrency check failed, or linked events disagree on
    /// their aggregate.
    PreconditionFailed,
    /// The backend failed to prepare, execute or decode a statement.
    Internal,
}

/// Top-level error type returned by every store operation.
///
/// Each variant carries a stable diagnostic `code` alongside a human-readable
/// message.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The query references an unknown field or cannot be rendered as SQL.
    #[error("invalid argument [{code}]: {message}")]
    InvalidArgument {
        /// Stable diagnostic code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// The append was rejected because the aggregate moved on, or linked
    /// events target different aggregates.
    #[error("precondition failed [{code}]: {message}")]
    PreconditionFailed {
        /// Stable diagnostic code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// A backend failure.
    #[error("internal error [{code}]: {message}")]
    Internal {
        /// Stable diagnostic code.
        code: &'static str,
        /// Human-readable message.
        message: String,
        /// Underlying backend error, if any.
        #[source]
        source: Option<BoxError>,
    },
}

impl StoreError {
    /// Creates an [`StoreError::InvalidArgument`].
    pub fn invalid_argument(code: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            code,
            message: message.into(),
        }
    }

    /// Creates a [`StoreError::PreconditionFailed`].
    pub fn precondition_failed(code: &'static str, message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            code,
            message: message.into(),
        }
    }

    /// Creates a [`StoreError::Internal`] wrapping `source`.
    pub fn internal(
        code: &'static str,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Internal {
            code,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the taxonomy kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns the diagnostic code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { code, .. }
            | Self::PreconditionFailed { code, .. }
            | Self::Internal { code, .. } => code,
        }
    }
}
