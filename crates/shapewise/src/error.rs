//! Caller-visible error taxonomy.

use std::fmt::{self, Display};

use shapewise_kernel::KernelError;
use shapewise_shape::ShapeError;
use shapewise_store::StoreError;
use shapewise_types::{ShapeKey, Version};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShapewiseError>;

/// Errors returned by query settings commands.
#[derive(Debug, Error)]
pub enum ShapewiseError {
    /// Another command committed between this command's read and its swap.
    ///
    /// The command had no effect. Retrying is the caller's decision.
    #[error(
        "conflicting operation in progress: configuration moved from version {expected} to {actual}"
    )]
    ConflictingOperationInProgress { expected: Version, actual: Version },

    /// Malformed representative query or settings. Detected before the
    /// configuration is read; never mutates state.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A hash-addressed update named a shape with no settings.
    #[error("no query settings exist for query shape hash {0}")]
    NotFound(ShapeKey),

    /// Loading or saving the persisted document failed.
    #[error("persistence error: {0}")]
    Persistence(#[source] StoreError),
}

impl ShapewiseError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns the stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ConflictingOperationInProgress { .. } => ErrorCode::ConflictingOperationInProgress,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Persistence(_) => ErrorCode::InternalError,
        }
    }

    /// Returns true if re-running the same command might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConflictingOperationInProgress { .. })
    }
}

impl From<ShapeError> for ShapewiseError {
    fn from(err: ShapeError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<KernelError> for ShapewiseError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::ShapeNotFound(key) => Self::NotFound(key),
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

impl From<StoreError> for ShapewiseError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { expected, actual } => {
                Self::ConflictingOperationInProgress { expected, actual }
            }
            other => Self::Persistence(other),
        }
    }
}

/// Stable, wire-level error names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConflictingOperationInProgress,
    InvalidArgument,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConflictingOperationInProgress => "ConflictingOperationInProgress",
            Self::InvalidArgument => "InvalidArgument",
            Self::NotFound => "NotFound",
            Self::InternalError => "InternalError",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_from_the_store() {
        let err: ShapewiseError = StoreError::VersionConflict {
            expected: Version::new(1),
            actual: Version::new(2),
        }
        .into();

        assert_eq!(err.code(), ErrorCode::ConflictingOperationInProgress);
        assert!(err.is_retryable());
        assert_eq!(err.code().to_string(), "ConflictingOperationInProgress");
    }

    #[test]
    fn kernel_not_found_keeps_its_key() {
        let key = ShapeKey::from_bytes([7; 32]);
        let err: ShapewiseError = KernelError::ShapeNotFound(key).into();
        assert!(matches!(err, ShapewiseError::NotFound(k) if k == key));
        assert!(!err.is_retryable());
    }

    #[test]
    fn validation_errors_are_invalid_argument() {
        let err: ShapewiseError = KernelError::EmptySettings.into();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);

        let err: ShapewiseError = ShapeError::EmptyDistinctKey.into();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }
}
