use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, WranglerError>;

/// Everything a wrangle can fail with. Precondition variants are raised
/// before any post is written.
#[derive(Debug, Error)]
pub enum WranglerError {
    #[error("{entity} with ID {id} doesn't exist")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    InvalidMerge(String),

    #[error("{0}")]
    InvalidAttach(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    SelfTarget(String),

    #[error("{0}")]
    SystemMessageIneligible(String),

    /// Rejected by the configured policy.
    #[error("{0}")]
    NotAllowed(String),

    #[error("{0}")]
    InvalidCommand(String),

    /// The write phase failed; `post_ids` lists every post the operation was
    /// writing so an operator can reconcile them.
    #[error("{operation} did not complete ({reason}); affected posts: {}", .post_ids.join(", "))]
    PartialFailure {
        operation: &'static str,
        post_ids: Vec<String>,
        reason: String,
    },

    #[error("temporary storage failure: {0}")]
    TransientIo(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WranglerError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Errors caused by the request itself rather than by the server.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            Self::PartialFailure { .. } | Self::TransientIo(_) | Self::Internal(_)
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidMerge(_) => "INVALID_MERGE",
            Self::InvalidAttach(_) => "INVALID_ATTACH",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::SelfTarget(_) => "SELF_TARGET",
            Self::SystemMessageIneligible(_) => "SYSTEM_MESSAGE_INELIGIBLE",
            Self::NotAllowed(_) => "NOT_ALLOWED",
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::PartialFailure { .. } => "PARTIAL_FAILURE",
            Self::TransientIo(_) => "TRANSIENT_IO",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for WranglerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(reason) => Self::TransientIo(reason),
            StoreError::Backend(e) => Self::Internal(format!("{:#}", e)),
        }
    }
}
