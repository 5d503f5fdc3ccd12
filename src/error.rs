//! Error types shared across the SDK.

use thiserror::Error;

use crate::db::entities::mapping::SyncDirection;

/// Errors surfaced by sync, credential, and persistence operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// An access token could not be obtained or refreshed.
    #[error("credential error: {reason}")]
    Credential { reason: String },

    /// A remote API call failed, either with a non-zero application error
    /// code in the response body or with a transport failure (code 0).
    #[error("remote api error {code}: {message}")]
    RemoteApi { code: i64, message: String },

    /// A mapping record failed required-field validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The record's sync direction is not implemented.
    #[error("sync direction {0:?} is not supported")]
    UnsupportedMode(SyncDirection),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl SyncError {
    /// Wraps a transport-level failure of a remote CRUD call.
    pub(crate) fn remote_transport(err: reqwest::Error) -> Self {
        SyncError::RemoteApi {
            code: 0,
            message: format!("transport failure: {err}"),
        }
    }
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SyncError>;
