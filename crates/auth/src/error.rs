use thiserror::Error;

use tenantgate_core::{Classify, ErrorKind};

use crate::store::StoreError;

/// Outcome of a failed token lifecycle operation.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("token expired")]
    TokenExpired,

    #[error("token invalid: {0}")]
    TokenInvalid(String),

    #[error("token blacklisted")]
    TokenBlacklisted,

    /// Signature-valid refresh token that no longer matches the stored value.
    #[error("refresh token replayed or tampered")]
    TokenReplayed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable, specific code (finer grained than [`ErrorKind`]).
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "token_missing",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenInvalid(_) => "token_invalid",
            AuthError::TokenBlacklisted => "token_blacklisted",
            AuthError::TokenReplayed => "token_replayed",
            AuthError::Store(_) => "store_unavailable",
            AuthError::Internal(_) => "internal_error",
        }
    }
}

impl Classify for AuthError {
    fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_)
            | AuthError::TokenBlacklisted => ErrorKind::Authentication,
            AuthError::TokenReplayed => ErrorKind::ReplayOrTamper,
            AuthError::Store(e) => e.kind(),
            // Signing failures are faults of this process, not of the caller.
            AuthError::Internal(_) => ErrorKind::Configuration,
        }
    }
}
