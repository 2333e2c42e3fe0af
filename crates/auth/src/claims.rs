use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantgate_core::{RoleCode, TenantId, TokenId, UserId};

/// Which half of a token pair a JWT belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Identity claims embedded in both the access and the refresh token.
///
/// The two tokens of a pair carry identical claims except for `exp`.
/// Claims are immutable once signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub tenant_id: TenantId,
    pub user_id: UserId,

    /// Primary role the session was issued for.
    pub role_id: RoleCode,

    /// All role codes granted at issuance (informational; policy is re-read).
    #[serde(default)]
    pub roles: Vec<RoleCode>,

    pub token_id: TokenId,

    /// Issued-at, seconds since epoch.
    pub iat: i64,

    /// Not-before, seconds since epoch.
    pub nbf: i64,

    /// Expiration, seconds since epoch.
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl IdentityClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp(self.iat)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }

    /// Session-index key owner.
    pub fn session_owner(&self) -> (&TenantId, &UserId) {
        (&self.tenant_id, &self.user_id)
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the claim time window against one `now`.
///
/// `leeway` widens the window on both sides; zero means no grace period.
/// Signature verification happens in [`crate::TokenCodec`] before this runs.
pub fn validate_claims(
    claims: &IdentityClaims,
    now: DateTime<Utc>,
    leeway: Duration,
) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    let leeway = leeway.num_seconds();
    if now + leeway < claims.iat.max(claims.nbf) {
        return Err(TokenValidationError::NotYetValid);
    }
    if now - leeway >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_at(iat: i64, exp: i64) -> IdentityClaims {
        IdentityClaims {
            tenant_id: TenantId::from("acme"),
            user_id: UserId::from("u1"),
            role_id: RoleCode::from("editor"),
            roles: vec![RoleCode::from("editor")],
            token_id: TokenId::generate(),
            iat,
            nbf: iat,
            exp,
            iss: None,
        }
    }

    #[test]
    fn expiry_is_exclusive_without_leeway() {
        let claims = claims_at(1_000, 2_000);
        let at = |s| timestamp(s);

        assert_eq!(validate_claims(&claims, at(1_999), Duration::zero()), Ok(()));
        assert_eq!(
            validate_claims(&claims, at(2_000), Duration::zero()),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(validate_claims(&claims, at(2_004), Duration::seconds(5)), Ok(()));
    }

    #[test]
    fn future_tokens_are_rejected() {
        let claims = claims_at(1_000, 2_000);
        assert_eq!(
            validate_claims(&claims, timestamp(999), Duration::zero()),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let claims = claims_at(2_000, 2_000);
        assert_eq!(
            validate_claims(&claims, timestamp(1_500), Duration::zero()),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
