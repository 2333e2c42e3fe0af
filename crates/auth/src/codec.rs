//! Stateless signing/verification of bearer tokens (HS256).
//!
//! Access and refresh tokens are signed with distinct secrets, so a token of
//! one kind never verifies as the other.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::claims::{IdentityClaims, TokenKind, TokenValidationError, validate_claims};
use crate::error::AuthError;

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

pub struct TokenCodec {
    access: SigningKeys,
    refresh: SigningKeys,
    issuer: Option<String>,
    leeway: Duration,
}

impl TokenCodec {
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access: SigningKeys::from_secret(access_secret),
            refresh: SigningKeys::from_secret(refresh_secret),
            issuer: None,
            leeway: Duration::zero(),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn encode(&self, kind: TokenKind, claims: &IdentityClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys(kind).encoding)
            .map_err(|e| AuthError::Internal(format!("failed to sign {kind} token: {e}")))
    }

    /// Verify signature and algorithm, then the time window against `now`.
    pub fn decode(
        &self,
        kind: TokenKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<IdentityClaims, AuthError> {
        // Expiry is checked below against the caller's single `now`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        match &self.issuer {
            Some(issuer) => {
                // A token without `iss` must not slip past a configured issuer.
                validation.set_required_spec_claims(&["exp", "iss"]);
                validation.set_issuer(&[issuer]);
            }
            None => validation.set_required_spec_claims(&["exp"]),
        }

        let data = decode::<IdentityClaims>(token, &self.keys(kind).decoding, &validation)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;

        validate_claims(&data.claims, now, self.leeway).map_err(|e| match e {
            TokenValidationError::Expired => AuthError::TokenExpired,
            other => AuthError::TokenInvalid(other.to_string()),
        })?;

        Ok(data.claims)
    }
}

/// Strip the `Bearer` scheme (case-insensitive, any surrounding whitespace).
///
/// A bare token without scheme is accepted as-is. The scheme must be
/// followed by whitespace; `Bearerxyz` is not a bearer credential.
pub fn strip_bearer(header: &str) -> Result<&str, AuthError> {
    let header = header.trim();
    let token = match header.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim_start(),
        None if header.eq_ignore_ascii_case("bearer") => "",
        _ if header.len() >= 6 && header.as_bytes()[..6].eq_ignore_ascii_case(b"bearer") => {
            return Err(AuthError::TokenInvalid("malformed bearer scheme".into()));
        }
        _ => header,
    };
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
