//! Error taxonomy shared by the token, policy and isolation subsystems.
//!
//! Each subsystem keeps its own `thiserror` enum; this module only fixes the
//! five categories the request gate maps to transport responses.

use serde::Serialize;

/// Category of a trust-boundary failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid signature, malformed, expired or blacklisted credential.
    Authentication,
    /// A refresh token that no longer matches the stored value.
    ReplayOrTamper,
    /// Policy evaluated to deny. A normal negative outcome.
    AuthorizationDenied,
    /// Store/network failure. Retryable with backoff.
    Infrastructure,
    /// Flow or programming error (e.g. missing tenant in default isolation).
    Configuration,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication_failed",
            ErrorKind::ReplayOrTamper => "replay_or_tamper",
            ErrorKind::AuthorizationDenied => "authorization_denied",
            ErrorKind::Infrastructure => "infrastructure_error",
            ErrorKind::Configuration => "configuration_error",
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Infrastructure)
    }

    /// Expected traffic (auth outcomes) as opposed to faults worth an error log.
    pub fn is_expected(self) -> bool {
        matches!(
            self,
            ErrorKind::Authentication | ErrorKind::ReplayOrTamper | ErrorKind::AuthorizationDenied
        )
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// Implemented by every error that can cross the trust boundary.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_infrastructure_is_retryable() {
        let all = [
            ErrorKind::Authentication,
            ErrorKind::ReplayOrTamper,
            ErrorKind::AuthorizationDenied,
            ErrorKind::Infrastructure,
            ErrorKind::Configuration,
        ];
        let retryable: Vec<_> = all.iter().filter(|k| k.is_retryable()).collect();
        assert_eq!(retryable, vec![&ErrorKind::Infrastructure]);
    }

    #[test]
    fn codes_are_distinct() {
        let codes: std::collections::HashSet<_> = [
            ErrorKind::Authentication,
            ErrorKind::ReplayOrTamper,
            ErrorKind::AuthorizationDenied,
            ErrorKind::Infrastructure,
            ErrorKind::Configuration,
        ]
        .iter()
        .map(|k| k.code())
        .collect();
        assert_eq!(codes.len(), 5);
        assert_eq!(
            serde_json::to_value(ErrorKind::ReplayOrTamper).unwrap(),
            serde_json::json!("replay_or_tamper")
        );
    }
}
