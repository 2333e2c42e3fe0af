//! Strongly-typed identifiers used across the trust boundary.

use core::str::FromStr;
use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Reserved tenant domain hosting shared role/permission templates.
pub const DEFAULT_TENANT: &str = "default";

/// Reserved administrative role, only meaningful inside [`DEFAULT_TENANT`].
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid {0}: {1}")]
    Malformed(&'static str, String),
}

/// Identifier of a tenant (also the policy domain).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Cow<'static, str>);

/// Identifier of a user (the policy subject).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Cow<'static, str>);

/// Role code used in grouping and policy tuples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleCode(Cow<'static, str>);

macro_rules! impl_str_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(value: impl Into<Cow<'static, str>>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&'static str> for $t {
            fn from(value: &'static str) -> Self {
                Self(Cow::Borrowed(value))
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(Cow::Owned(value))
            }
        }

        impl FromStr for $t {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                if s.is_empty() {
                    return Err(IdError::Empty($name));
                }
                Ok(Self(Cow::Owned(s.to_string())))
            }
        }
    };
}

impl_str_newtype!(TenantId, "TenantId");
impl_str_newtype!(UserId, "UserId");
impl_str_newtype!(RoleCode, "RoleCode");

impl TenantId {
    /// The reserved template domain.
    pub fn default_domain() -> Self {
        Self(Cow::Borrowed(DEFAULT_TENANT))
    }

    pub fn is_default_domain(&self) -> bool {
        self.as_str() == DEFAULT_TENANT
    }
}

impl RoleCode {
    pub fn super_admin() -> Self {
        Self(Cow::Borrowed(SUPER_ADMIN_ROLE))
    }
}

/// Session handle shared by an access/refresh pair; the unit of revocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(Uuid);

impl TokenId {
    /// Fresh random identifier (UUIDv4, 122 bits of entropy).
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for TokenId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TokenId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s).map_err(|e| IdError::Malformed("TokenId", e.to_string()))?;
        Ok(Self(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ids_are_rejected() {
        assert_eq!(TenantId::from_str("  "), Err(IdError::Empty("TenantId")));
        assert_eq!("acme".parse::<TenantId>().unwrap(), TenantId::from("acme"));
    }

    #[test]
    fn token_ids_are_unique_and_parse_back() {
        let a = TokenId::generate();
        let b = TokenId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<TokenId>().unwrap(), a);
        assert!("not-a-uuid".parse::<TokenId>().is_err());
    }

    #[test]
    fn default_domain_is_reserved() {
        assert!(TenantId::default_domain().is_default_domain());
        assert!(!TenantId::from("acme").is_default_domain());
    }
}
