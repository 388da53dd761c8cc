//! Tenant identifier type.
//!
//! This module defines the [`TenantId`] type. Tenant identifiers are
//! case-insensitive at the edge: every constructor trims surrounding
//! whitespace and lowercases the value, so `" Acme "` and `"acme"` name the
//! same tenant and the same storage keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{StorageError, StorageResult, ValidationError};

/// Character that separates key segments in the document store.
const KEY_SEPARATOR: char = ':';

/// A normalized tenant identifier.
///
/// # Examples
///
/// ```
/// use acl_directory::tenant::TenantId;
///
/// let tenant = TenantId::new("  ACME ");
/// assert_eq!(tenant.as_str(), "acme");
/// ```
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant ID, trimming and lowercasing the input.
    ///
    /// This constructor does not reject empty or malformed identifiers; use
    /// [`TenantId::parse`] for values that come from outside the process.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_lowercase())
    }

    /// Creates a tenant ID from untrusted input.
    ///
    /// # Errors
    ///
    /// * `ValidationError::InvalidTenantId` - If the normalized value is empty
    ///   or contains the key separator `:`.
    ///
    /// # Examples
    ///
    /// ```
    /// use acl_directory::tenant::TenantId;
    ///
    /// assert!(TenantId::parse("Acme").is_ok());
    /// assert!(TenantId::parse("   ").is_err());
    /// assert!(TenantId::parse("acme:rulesets").is_err());
    /// ```
    pub fn parse(id: &str) -> StorageResult<Self> {
        let tenant = Self::new(id);
        if tenant.0.is_empty() || tenant.0.contains(KEY_SEPARATOR) {
            return Err(StorageError::Validation(ValidationError::InvalidTenantId {
                value: id.to_string(),
            }));
        }
        Ok(tenant)
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Deserialized values go through [`TenantId::new`], so stored
/// identifiers compare equal to the ones callers construct.
impl<'de> Deserialize<'de> for TenantId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({:?})", self.0)
    }
}

impl FromStr for TenantId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_id_normalization() {
        assert_eq!(TenantId::new("acme").as_str(), "acme");
        assert_eq!(TenantId::new(" Acme\t").as_str(), "acme");
        assert_eq!(TenantId::new("ACME"), TenantId::new("acme"));
    }

    #[test]
    fn test_parse_rejects_empty_and_separator() {
        assert!(TenantId::parse("").is_err());
        assert!(TenantId::parse("  ").is_err());
        assert!(TenantId::parse("a:b").is_err());
        assert_eq!(TenantId::parse(" Beta ").unwrap().as_str(), "beta");
    }

    #[test]
    fn test_from_str() {
        let tenant: TenantId = "Acme".parse().unwrap();
        assert_eq!(tenant.as_str(), "acme");
        assert!("".parse::<TenantId>().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let tenant = TenantId::new("acme");
        let json = serde_json::to_string(&tenant).unwrap();
        assert_eq!(json, "\"acme\"");

        let parsed: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tenant);
    }

    #[test]
    fn test_deserialize_normalizes() {
        let parsed: TenantId = serde_json::from_str(r#"" ACME ""#).unwrap();
        assert_eq!(parsed, TenantId::new("acme"));
        assert!(serde_json::from_str::<TenantId>("7").is_err());
    }

    #[test]
    fn test_from_string() {
        let tenant: TenantId = "My-Tenant".into();
        assert_eq!(tenant.as_str(), "my-tenant");

        let tenant2: TenantId = String::from("my-tenant").into();
        assert_eq!(tenant2, tenant);
    }
}
