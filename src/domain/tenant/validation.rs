//! Tenant validation utilities

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length for tenant and provider identifiers
pub const MAX_IDENTIFIER_LENGTH: usize = 50;

/// Regex pattern for valid identifiers (alphanumeric + hyphens)
static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$").unwrap());

/// Tenant validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantValidationError {
    /// Identifier is empty
    EmptyId,
    /// Identifier exceeds maximum length
    IdTooLong { length: usize, max: usize },
    /// Identifier contains invalid characters
    InvalidIdFormat { id: String },
    /// An allowed provider has no configured defaults
    MissingProviderDefaults { provider: String },
    /// No providers are allowed for the tenant
    NoAllowedProviders,
}

impl fmt::Display for TenantValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "Identifier cannot be empty"),
            Self::IdTooLong { length, max } => {
                write!(f, "Identifier too long: {} characters (max {})", length, max)
            }
            Self::InvalidIdFormat { id } => {
                write!(
                    f,
                    "Invalid identifier format '{}': must be alphanumeric with hyphens, cannot start or end with hyphen",
                    id
                )
            }
            Self::MissingProviderDefaults { provider } => {
                write!(f, "Allowed provider '{}' has no configured defaults", provider)
            }
            Self::NoAllowedProviders => write!(f, "Tenant allows no providers"),
        }
    }
}

impl std::error::Error for TenantValidationError {}

/// Validate a tenant or provider identifier
pub fn validate_identifier(id: &str) -> Result<(), TenantValidationError> {
    if id.is_empty() {
        return Err(TenantValidationError::EmptyId);
    }

    if id.len() > MAX_IDENTIFIER_LENGTH {
        return Err(TenantValidationError::IdTooLong {
            length: id.len(),
            max: MAX_IDENTIFIER_LENGTH,
        });
    }

    if !IDENTIFIER_PATTERN.is_match(id) {
        return Err(TenantValidationError::InvalidIdFormat { id: id.to_string() });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("acme").is_ok());
        assert!(validate_identifier("acme-corp-2").is_ok());
        assert!(validate_identifier("a").is_ok());
    }

    #[test]
    fn test_empty_identifier() {
        assert_eq!(validate_identifier(""), Err(TenantValidationError::EmptyId));
    }

    #[test]
    fn test_identifier_too_long() {
        let id = "a".repeat(51);
        assert!(matches!(
            validate_identifier(&id),
            Err(TenantValidationError::IdTooLong { length: 51, .. })
        ));
    }

    #[test]
    fn test_invalid_identifier_format() {
        assert!(validate_identifier("-acme").is_err());
        assert!(validate_identifier("acme-").is_err());
        assert!(validate_identifier("ac me").is_err());
        assert!(validate_identifier("acme_corp").is_err());
    }
}
