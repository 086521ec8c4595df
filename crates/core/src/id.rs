//! Strongly-typed identifiers used across the domain.
//!
//! All of them are opaque strings supplied by the outside world (purchasing
//! systems, order intake), so they are validated for non-blankness only.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Reference of a stock batch (globally unique).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchRef(String);

/// Stock-keeping unit code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

/// Identifier of the customer order an order line belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create an identifier, rejecting blank input.
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::invalid_id(format!("{} cannot be blank", $name)));
                }
                Ok(Self(value))
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

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $t {
            type Error = DomainError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_string_newtype!(BatchRef, "BatchRef");
impl_string_newtype!(Sku, "Sku");
impl_string_newtype!(OrderId, "OrderId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_identifiers_are_rejected() {
        assert!(matches!(BatchRef::new(""), Err(DomainError::InvalidId(_))));
        assert!(matches!(Sku::new("   "), Err(DomainError::InvalidId(_))));
        assert!(matches!("\t".parse::<OrderId>(), Err(DomainError::InvalidId(_))));
    }

    #[test]
    fn identifiers_display_their_raw_value() {
        let sku = Sku::new("SMALL-TABLE").unwrap();
        assert_eq!(sku.to_string(), "SMALL-TABLE");
        assert_eq!(sku.as_str(), "SMALL-TABLE");
    }

    #[test]
    fn deserialization_validates_identifiers() {
        let ok: BatchRef = serde_json::from_str("\"batch-001\"").unwrap();
        assert_eq!(ok.as_str(), "batch-001");

        let err = serde_json::from_str::<BatchRef>("\"\"");
        assert!(err.is_err());

        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(json, "\"batch-001\"");
    }
}
