//! # Identifier Newtypes
//!
//! `CertificateId` is minted here (UUID v4). Client, investment and template
//! identifiers belong to external record systems, so they are opaque strings
//! validated only for shape: non-empty, trimmed, at most 128 characters.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

const MAX_EXTERNAL_ID_LEN: usize = 128;

/// Internal identifier of a certificate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(pub Uuid);

impl CertificateId {
    /// Generate a new random certificate identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CertificateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CertificateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CertificateId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

macro_rules! external_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an external identifier.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::InvalidIdentifier {
                        kind: $kind,
                        value,
                        reason: "must not be empty",
                    });
                }
                if trimmed.len() > MAX_EXTERNAL_ID_LEN {
                    return Err(ValidationError::InvalidIdentifier {
                        kind: $kind,
                        value,
                        reason: "must not exceed 128 characters",
                    });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

external_id!(
    /// Identifier of a client record in the external client directory.
    ClientId,
    "client"
);
external_id!(
    /// Identifier of an investment record in the external investment directory.
    InvestmentId,
    "investment"
);
external_id!(
    /// Identifier of a certificate layout template.
    TemplateId,
    "template"
);
