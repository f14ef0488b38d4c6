//! # Decimal Amounts
//!
//! Financial snapshot values (investment amount, share price) are captured
//! at issuance and never recomputed, so they are stored exactly as supplied:
//! a validated decimal string. Floats are never used for money; they would
//! also be rejected by `CanonicalBytes`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A non-negative decimal amount such as `"1500"` or `"12.3456"`.
///
/// At most 18 integer digits and 8 fractional digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DecimalAmount(String);

impl DecimalAmount {
    /// Validate and wrap a decimal string.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        let (int_part, frac_part) = match trimmed.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (trimmed, None),
        };
        let int_ok = !int_part.is_empty()
            && int_part.len() <= 18
            && int_part.bytes().all(|b| b.is_ascii_digit());
        let frac_ok = match frac_part {
            None => true,
            Some(f) => !f.is_empty() && f.len() <= 8 && f.bytes().all(|b| b.is_ascii_digit()),
        };
        if !int_ok || !frac_ok {
            return Err(ValidationError::InvalidAmount(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The amount as supplied.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DecimalAmount {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DecimalAmount> for String {
    fn from(a: DecimalAmount) -> Self {
        a.0
    }
}

impl std::fmt::Display for DecimalAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_decimals() {
        for s in ["0", "1500", "12.50", "0.00000001", " 42 "] {
            assert!(DecimalAmount::new(s).is_ok(), "{s}");
        }
    }

    #[test]
    fn rejects_malformed() {
        for s in ["", ".", "1.", ".5", "-3", "1e5", "1,000", "1.123456789", "abc"] {
            assert!(DecimalAmount::new(s).is_err(), "{s}");
        }
    }
}
