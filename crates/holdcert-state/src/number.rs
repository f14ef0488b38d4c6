//! # Certificate Numbers
//!
//! Format: `PREFIX-YYYYMM-NNNN`, e.g. `SHR-202601-0007`. The prefix comes from
//! the certificate type, the year-month from the allocation date, and the
//! sequence is a zero-padded four-digit counter scoped to `(type, year-month)`.
//!
//! [`NumberAllocator`] hands out sequences monotonically. It never recomputes
//! a candidate from a count, so a number once handed out is never handed out
//! again, even if the record that received it is later rejected. The
//! allocator is not synchronised itself; the registry calls it under its
//! write lock.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use holdcert_core::{ValidationError, YearMonth};

use crate::certificate::CertificateType;

/// Largest sequence representable in four digits.
pub const MAX_SEQUENCE: u32 = 9999;

/// A parsed certificate number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CertificateNumber {
    certificate_type: CertificateType,
    period: YearMonth,
    sequence: u32,
}

impl CertificateNumber {
    /// Build a number from its parts.
    pub fn new(
        certificate_type: CertificateType,
        period: YearMonth,
        sequence: u32,
    ) -> Result<Self, ValidationError> {
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(ValidationError::InvalidCertificateNumber(format!(
                "{}-{period}-{sequence}",
                certificate_type.prefix()
            )));
        }
        Ok(Self {
            certificate_type,
            period,
            sequence,
        })
    }

    /// Parse `PREFIX-YYYYMM-NNNN`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidCertificateNumber(s.to_string());
        let mut parts = s.split('-');
        let (Some(prefix), Some(period), Some(seq), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let certificate_type = CertificateType::from_prefix(prefix).ok_or_else(invalid)?;
        let period = YearMonth::parse(period).map_err(|_| invalid())?;
        if seq.len() != 4 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let sequence: u32 = seq.parse().map_err(|_| invalid())?;
        Self::new(certificate_type, period, sequence).map_err(|_| invalid())
    }

    /// The certificate type encoded in the prefix.
    pub fn certificate_type(&self) -> CertificateType {
        self.certificate_type
    }

    /// The allocation year-month.
    pub fn period(&self) -> YearMonth {
        self.period
    }

    /// The sequence within `(type, period)`.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl std::fmt::Display for CertificateNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{:04}",
            self.certificate_type.prefix(),
            self.period,
            self.sequence
        )
    }
}

impl TryFrom<String> for CertificateNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CertificateNumber> for String {
    fn from(n: CertificateNumber) -> Self {
        n.to_string()
    }
}

/// The `(type, period)` scope has used all four-digit sequences.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("certificate number sequence exhausted for {prefix}-{period}")]
pub struct SequenceExhausted {
    /// Type prefix.
    pub prefix: &'static str,
    /// Year-month scope.
    pub period: YearMonth,
}

/// Monotonic per-`(type, year-month)` sequence counter.
#[derive(Debug, Clone, Default)]
pub struct NumberAllocator {
    last: HashMap<(CertificateType, YearMonth), u32>,
}

impl NumberAllocator {
    /// A fresh allocator with every scope at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next number in the scope.
    pub fn allocate(
        &mut self,
        certificate_type: CertificateType,
        period: YearMonth,
    ) -> Result<CertificateNumber, SequenceExhausted> {
        let last = self.last.entry((certificate_type, period)).or_insert(0);
        if *last >= MAX_SEQUENCE {
            return Err(SequenceExhausted {
                prefix: certificate_type.prefix(),
                period,
            });
        }
        *last += 1;
        Ok(CertificateNumber {
            certificate_type,
            period,
            sequence: *last,
        })
    }

    /// Record an existing number so later allocations land above it.
    pub fn observe(&mut self, number: &CertificateNumber) {
        let last = self
            .last
            .entry((number.certificate_type, number.period))
            .or_insert(0);
        *last = (*last).max(number.sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan() -> YearMonth {
        YearMonth::parse("202601").unwrap()
    }

    #[test]
    fn formats_with_prefix_and_padding() {
        let n = CertificateNumber::new(CertificateType::Share, jan(), 7).unwrap();
        assert_eq!(n.to_string(), "SHR-202601-0007");
    }

    #[test]
    fn parse_accepts_every_prefix() {
        for (text, ty) in [
            ("SHR-202601-0001", CertificateType::Share),
            ("INV-202601-0002", CertificateType::Investment),
            ("UNT-202601-0003", CertificateType::Unit),
            ("BND-202601-0004", CertificateType::Bond),
            ("EQT-202601-9999", CertificateType::Equity),
        ] {
            let n = CertificateNumber::parse(text).unwrap();
            assert_eq!(n.certificate_type(), ty);
            assert_eq!(n.to_string(), text);
        }
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in [
            "",
            "SHR-202601",
            "SHR-202601-1",
            "SHR-202613-0001",
            "XXX-202601-0001",
            "SHR-202601-0000",
            "SHR-202601-00001",
            "SHR-202601-0001-1",
            "shr-202601-0001",
        ] {
            assert!(CertificateNumber::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn serde_uses_string_form() {
        let n = CertificateNumber::parse("BND-202512-0042").unwrap();
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, "\"BND-202512-0042\"");
        let back: CertificateNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }

    #[test]
    fn allocator_is_scoped_and_monotonic() {
        let mut alloc = NumberAllocator::new();
        let feb = YearMonth::parse("202602").unwrap();
        assert_eq!(alloc.allocate(CertificateType::Share, jan()).unwrap().sequence(), 1);
        assert_eq!(alloc.allocate(CertificateType::Share, jan()).unwrap().sequence(), 2);
        assert_eq!(alloc.allocate(CertificateType::Bond, jan()).unwrap().sequence(), 1);
        assert_eq!(alloc.allocate(CertificateType::Share, feb).unwrap().sequence(), 1);
    }

    #[test]
    fn observe_moves_allocator_past_existing_numbers() {
        let mut alloc = NumberAllocator::new();
        alloc.observe(&CertificateNumber::parse("UNT-202601-0041").unwrap());
        alloc.observe(&CertificateNumber::parse("UNT-202601-0007").unwrap());
        let next = alloc.allocate(CertificateType::Unit, jan()).unwrap();
        assert_eq!(next.to_string(), "UNT-202601-0042");
    }

    #[test]
    fn allocator_reports_exhaustion() {
        let mut alloc = NumberAllocator::new();
        alloc.observe(&CertificateNumber::parse("EQT-202601-9999").unwrap());
        assert!(alloc.allocate(CertificateType::Equity, jan()).is_err());
    }
}
