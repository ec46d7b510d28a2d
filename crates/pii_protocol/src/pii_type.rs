//! The catalog of PII types a strategy can attribute a column to.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiType {
    Email,
    Phone,
    Ssn,
    CreditCard,
    Iban,
    IpAddress,
    MacAddress,
    Name,
    Address,
    DateOfBirth,
    PostalCode,
    NationalId,
    Gender,
    /// A strategy-specific type not covered by the built-in catalog, e.g. an
    /// NER model's own entity label.
    Other(&'static str),
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "EMAIL"),
            Self::Phone => write!(f, "PHONE"),
            Self::Ssn => write!(f, "SSN"),
            Self::CreditCard => write!(f, "CREDIT_CARD"),
            Self::Iban => write!(f, "IBAN"),
            Self::IpAddress => write!(f, "IP_ADDRESS"),
            Self::MacAddress => write!(f, "MAC_ADDRESS"),
            Self::Name => write!(f, "NAME"),
            Self::Address => write!(f, "ADDRESS"),
            Self::DateOfBirth => write!(f, "DATE_OF_BIRTH"),
            Self::PostalCode => write!(f, "POSTAL_CODE"),
            Self::NationalId => write!(f, "NATIONAL_ID"),
            Self::Gender => write!(f, "GENDER"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Which family of strategy produced a candidate. Priority order
/// (`Heuristic > Regex > Ner`) breaks ties between candidates with equal
/// confidence, per the `DetectionResult.highestConfidenceType` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyId {
    Heuristic,
    Regex,
    Ner,
}

impl StrategyId {
    /// Lower is higher priority, matching the spec's tie-break order.
    pub fn priority_rank(self) -> u8 {
        match self {
            Self::Heuristic => 0,
            Self::Regex => 1,
            Self::Ner => 2,
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heuristic => write!(f, "HEURISTIC"),
            Self::Regex => write!(f, "REGEX"),
            Self::Ner => write!(f, "NER"),
        }
    }
}
