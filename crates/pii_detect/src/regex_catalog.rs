//! Value-level regex patterns for `RegexStrategy`, plus the Luhn check used
//! to confirm a credit-card-shaped match actually passes the checksum.

use once_cell::sync::Lazy;
use pii_protocol::PiiType;
use regex::Regex;

pub struct RegexRule {
    pub name: &'static str,
    pub pii_type: PiiType,
    pub pattern: &'static str,
    pub base_confidence: f64,
}

const RULES: &[RegexRule] = &[
    RegexRule { name: "EMAIL", pii_type: PiiType::Email, pattern: r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$", base_confidence: 0.9 },
    RegexRule { name: "PHONE_US", pii_type: PiiType::Phone, pattern: r"^\+?1?[-. ]?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}$", base_confidence: 0.75 },
    RegexRule { name: "SSN_US", pii_type: PiiType::Ssn, pattern: r"^\d{3}-\d{2}-\d{4}$", base_confidence: 0.85 },
    RegexRule { name: "IBAN", pii_type: PiiType::Iban, pattern: r"^[A-Z]{2}\d{2}[A-Z0-9]{11,30}$", base_confidence: 0.8 },
    RegexRule { name: "IPV4", pii_type: PiiType::IpAddress, pattern: r"^(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)$", base_confidence: 0.85 },
    RegexRule { name: "IPV6", pii_type: PiiType::IpAddress, pattern: r"^(?:[A-Fa-f0-9]{1,4}:){7}[A-Fa-f0-9]{1,4}$", base_confidence: 0.85 },
    RegexRule { name: "MAC_ADDRESS", pii_type: PiiType::MacAddress, pattern: r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$", base_confidence: 0.85 },
];

const CREDIT_CARD_PATTERN: &str = r"^\d{13,19}$";

pub static COMPILED_RULES: Lazy<Vec<(&'static str, PiiType, Regex, f64)>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|r| (r.name, r.pii_type, Regex::new(r.pattern).expect("regex catalog pattern is valid"), r.base_confidence))
        .collect()
});

pub static CREDIT_CARD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(CREDIT_CARD_PATTERN).expect("credit card pattern is valid"));

/// Luhn checksum over the digits of `value`, ignoring any separators. Used
/// to lift `CREDIT_CARD`'s confidence once a digit-string match is
/// additionally checksum-valid, since 13-19 digit strings alone are weak
/// evidence (they also match phone numbers, account numbers, etc.).
pub fn passes_luhn(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_luhn_card_passes() {
        assert!(passes_luhn("4111111111111111"));
    }

    #[test]
    fn invalid_luhn_card_fails() {
        assert!(!passes_luhn("4111111111111112"));
    }

    #[test]
    fn email_pattern_matches_basic_address() {
        let (_, _, re, _) = COMPILED_RULES.iter().find(|(n, ..)| *n == "EMAIL").unwrap();
        assert!(re.is_match("jane.doe@example.com"));
        assert!(!re.is_match("not an email"));
    }

    #[test]
    fn ipv4_pattern_rejects_out_of_range_octets() {
        let (_, _, re, _) = COMPILED_RULES.iter().find(|(n, ..)| *n == "IPV4").unwrap();
        assert!(re.is_match("192.168.1.1"));
        assert!(!re.is_match("999.168.1.1"));
    }
}
