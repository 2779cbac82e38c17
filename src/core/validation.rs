//! Input validation for the conversation flow
//!
//! Provides the two predicates the flow engine runs on user input:
//! - target address validation (structural email shape, whitelist regex)
//! - quantity parsing with inclusive bounds

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::core::config;

/// Cached regex for a structurally valid target address
/// Compiled once at startup and reused for all requests
static TARGET_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("Failed to compile target regex")
});

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Target address is not structurally valid
    #[error("Invalid target address: {0}")]
    InvalidTarget(String),

    /// Quantity did not parse as an integer
    #[error("Quantity is not a number: {0}")]
    NotANumber(String),

    /// Quantity parsed but lies outside the accepted bounds
    #[error("Quantity {0} is out of range ({min}..={max})", min = config::limits::MIN_QUANTITY, max = config::limits::MAX_QUANTITY)]
    QuantityOutOfRange(i64),
}

/// Validates that a string is a structurally valid target address.
///
/// This is a format check only; no delivery verification is attempted.
///
/// # Examples
/// ```
/// use dispatchbot::core::validation::validate_target;
///
/// assert!(validate_target("user@example.com").is_ok());
/// assert!(validate_target("not an address").is_err());
/// assert!(validate_target("missing@tld").is_err());
/// ```
pub fn validate_target(input: &str) -> Result<(), ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.len() > config::validation::MAX_TARGET_LENGTH {
        return Err(ValidationError::InvalidTarget(trimmed.to_string()));
    }
    if !TARGET_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidTarget(trimmed.to_string()));
    }
    Ok(())
}

/// Parses a quantity and checks it against the inclusive [MIN, MAX] bound.
///
/// # Examples
/// ```
/// use dispatchbot::core::validation::parse_quantity;
///
/// assert_eq!(parse_quantity("10").unwrap(), 10);
/// assert_eq!(parse_quantity("1000").unwrap(), 1000);
/// assert!(parse_quantity("9").is_err());
/// assert!(parse_quantity("1001").is_err());
/// assert!(parse_quantity("ten").is_err());
/// ```
pub fn parse_quantity(input: &str) -> Result<i64, ValidationError> {
    let quantity: i64 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotANumber(input.trim().to_string()))?;

    if !(config::limits::MIN_QUANTITY..=config::limits::MAX_QUANTITY).contains(&quantity) {
        return Err(ValidationError::QuantityOutOfRange(quantity));
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_targets() {
        assert!(validate_target("user@example.com").is_ok());
        assert!(validate_target("first.last+tag@sub.domain.org").is_ok());
        assert!(validate_target("  padded@example.com  ").is_ok());
    }

    #[test]
    fn test_invalid_targets() {
        assert!(validate_target("").is_err());
        assert!(validate_target("plainstring").is_err());
        assert!(validate_target("two words@example.com").is_err());
        assert!(validate_target("missing-at.example.com").is_err());
        assert!(validate_target("no-tld@localhost").is_err());
    }

    #[test]
    fn test_overlong_target_rejected() {
        let local = "a".repeat(250);
        assert!(validate_target(&format!("{}@example.com", local)).is_err());
    }

    #[test]
    fn test_quantity_inclusive_bounds() {
        // Boundary values from the amount-bound contract
        assert_eq!(parse_quantity("10").unwrap(), 10);
        assert_eq!(parse_quantity("1000").unwrap(), 1000);
        assert!(matches!(parse_quantity("9"), Err(ValidationError::QuantityOutOfRange(9))));
        assert!(matches!(parse_quantity("1001"), Err(ValidationError::QuantityOutOfRange(1001))));
    }

    #[test]
    fn test_quantity_parse_failures() {
        assert!(matches!(parse_quantity("ten"), Err(ValidationError::NotANumber(_))));
        assert!(matches!(parse_quantity(""), Err(ValidationError::NotANumber(_))));
        assert!(matches!(parse_quantity("12.5"), Err(ValidationError::NotANumber(_))));
    }
}
