use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

use super::errors::DomainError;

/// Monetary amount in minor currency units.
pub type Cents = i64;

/// Longest accepted amount string. `i64::MAX` cents is 19 digits.
const MAX_AMOUNT_LEN: usize = 32;

/// Parse a major-unit decimal string such as `"175.5"` into cents.
///
/// Fractions of a cent are rounded half-up. Negative amounts are rejected.
pub fn parse_major_units(input: &str) -> Result<Cents, DomainError> {
    let trimmed = input.trim();
    // Rescaling an exponent form expands every implied digit.
    if trimmed.contains(['e', 'E']) || trimmed.len() > MAX_AMOUNT_LEN {
        return Err(DomainError::InvalidInput(format!(
            "Amount '{}' must be a plain decimal such as 150.00",
            input
        )));
    }
    let value = BigDecimal::from_str(trimmed)
        .map_err(|e| DomainError::InvalidInput(format!("Invalid amount '{}': {}", input, e)))?;

    if value < BigDecimal::from(0) {
        return Err(DomainError::InvalidInput(format!(
            "Amount '{}' must not be negative",
            input
        )));
    }

    let cents = (value.with_scale_round(2, RoundingMode::HalfUp) * BigDecimal::from(100))
        .with_scale(0);
    cents
        .to_i64()
        .ok_or_else(|| DomainError::InvalidInput(format!("Amount '{}' is out of range", input)))
}

/// Format cents as a major-unit string with exactly two decimals.
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// `value * percentage / 100`, truncated toward zero.
///
/// Computed in 128 bits so large subtotals cannot overflow mid-way.
pub fn percent_of(value: Cents, percentage: i32) -> Cents {
    let scaled = i128::from(value) * i128::from(percentage) / 100;
    scaled.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as Cents
}
