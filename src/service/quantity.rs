use bigdecimal::{BigDecimal, RoundingMode, Zero};
use std::str::FromStr;

/// Decimal places used when rendering quantities
pub const QUANTITY_SCALE: i64 = 3;

/// Parse a non-negative decimal, accepting `,` or `.` as separator.
///
/// Blank input is an absent quantity and counts as zero. Anything else that
/// does not parse, or is negative, returns `None`.
pub fn parse_quantity(raw: &str) -> Option<BigDecimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(BigDecimal::zero());
    }
    let normalized = trimmed.replace(',', ".");
    let value = BigDecimal::from_str(&normalized).ok()?;
    if value < BigDecimal::zero() {
        return None;
    }
    Some(value)
}

/// Three decimals, halves rounded away from zero.
pub fn format_quantity(value: &BigDecimal) -> String {
    value.with_scale_round(QUANTITY_SCALE, RoundingMode::HalfUp).to_string()
}

/// Parses quantities for one aggregation pass and records a warning for each
/// malformed value instead of failing. Malformed values count as zero.
#[derive(Debug, Default)]
pub struct QuantityReader {
    warnings: Vec<String>,
}

impl QuantityReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// `context` names the value in the warning, e.g. `"2026-02-27 'Pizza': Mozzarella"`.
    pub fn read(&mut self, raw: &str, context: impl FnOnce() -> String) -> BigDecimal {
        match parse_quantity(raw) {
            Some(value) => value,
            None => {
                let message = format!("{}: invalid quantity '{}' counted as zero", context(), raw);
                tracing::warn!("{}", message);
                self.warnings.push(message);
                BigDecimal::zero()
            }
        }
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
