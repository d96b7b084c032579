use serde::{Deserialize, Serialize};

use crate::models::{BLANK_LABEL, PlanConfig, TRADES_PER_DAY, TradeEntry};

/// One trade slot as typed into the day editor, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTradeInput {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub outcome: String,
}

impl RawTradeInput {
    pub fn new(label: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            outcome: outcome.into(),
        }
    }
}

/// Trim a label, substituting the blank marker when nothing is left
pub fn normalize_label(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        BLANK_LABEL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse a trade outcome. Anything that does not start with a number is 0.
///
/// Only the leading numeric part is read, so `"12.5 usd"` parses as 12.5.
pub fn parse_outcome(input: &str) -> f64 {
    numeric_prefix(input.trim())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse a bankroll entered by the user and clamp it to the plan floor
pub fn parse_capital(input: &str) -> f64 {
    PlanConfig::new(parse_outcome(input)).initial_capital()
}

/// Normalize the editor's slots for one day into exactly `TRADES_PER_DAY` entries
pub fn normalize_day(raw: &[RawTradeInput]) -> Vec<TradeEntry> {
    let mut trades: Vec<TradeEntry> = raw
        .iter()
        .take(TRADES_PER_DAY)
        .map(|t| TradeEntry::new(normalize_label(&t.label), parse_outcome(&t.outcome)))
        .collect();

    trades.resize_with(TRADES_PER_DAY, || TradeEntry::new(BLANK_LABEL, 0.0));
    trades
}

/// Longest prefix of `s` that reads as a decimal number with optional exponent
fn numeric_prefix(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows it
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    Some(&s[..end])
}
