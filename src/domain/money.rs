use thiserror::Error;

/// Amounts are integer cents. €12.34 is 1234; a negative amount is money
/// leaving the cassa.
pub type Cents = i64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("invalid amount: {0:?}")]
    Invalid(String),
}

/// Format cents as a signed decimal string: 1234 -> "12.34", -5 -> "-0.05".
pub fn format_cents(amount: Cents) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{}.{:02}", sign, amount.abs() / 100, amount.abs() % 100)
}

/// Parse a signed decimal string into cents. Accepts "50", "50.3" (= 50.30),
/// "-12.34"; extra decimal digits are truncated.
pub fn parse_cents(input: &str) -> Result<Cents, ParseAmountError> {
    let trimmed = input.trim();
    let invalid = || ParseAmountError::Invalid(input.to_string());

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (units_str, decimals_str) = match body.split_once('.') {
        Some((u, d)) => (u, d),
        None => (body, ""),
    };

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str.parse().map_err(|_| invalid())?
    };

    let decimals: i64 = match decimals_str.len() {
        0 => 0,
        1 => decimals_str.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => decimals_str[..2].parse().map_err(|_| invalid())?,
    };

    if units_str.is_empty() && decimals_str.is_empty() {
        return Err(invalid());
    }

    let amount = units * 100 + decimals;
    Ok(if negative { -amount } else { amount })
}
