use sprite_db::{LedgerError, Result};

/// Raw units per whole token (9 decimals).
pub const RAW_PER_TOKEN: u64 = 1_000_000_000;

/// Parse a user-supplied amount into raw units.
///
/// `text` is a plain decimal (`0.75`) or a `$`-prefixed USD amount that is
/// converted with `price` (USD per token). `price` is only called for USD
/// amounts. Empty input parses to zero.
pub fn parse_amount(text: &str, price: impl FnOnce() -> f64) -> Result<u64> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }

    let tokens = match text.strip_prefix('$') {
        Some(usd) => {
            let usd = parse_decimal(usd)?;
            let price = price();
            if !price.is_finite() || price <= 0.0 {
                return Err(LedgerError::ExternalService("token price is unavailable".into()));
            }
            usd / price
        }
        None => parse_decimal(text)?,
    };

    if tokens.is_nan() {
        return Err(LedgerError::InvalidAmount("NaN is not an amount".into()));
    }
    if tokens < 0.0 {
        return Err(LedgerError::InvalidAmount("no negative amounts allowed".into()));
    }

    let raw = (tokens * RAW_PER_TOKEN as f64).round();
    // i64::MAX is not representable as f64; the nearest value above it is 2^63.
    if !raw.is_finite() || raw >= i64::MAX as f64 {
        return Err(LedgerError::InvalidAmount(format!("{} is too large", text)));
    }
    Ok(raw as u64)
}

/// Like `parse_amount`, but zero is rejected.
pub fn parse_positive(text: &str, price: impl FnOnce() -> f64) -> Result<u64> {
    match parse_amount(text, price)? {
        0 => Err(LedgerError::InvalidAmount("amount must be positive".into())),
        raw => Ok(raw),
    }
}

fn parse_decimal(text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| LedgerError::InvalidAmount(format!("{:?} is not a number", text)))
}

/// Render raw units as `<int>.<9 digits>`.
pub fn format_raw(raw: u64) -> String {
    format!("{}.{:09}", raw / RAW_PER_TOKEN, raw % RAW_PER_TOKEN)
}

/// Token value in USD at `price`.
pub fn usd_value(raw: u64, price: f64) -> f64 {
    raw as f64 / RAW_PER_TOKEN as f64 * price
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_price() -> f64 {
        panic!("price should not be consulted")
    }

    #[test]
    fn plain_decimals() {
        assert_eq!(parse_amount("0.75", no_price).unwrap(), 750_000_000);
        assert_eq!(parse_amount(" 2 ", no_price).unwrap(), 2_000_000_000);
        assert_eq!(parse_amount("0.000000001", no_price).unwrap(), 1);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(parse_amount("", no_price).unwrap(), 0);
        assert_eq!(parse_amount("   ", no_price).unwrap(), 0);
        assert!(matches!(parse_positive("", no_price), Err(LedgerError::InvalidAmount(_))));
        assert!(matches!(parse_positive("0", no_price), Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn usd_amounts_use_price() {
        let price = 0.37;
        let expected = (5.0 / price * 1e9_f64).round() as u64;
        assert_eq!(parse_amount("$5", || price).unwrap(), expected);
    }

    #[test]
    fn usd_without_price_is_external_failure() {
        assert!(matches!(
            parse_amount("$5", || 0.0),
            Err(LedgerError::ExternalService(_))
        ));
    }

    #[test]
    fn rejects_bad_input() {
        for text in ["-1", "NaN", "nan", "abc", "$-3", "inf", "1e30"] {
            assert!(
                matches!(parse_amount(text, || 1.0), Err(LedgerError::InvalidAmount(_))),
                "{} should be invalid",
                text
            );
        }
    }

    #[test]
    fn formats_nine_decimals() {
        assert_eq!(format_raw(750_000_000), "0.750000000");
        assert_eq!(format_raw(12_000_000_001), "12.000000001");
        assert_eq!(format_raw(0), "0.000000000");
    }
}
