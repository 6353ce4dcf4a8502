//! Exact conversion between base units (wei) and decimal display strings
//!
//! All arithmetic is done on `U256`; floating point never touches an amount.

use crate::{Error, Result};
use alloy::primitives::U256;
use serde_json::Number;

/// Decimal places of the display unit (ether and 18-decimal tokens)
pub const DISPLAY_DECIMALS: u32 = 18;

/// Render a base-unit amount as an 18-decimal display string
pub fn to_display(base: U256) -> String {
    format_units(base, DISPLAY_DECIMALS)
}

/// Parse an 18-decimal display string into base units
pub fn to_base(display: &str) -> Result<U256> {
    parse_units(display, DISPLAY_DECIMALS)
}

/// Parse a JSON number into base units
///
/// The number goes through its shortest decimal text form, so `1000` and
/// `1.5` are exact. serde_json prints small and very large floats with an
/// exponent (`0.000001` becomes `1e-6`); the decimal point is shifted back
/// before parsing.
pub fn number_to_base(value: &Number) -> Result<U256> {
    let text = value.to_string();
    match text.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => {
            to_base(&shift_decimal_point(mantissa, exponent, &text)?)
        }
        None => to_base(&text),
    }
}

/// Exponents beyond this cannot produce an amount that fits 18 decimals and a U256
const MAX_EXPONENT: i32 = 100;

/// Rewrite `<mantissa>e<exponent>` as a plain decimal string
fn shift_decimal_point(mantissa: &str, exponent: &str, input: &str) -> Result<String> {
    let malformed = || Error::Conversion(format!("malformed amount: {}", input));

    let exponent: i32 = exponent.parse().map_err(|_| malformed())?;
    if exponent.abs() > MAX_EXPONENT {
        return Err(Error::Conversion(format!("amount out of range: {}", input)));
    }

    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{}{}", whole, fraction);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }

    let point = whole.len() as i32 + exponent;
    let shifted = if point <= 0 {
        format!("0.{}{}", "0".repeat(point.unsigned_abs() as usize), digits)
    } else if point as usize >= digits.len() {
        format!("{}{}", digits, "0".repeat(point as usize - digits.len()))
    } else {
        let (head, tail) = digits.split_at(point as usize);
        format!("{}.{}", head, tail)
    };
    Ok(format!("{}{}", sign, shifted))
}

/// Format a U256 value with decimals, trimming trailing fractional zeros
pub fn format_units(value: U256, decimals: u32) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        return whole.to_string();
    }

    let remainder_str = format!("{:0>width$}", remainder, width = decimals as usize);
    let trimmed = remainder_str.trim_end_matches('0');
    format!("{}.{}", whole, trimmed)
}

/// Parse a non-negative decimal string with at most `decimals` fractional digits
pub fn parse_units(input: &str, decimals: u32) -> Result<U256> {
    if input.is_empty() {
        return Err(Error::Conversion("empty amount".to_string()));
    }
    if input.starts_with('-') {
        return Err(Error::Conversion(format!(
            "negative amount not allowed: {}",
            input
        )));
    }

    let (whole, fraction) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(whole) || !is_digits(fraction) || (whole.is_empty() && fraction.is_empty()) {
        return Err(Error::Conversion(format!("malformed amount: {}", input)));
    }
    if fraction.len() > decimals as usize {
        return Err(Error::Conversion(format!(
            "amount {} has more than {} decimal places",
            input, decimals
        )));
    }

    let scale = U256::from(10).pow(U256::from(decimals));
    let whole_value = parse_digits(whole, input)?;
    let padded = format!("{:0<width$}", fraction, width = decimals as usize);
    let fraction_value = parse_digits(&padded, input)?;

    whole_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(|| Error::Conversion(format!("amount out of range: {}", input)))
}

fn parse_digits(digits: &str, input: &str) -> Result<U256> {
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10)
        .map_err(|e| Error::Conversion(format!("amount {} out of range: {}", input, e)))
}
