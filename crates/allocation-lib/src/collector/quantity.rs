//! Kubernetes resource quantity parsing
//!
//! Supports plain decimals, decimal exponents (`1e3`), decimal SI suffixes
//! (`n u m k M G T P E`) and binary suffixes (`Ki Mi Gi Ti Pi Ei`). Values
//! are computed with integer arithmetic and rounded up to the target unit,
//! matching how the API server reports milli-values.

use crate::error::QuantityError;

const MAX_EXPONENT: i32 = 64;

/// CPU quantity in millicores
pub fn parse_cpu_millis(quantity: &str) -> Result<i64, QuantityError> {
    parse_scaled(quantity, 3)
}

/// Memory quantity in bytes
pub fn parse_memory_bytes(quantity: &str) -> Result<i64, QuantityError> {
    parse_scaled(quantity, 0)
}

/// Plain count, as used for pod slots
pub fn parse_count(quantity: &str) -> Result<i64, QuantityError> {
    parse_scaled(quantity, 0)
}

/// Parse and express in units of `10^-target_exp10`
fn parse_scaled(quantity: &str, target_exp10: i32) -> Result<i64, QuantityError> {
    let q = quantity.trim();
    if q.is_empty() {
        return Err(QuantityError::Empty);
    }

    let body = match q.as_bytes()[0] {
        b'-' => return Err(QuantityError::Negative),
        b'+' => &q[1..],
        _ => q,
    };

    let split = body
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(body.len());
    let (number, suffix) = body.split_at(split);

    let (mantissa, frac_digits) = parse_decimal(number)?;
    let (exp10, pow2) = parse_suffix(suffix)?;

    scale_ceil(mantissa, pow2, exp10 + target_exp10 - frac_digits)
}

/// Digits with the decimal point removed, plus the count of fractional digits
fn parse_decimal(number: &str) -> Result<(u128, i32), QuantityError> {
    let invalid = || QuantityError::InvalidNumber(number.to_string());

    let (int_part, frac_part) = match number.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (number, ""),
    };
    if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(invalid());
    }

    let mut mantissa: u128 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(u128::from(b - b'0')))
            .ok_or(QuantityError::Overflow)?;
    }

    Ok((mantissa, frac_part.len() as i32))
}

/// Decimal exponent and power of two encoded by a suffix
fn parse_suffix(suffix: &str) -> Result<(i32, u32), QuantityError> {
    let parsed = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        _ => (parse_exponent(suffix)?, 0),
    };
    Ok(parsed)
}

fn parse_exponent(suffix: &str) -> Result<i32, QuantityError> {
    let unknown = || QuantityError::UnknownSuffix(suffix.to_string());

    let digits = suffix
        .strip_prefix('e')
        .or_else(|| suffix.strip_prefix('E'))
        .ok_or_else(unknown)?;
    let unsigned = digits.strip_prefix(['+', '-']).unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unknown());
    }

    let exponent: i32 = digits.parse().map_err(|_| QuantityError::Overflow)?;
    if exponent.abs() > MAX_EXPONENT {
        return Err(QuantityError::Overflow);
    }
    Ok(exponent)
}

/// `ceil(mantissa * 2^pow2 * 10^scale)` as i64
fn scale_ceil(mantissa: u128, pow2: u32, scale: i32) -> Result<i64, QuantityError> {
    let value = mantissa
        .checked_mul(1u128 << pow2)
        .ok_or(QuantityError::Overflow)?;

    let scaled = if scale >= 0 {
        10u128
            .checked_pow(scale as u32)
            .and_then(|factor| value.checked_mul(factor))
            .ok_or(QuantityError::Overflow)?
    } else {
        match 10u128.checked_pow(scale.unsigned_abs()) {
            Some(divisor) => value / divisor + u128::from(value % divisor != 0),
            None => u128::from(value != 0),
        }
    };

    i64::try_from(scaled).map_err(|_| QuantityError::Overflow)
}
