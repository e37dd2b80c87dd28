//! Fixed-Point Arithmetic for the FURUSD Protocol
//!
//! All monetary values are 18-decimal unsigned fixed point carried in
//! 256-bit integers. Every operation is checked; overflow, underflow and
//! division by zero surface as typed errors, never as panics.

use crate::constants::precision::{DECIMAL_PRECISION, HALF_PRECISION};
use crate::constants::time::MINUTES_IN_1000_YEARS;
use crate::errors::{FurUsdError, FurUsdResult};
use primitive_types::U256;

/// The fixed-point unit (10^18) as a U256
pub fn one() -> U256 {
    U256::from(DECIMAL_PRECISION)
}

/// Truncated low 128 bits, for error payloads and event fields
pub fn lo(x: U256) -> u128 {
    x.low_u128()
}

/// Checked addition
pub fn checked_add(a: U256, b: U256) -> FurUsdResult<U256> {
    a.checked_add(b).ok_or(FurUsdError::Overflow)
}

/// Checked subtraction
pub fn checked_sub(a: U256, b: U256) -> FurUsdResult<U256> {
    a.checked_sub(b).ok_or(FurUsdError::Underflow)
}

/// Checked multiplication
pub fn checked_mul(a: U256, b: U256) -> FurUsdResult<U256> {
    a.checked_mul(b).ok_or(FurUsdError::Overflow)
}

/// Checked division
pub fn checked_div(a: U256, b: U256) -> FurUsdResult<U256> {
    a.checked_div(b).ok_or(FurUsdError::DivisionByZero)
}

/// Fixed-point multiplication with round-half-up: (a * b + ONE/2) / ONE
pub fn dec_mul(a: U256, b: U256) -> FurUsdResult<U256> {
    let prod = checked_mul(a, b)?;
    let rounded = checked_add(prod, U256::from(HALF_PRECISION))?;
    checked_div(rounded, one())
}

/// Fixed-point division with round-half-up: (a * ONE + b/2) / b
pub fn dec_div(a: U256, b: U256) -> FurUsdResult<U256> {
    if b.is_zero() {
        return Err(FurUsdError::DivisionByZero);
    }
    let scaled = checked_mul(a, one())?;
    let rounded = checked_add(scaled, b / 2u64)?;
    Ok(rounded / b)
}

/// Fixed-point exponentiation by squaring: base^minutes with base in
/// 18-decimal fixed point.
///
/// The exponent is capped at the number of minutes in 1000 years so the
/// issuance schedule stays bounded for any timestamp.
pub fn dec_pow(base: U256, minutes: u64) -> FurUsdResult<U256> {
    let mut n = minutes.min(MINUTES_IN_1000_YEARS);

    if n == 0 {
        return Ok(one());
    }

    let mut x = base;
    let mut y = one();

    while n > 1 {
        if n % 2 == 0 {
            x = dec_mul(x, x)?;
            n /= 2;
        } else {
            y = dec_mul(x, y)?;
            x = dec_mul(x, x)?;
            n = (n - 1) / 2;
        }
    }

    dec_mul(x, y)
}

/// Individual collateral ratio: coll * price / debt.
///
/// Zero debt yields the maximal ratio so an empty trove is never treated
/// as under-collateralized.
pub fn compute_icr(coll: U256, debt: U256, price: U256) -> FurUsdResult<U256> {
    if debt.is_zero() {
        return Ok(U256::MAX);
    }
    let value = checked_mul(coll, price)?;
    Ok(value / debt)
}
