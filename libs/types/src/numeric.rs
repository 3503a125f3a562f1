//! Fixed-point decimal amounts
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Custody amounts are whole base units; the canonical encoding normalizes
//! before writing mantissa and scale, so `100` and `100.0` sign identically.

use rust_decimal::Decimal;

/// Asset amount in base units
pub type Amount = Decimal;

/// Checked sum of amounts, `None` on overflow
pub fn checked_sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> Option<Amount> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(*amount))
}
