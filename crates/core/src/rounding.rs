//! Rounding policy and guarded arithmetic.
//!
//! Every monetary/quantity value that feeds a stored or propagated field goes
//! through [`truncate2`] — truncation to two decimal places, not
//! round-to-nearest. Delivery entries and invoice COGS entries reconcile
//! exactly only because both sides truncate the same way; a different
//! rounding mode anywhere in the chain breaks that reconciliation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Quantities within this tolerance of zero are treated as fully consumed
/// when walking delivery layers.
pub const QTY_TOLERANCE: Decimal = dec!(0.000001);

const CENT_SCALE: Decimal = dec!(100);

/// Truncate to two decimal places: `floor(value * 100) / 100`.
///
/// Only non-negative inputs are exercised by the engine; behavior for
/// negative values is unspecified.
pub fn truncate2(value: Decimal) -> Decimal {
    (value * CENT_SCALE).floor() / CENT_SCALE
}

/// Division that returns a defined zero instead of raising when the
/// denominator is zero. The recompute graph must always produce a value; a
/// zero cost is the conservative degradation.
pub fn guarded_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}
