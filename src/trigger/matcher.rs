//! Target price band matching.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Half-width of the band around each target price, inclusive.
pub const TOLERANCE: Decimal = dec!(0.005);

/// Whether `ask` lies within [`TOLERANCE`] of `target`.
pub fn within_band(target: Decimal, ask: Decimal) -> bool {
    (ask - target).abs() <= TOLERANCE
}

/// First target (in configured order) whose band contains `ask`.
pub fn match_target(targets: &[Decimal], ask: Decimal) -> Option<Decimal> {
    targets.iter().copied().find(|target| within_band(*target, ask))
}
