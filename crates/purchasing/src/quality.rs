//! Quality scoring strategies.
//!
//! Product quality is a measured yield, not an opinion: a closed set of
//! named strategies over the weighing results of a purchase line. The score
//! feeds the quality-weighted cost chain, so the contract is strict: always
//! a non-negative, two-decimal-truncated value, and any degenerate input
//! (zero denominator) scores `0.0` rather than failing — one bad line must
//! never abort a batch.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use costchain_core::{guarded_div, truncate2};

/// Weighing results a strategy scores against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualityInputs {
    pub gross_weight: Decimal,
    pub first_process_weight: Decimal,
    pub second_process_weight: Decimal,
    /// Assay adjustment factor applied by the dd-adjusted strategy.
    pub dd_factor: Decimal,
}

/// Named scoring strategies.
///
/// These are the three configurable method slots of the pricing desk,
/// expressed as ordinary functions instead of user-supplied arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStrategy {
    /// First-process weight as a percentage of gross intake.
    FirstProcessYield,
    /// Second-process weight as a percentage of first-process weight.
    SecondProcessYield,
    /// Second-process recovery against gross intake, scaled by the assay
    /// dd factor.
    DdAdjustedRecovery,
}

impl QualityStrategy {
    /// Score the inputs. Never negative, never an error.
    pub fn score(self, inputs: &QualityInputs) -> Decimal {
        let raw = match self {
            QualityStrategy::FirstProcessYield => {
                guarded_div(inputs.first_process_weight, inputs.gross_weight) * dec!(100)
            }
            QualityStrategy::SecondProcessYield => {
                guarded_div(inputs.second_process_weight, inputs.first_process_weight) * dec!(100)
            }
            QualityStrategy::DdAdjustedRecovery => {
                guarded_div(inputs.second_process_weight, inputs.gross_weight) * inputs.dd_factor
            }
        };
        truncate2(raw.abs())
    }
}

/// Effective quality for a line: a manual override wins over the computed
/// score; no strategy at all scores zero.
pub fn effective_quality(
    manual: Option<Decimal>,
    strategy: Option<QualityStrategy>,
    inputs: &QualityInputs,
) -> Decimal {
    if let Some(value) = manual {
        return truncate2(value.abs());
    }
    match strategy {
        Some(s) => s.score(inputs),
        None => Decimal::ZERO,
    }
}
