//! Currency-conversion boundary.
//!
//! The engine never owns FX rates; it consumes a pure conversion function
//! from an external service. Conversion failures surface to the caller
//! verbatim — they are boundary failures, not recoverable computation
//! failures.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// ISO-4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// External FX service: `convert(amount, from, to, as_of) -> amount`.
pub trait CurrencyConverter {
    fn convert(
        &self,
        amount: Decimal,
        from: &Currency,
        to: &Currency,
        as_of: NaiveDate,
    ) -> DomainResult<Decimal>;
}

/// In-memory spot-rate table.
///
/// Intended for tests and offline recalculation runs where the rates for the
/// relevant dates were fetched up front. Same-currency conversion is always
/// the identity, even with an empty table.
#[derive(Debug, Default, Clone)]
pub struct SpotTable {
    rates: HashMap<(String, String), Decimal>,
}

impl SpotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: &Currency, to: &Currency, rate: Decimal) -> Self {
        self.rates
            .insert((from.code().to_string(), to.code().to_string()), rate);
        self
    }
}

impl CurrencyConverter for SpotTable {
    fn convert(
        &self,
        amount: Decimal,
        from: &Currency,
        to: &Currency,
        _as_of: NaiveDate,
    ) -> DomainResult<Decimal> {
        if from == to {
            return Ok(amount);
        }
        let rate = self
            .rates
            .get(&(from.code().to_string(), to.code().to_string()))
            .ok_or_else(|| {
                DomainError::external(format!("no spot rate for {from}->{to}"))
            })?;
        Ok(amount * rate)
    }
}
