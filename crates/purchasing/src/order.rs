use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use costchain_core::{
    guarded_div, truncate2, Currency, CurrencyConverter, DomainResult, Entity, EntityId,
    ProductId, Unit,
};

use crate::quality::{effective_quality, QualityInputs, QualityStrategy};

/// Purchase order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub EntityId);

impl PurchaseOrderId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase line identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseLineId(pub EntityId);

impl PurchaseLineId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseLineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Market-pricing conventions on a purchase order.
///
/// The market quotes a price per [`MarketPricing::market_unit`] in
/// [`MarketPricing::market_currency`]; material is weighed in
/// [`MarketPricing::input_unit`] and settled per
/// [`MarketPricing::transaction_unit`] in
/// [`MarketPricing::transaction_currency`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPricing {
    pub market_price: Decimal,
    /// Signed adjustment on the quoted price (discount when negative).
    pub price_adjustment: Decimal,
    pub market_currency: Currency,
    pub market_unit: Unit,
    pub input_unit: Unit,
    pub transaction_unit: Unit,
    pub transaction_currency: Currency,
    /// Purity divisor the rate is normalized by.
    pub purity_factor: Decimal,
    pub as_of: NaiveDate,
}

impl MarketPricing {
    /// Net market price after the signed adjustment, truncated.
    pub fn net_price(&self) -> Decimal {
        truncate2(self.market_price + self.price_adjustment)
    }

    /// Settlement price per transaction unit: the net price converted into
    /// the transaction currency and scaled by the unit convention (how many
    /// market units one transaction unit holds).
    pub fn transaction_price_per_unit(
        &self,
        fx: &dyn CurrencyConverter,
    ) -> DomainResult<Decimal> {
        let converted = fx.convert(
            self.net_price(),
            &self.market_currency,
            &self.transaction_currency,
            self.as_of,
        )?;
        let convention = self.transaction_unit.ratio_to(self.market_unit);
        Ok(truncate2(converted * convention))
    }
}

/// Sign of an order-level price adjustment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeductionKind {
    Deduction,
    Addition,
}

/// An order-level deduction or addition, possibly in a foreign currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub kind: DeductionKind,
    pub amount: Decimal,
    pub currency: Currency,
    pub comment: Option<String>,
}

impl Deduction {
    /// Amount in the transaction currency, negative for deductions.
    pub fn signed_amount(
        &self,
        fx: &dyn CurrencyConverter,
        transaction_currency: &Currency,
        as_of: NaiveDate,
    ) -> DomainResult<Decimal> {
        let converted = fx.convert(self.amount, &self.currency, transaction_currency, as_of)?;
        Ok(match self.kind {
            DeductionKind::Deduction => -converted,
            DeductionKind::Addition => converted,
        })
    }
}

/// Pricing context shared by all lines of one order, derived once per
/// repricing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceContext {
    pub transaction_price_per_unit: Decimal,
    pub purity_factor: Decimal,
    /// Transaction units per one input unit.
    pub quantity_ratio: Decimal,
}

/// A confirmed purchase order: identity anchor plus the pricing block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub pricing: MarketPricing,
    pub deductions: Vec<Deduction>,
}

impl PurchaseOrder {
    pub fn new(id: PurchaseOrderId, pricing: MarketPricing) -> Self {
        Self {
            id,
            pricing,
            deductions: Vec::new(),
        }
    }

    /// Derive the shared pricing context for this order's lines.
    pub fn price_context(&self, fx: &dyn CurrencyConverter) -> DomainResult<PriceContext> {
        Ok(PriceContext {
            transaction_price_per_unit: self.pricing.transaction_price_per_unit(fx)?,
            purity_factor: self.pricing.purity_factor,
            quantity_ratio: self.pricing.input_unit.ratio_to(self.pricing.transaction_unit),
        })
    }

    /// Sum of signed deduction rows in the transaction currency.
    pub fn total_deductions(&self, fx: &dyn CurrencyConverter) -> DomainResult<Decimal> {
        let mut total = Decimal::ZERO;
        for d in &self.deductions {
            total += d.signed_amount(fx, &self.pricing.transaction_currency, self.pricing.as_of)?;
        }
        Ok(total)
    }

    /// Net order total: line amounts plus signed deductions, truncated.
    pub fn net_total<'a>(
        &self,
        lines: impl IntoIterator<Item = &'a PurchaseLine>,
        fx: &dyn CurrencyConverter,
    ) -> DomainResult<Decimal> {
        let line_total: Decimal = lines.into_iter().map(|l| l.amount).sum();
        Ok(truncate2(line_total + self.total_deductions(fx)?))
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A purchase order line: immutable identity anchor whose derived pricing
/// fields are recomputed for the life of the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub id: PurchaseLineId,
    pub order_id: PurchaseOrderId,
    pub product_id: ProductId,
    pub gross_weight: Decimal,
    pub first_process_weight: Decimal,
    pub second_process_weight: Decimal,
    pub manual_first_process: Option<Decimal>,
    pub manual_quality: Option<Decimal>,
    pub strategy: Option<QualityStrategy>,
    /// Assay adjustment factor fed to the quality strategy.
    pub dd_factor: Decimal,
    /// Measured quality score, derived.
    pub quality: Decimal,
    /// Weighed quantity expressed in the transaction unit, derived.
    pub converted_quantity: Decimal,
    /// Price per input unit, derived.
    pub rate: Decimal,
    /// Line amount in the transaction currency, derived. This is the cost
    /// the propagation chain pushes into the inbound stock move.
    pub amount: Decimal,
}

impl PurchaseLine {
    pub fn new(
        id: PurchaseLineId,
        order_id: PurchaseOrderId,
        product_id: ProductId,
    ) -> Self {
        Self {
            id,
            order_id,
            product_id,
            gross_weight: Decimal::ZERO,
            first_process_weight: Decimal::ZERO,
            second_process_weight: Decimal::ZERO,
            manual_first_process: None,
            manual_quality: None,
            strategy: None,
            dd_factor: Decimal::ZERO,
            quality: Decimal::ZERO,
            converted_quantity: Decimal::ZERO,
            rate: Decimal::ZERO,
            amount: Decimal::ZERO,
        }
    }

    /// Weighed first-process quantity, manual override winning.
    pub fn effective_first_process(&self) -> Decimal {
        self.manual_first_process.unwrap_or(self.first_process_weight)
    }

    /// Cost per weighed unit.
    pub fn unit_cost(&self) -> Decimal {
        truncate2(guarded_div(self.amount, self.effective_first_process()))
    }

    /// Recompute all derived pricing fields against an order context.
    ///
    /// Each stored value is truncated at its own boundary so a re-derivation
    /// is bit-stable.
    pub fn reprice(&mut self, ctx: &PriceContext) {
        let inputs = QualityInputs {
            gross_weight: self.gross_weight,
            first_process_weight: self.first_process_weight,
            second_process_weight: self.second_process_weight,
            dd_factor: self.dd_factor,
        };
        self.quality = effective_quality(self.manual_quality, self.strategy, &inputs);
        self.converted_quantity = truncate2(ctx.quantity_ratio * self.effective_first_process());
        self.rate = truncate2(
            guarded_div(ctx.transaction_price_per_unit, ctx.purity_factor) * self.quality,
        );
        self.amount = truncate2(guarded_div(
            self.converted_quantity * self.quality * ctx.transaction_price_per_unit,
            ctx.purity_factor,
        ));
    }
}

impl Entity for PurchaseLine {
    type Id = PurchaseLineId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Default purity divisor used by the pricing desk.
pub const DEFAULT_PURITY_FACTOR: Decimal = dec!(92);

#[cfg(test)]
mod tests {
    use super::*;
    use costchain_core::SpotTable;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn usd() -> Currency {
        Currency::new("USD")
    }

    fn pricing(market: Decimal, adjustment: Decimal) -> MarketPricing {
        MarketPricing {
            market_price: market,
            price_adjustment: adjustment,
            market_currency: usd(),
            market_unit: Unit::Gram,
            input_unit: Unit::Gram,
            transaction_unit: Unit::Gram,
            transaction_currency: usd(),
            purity_factor: DEFAULT_PURITY_FACTOR,
            as_of: day(),
        }
    }

    #[test]
    fn net_price_truncates_after_adjustment() {
        let p = pricing(dec!(2400.505), dec!(-23));
        assert_eq!(p.net_price(), dec!(2377.50));
    }

    #[test]
    fn transaction_price_scales_by_unit_convention() {
        let mut p = pricing(dec!(100), Decimal::ZERO);
        p.market_unit = Unit::Kilogram;
        p.transaction_unit = Unit::MetricTon;
        // 100 per kg -> 1000 kg per ton -> 100_000 per ton
        let fx = SpotTable::new();
        assert_eq!(p.transaction_price_per_unit(&fx).unwrap(), dec!(100000.00));
    }

    #[test]
    fn line_repricing_follows_the_quoted_formula() {
        let order = PurchaseOrder::new(PurchaseOrderId::new(EntityId::new()), pricing(dec!(92), Decimal::ZERO));
        let fx = SpotTable::new();
        let ctx = order.price_context(&fx).unwrap();

        let mut line = PurchaseLine::new(
            PurchaseLineId::new(EntityId::new()),
            order.id,
            ProductId::new(),
        );
        line.gross_weight = dec!(100);
        line.first_process_weight = dec!(100);
        line.strategy = Some(QualityStrategy::FirstProcessYield);
        line.reprice(&ctx);

        // quality 100, rate = 92/92 * 100 = 100, amount = 100 * 100 * 92 / 92 = 10000
        assert_eq!(line.quality, dec!(100));
        assert_eq!(line.rate, dec!(100.00));
        assert_eq!(line.converted_quantity, dec!(100.00));
        assert_eq!(line.amount, dec!(10000.00));
        assert_eq!(line.unit_cost(), dec!(100.00));
    }

    #[test]
    fn zero_purity_factor_degrades_rate_and_amount_to_zero() {
        let mut p = pricing(dec!(92), Decimal::ZERO);
        p.purity_factor = Decimal::ZERO;
        let order = PurchaseOrder::new(PurchaseOrderId::new(EntityId::new()), p);
        let ctx = order.price_context(&SpotTable::new()).unwrap();

        let mut line = PurchaseLine::new(
            PurchaseLineId::new(EntityId::new()),
            order.id,
            ProductId::new(),
        );
        line.first_process_weight = dec!(10);
        line.manual_quality = Some(dec!(95));
        line.reprice(&ctx);
        assert_eq!(line.rate, Decimal::ZERO);
        assert_eq!(line.amount, Decimal::ZERO);
    }

    #[test]
    fn deductions_are_signed_and_summed_in_transaction_currency() {
        let mut order =
            PurchaseOrder::new(PurchaseOrderId::new(EntityId::new()), pricing(dec!(100), Decimal::ZERO));
        order.deductions = vec![
            Deduction {
                kind: DeductionKind::Deduction,
                amount: dec!(150),
                currency: usd(),
                comment: Some("freight".to_string()),
            },
            Deduction {
                kind: DeductionKind::Addition,
                amount: dec!(40),
                currency: usd(),
                comment: None,
            },
        ];
        let fx = SpotTable::new();
        assert_eq!(order.total_deductions(&fx).unwrap(), dec!(-110));
    }

    #[test]
    fn manual_first_process_overrides_converted_quantity() {
        let order = PurchaseOrder::new(PurchaseOrderId::new(EntityId::new()), pricing(dec!(92), Decimal::ZERO));
        let ctx = order.price_context(&SpotTable::new()).unwrap();
        let mut line = PurchaseLine::new(
            PurchaseLineId::new(EntityId::new()),
            order.id,
            ProductId::new(),
        );
        line.first_process_weight = dec!(80);
        line.manual_first_process = Some(dec!(75));
        line.manual_quality = Some(dec!(100));
        line.reprice(&ctx);
        assert_eq!(line.converted_quantity, dec!(75.00));
    }
}
