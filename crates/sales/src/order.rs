use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use costchain_core::{
    guarded_div, truncate2, Currency, Entity, EntityId, ProductId, Unit,
};
use costchain_stock::{MoveLine, MoveState, StockMove, StockMoveId};

/// Sale order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleOrderId(pub EntityId);

impl SaleOrderId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sale line identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleLineId(pub EntityId);

impl SaleLineId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleLineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sale order lifecycle.
///
/// An order can be confirmed while its market price is still unfixed; fixing
/// the price moves it to `Confirmed` and triggers a repricing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleOrderStatus {
    Unfixed,
    Confirmed,
    Invoiced,
}

/// A sale order: identity anchor plus the market-price block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleOrder {
    pub id: SaleOrderId,
    pub status: SaleOrderStatus,
    pub market_price: Decimal,
    /// Latest observed market price, for profit/loss against the fixed one.
    pub current_market_price: Option<Decimal>,
    /// Signed adjustment on the quoted price.
    pub price_adjustment: Decimal,
    pub market_currency: Currency,
    /// Net market price after adjustment, derived.
    pub net_price: Decimal,
}

impl SaleOrder {
    pub fn new(id: SaleOrderId, market_currency: Currency) -> Self {
        Self {
            id,
            status: SaleOrderStatus::Unfixed,
            market_price: Decimal::ZERO,
            current_market_price: None,
            price_adjustment: Decimal::ZERO,
            market_currency,
            net_price: Decimal::ZERO,
        }
    }

    /// Re-derive the net price from the quoted price and adjustment.
    pub fn reprice(&mut self) {
        self.net_price = truncate2(self.market_price + self.price_adjustment);
    }

    /// Fix the market price and confirm the order.
    pub fn fix_price(&mut self, market_price: Decimal) {
        self.market_price = market_price;
        if self.status == SaleOrderStatus::Unfixed {
            self.status = SaleOrderStatus::Confirmed;
        }
        self.reprice();
    }

    /// Difference between the observed and the fixed market price, zero when
    /// either side is missing.
    pub fn profit_loss(&self) -> Decimal {
        match self.current_market_price {
            Some(current) if !self.market_price.is_zero() => current - self.market_price,
            _ => Decimal::ZERO,
        }
    }
}

impl Entity for SaleOrder {
    type Id = SaleOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A sale order line: immutable identity anchor whose derived cost fields
/// are recomputed for the life of the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub id: SaleLineId,
    pub order_id: SaleOrderId,
    pub product_id: ProductId,
    /// Quantity delivered so far, in the product's base unit.
    pub delivered_quantity: Decimal,
    /// Quantity already recognized by posted, non-reversed invoice lines.
    pub invoiced_quantity: Decimal,
    pub manual_gross_weight: Option<Decimal>,
    pub manual_quality: Option<Decimal>,
    /// Delivery moves linked to this line.
    pub related_moves: Vec<StockMoveId>,
    /// Price per base unit, derived from the order's net price.
    pub rate: Decimal,
    /// Delivered gross weight, derived.
    pub gross_weight: Decimal,
    /// Average delivered quality, derived.
    pub inventory_quality: Decimal,
    /// Quality-discounted weight actually billable, derived.
    pub net_weight: Decimal,
    /// Total delivered cost over this line's move lines, derived.
    pub product_cost: Decimal,
}

impl SaleLine {
    pub fn new(id: SaleLineId, order_id: SaleOrderId, product_id: ProductId) -> Self {
        Self {
            id,
            order_id,
            product_id,
            delivered_quantity: Decimal::ZERO,
            invoiced_quantity: Decimal::ZERO,
            manual_gross_weight: None,
            manual_quality: None,
            related_moves: Vec::new(),
            rate: Decimal::ZERO,
            gross_weight: Decimal::ZERO,
            inventory_quality: Decimal::ZERO,
            net_weight: Decimal::ZERO,
            product_cost: Decimal::ZERO,
        }
    }

    /// Re-derive the unit rate from the order's net market price. The market
    /// quotes per troy ounce; settlement is per gram.
    pub fn reprice(&mut self, net_price: Decimal) {
        self.rate = truncate2(guarded_div(net_price, Unit::TroyOunce.grams_per_unit()));
    }

    /// Re-derive delivery-dependent values from the line's done moves.
    ///
    /// `product_cost` sums the derived cost over the move lines;
    /// `inventory_quality` is their plain average; `net_weight` discounts
    /// the gross weight by quality. Nothing delivered leaves everything at
    /// zero.
    pub fn recompute_from_deliveries<'a, M, F>(&mut self, moves: M, lines_of: F)
    where
        M: IntoIterator<Item = &'a StockMove>,
        F: Fn(StockMoveId) -> Vec<&'a MoveLine>,
    {
        self.gross_weight = if self.delivered_quantity > Decimal::ZERO {
            self.delivered_quantity
        } else {
            Decimal::ZERO
        };

        let mut cost = Decimal::ZERO;
        let mut quality_sum = Decimal::ZERO;
        let mut line_count = 0u32;
        for mv in moves.into_iter().filter(|m| m.state == MoveState::Done) {
            for line in lines_of(mv.id) {
                cost += line.product_cost;
                quality_sum += line.average_quality;
                line_count += 1;
            }
        }
        self.product_cost = truncate2(cost);
        self.inventory_quality = guarded_div(quality_sum, Decimal::from(line_count));

        let quality = self.manual_quality.unwrap_or(self.inventory_quality);
        let gross = self.manual_gross_weight.unwrap_or(self.gross_weight);
        self.net_weight = truncate2(gross * quality / dec!(100));
    }

    /// Quantity delivered but not yet recognized in COGS.
    pub fn remaining_deliverable(&self) -> Decimal {
        self.delivered_quantity - self.invoiced_quantity
    }
}

impl Entity for SaleLine {
    type Id = SaleLineId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
