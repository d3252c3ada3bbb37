use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use costchain_core::{Entity, EntityId, ProductId, Unit};
use costchain_sales::SaleLineId;

/// Invoice line identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceLineId(pub EntityId);

impl InvoiceLineId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceLineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Whether a line invoices quantity or claws it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Invoice,
    CreditMemo,
}

/// A posted invoice line, as the matcher sees it.
///
/// COGS entries are created once per invoice posting and never mutated in
/// place; a credit memo supersedes them with a reversal line pointing back
/// at the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: InvoiceLineId,
    pub sale_line: SaleLineId,
    pub product_id: ProductId,
    pub kind: InvoiceKind,
    /// Positive magnitude in `unit`.
    pub quantity: Decimal,
    pub unit: Unit,
    /// Cost carried over from the sale line at creation time.
    pub product_cost: Decimal,
    /// Unit cost the matcher assigned when this line was posted.
    pub posted_unit_cost: Decimal,
    pub is_cogs: bool,
    pub reversal_of: Option<InvoiceLineId>,
}

impl InvoiceLine {
    pub fn new(
        id: InvoiceLineId,
        sale_line: SaleLineId,
        product_id: ProductId,
        kind: InvoiceKind,
        quantity: Decimal,
        unit: Unit,
    ) -> Self {
        Self {
            id,
            sale_line,
            product_id,
            kind,
            quantity,
            unit,
            product_cost: Decimal::ZERO,
            posted_unit_cost: Decimal::ZERO,
            is_cogs: false,
            reversal_of: None,
        }
    }

    pub fn as_cogs(mut self) -> Self {
        self.is_cogs = true;
        self
    }

    pub fn reversing(mut self, original: InvoiceLineId) -> Self {
        self.kind = InvoiceKind::CreditMemo;
        self.reversal_of = Some(original);
        self
    }

    /// Quantity with the credit-memo sign applied.
    pub fn signed_quantity(&self) -> Decimal {
        match self.kind {
            InvoiceKind::Invoice => self.quantity,
            InvoiceKind::CreditMemo => -self.quantity,
        }
    }

    /// Quantity expressed in the product's base unit.
    pub fn base_quantity(&self, base: Unit) -> Decimal {
        self.unit.convert_quantity(self.quantity, base)
    }
}

impl Entity for InvoiceLine {
    type Id = InvoiceLineId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
