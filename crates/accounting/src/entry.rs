use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use costchain_core::{truncate2, Currency, DomainError, DomainResult, EntityId};

/// Accounting entry identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub EntityId);

impl EntryId {
    pub fn new(id: EntityId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for EntryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// Account identifier + metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
}

/// One side of an accounting entry. Exactly one of debit/credit is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryLine {
    pub account: Account,
    pub debit: Decimal,
    pub credit: Decimal,
    pub currency: Currency,
}

impl EntryLine {
    pub fn debit(account: Account, amount: Decimal, currency: Currency) -> Self {
        Self {
            account,
            debit: amount,
            credit: Decimal::ZERO,
            currency,
        }
    }

    pub fn credit(account: Account, amount: Decimal, currency: Currency) -> Self {
        Self {
            account,
            debit: Decimal::ZERO,
            credit: amount,
            currency,
        }
    }
}

/// Debits equal credits across the lines.
pub fn is_balanced(lines: &[EntryLine]) -> bool {
    let debit: Decimal = lines.iter().map(|l| l.debit).sum();
    let credit: Decimal = lines.iter().map(|l| l.credit).sum();
    debit == credit
}

/// The two account roles a COGS entry touches. Account selection beyond
/// these roles (and all tax) belongs to the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CogsAccounts {
    pub stock_interim: Account,
    pub cogs_expense: Account,
}

/// Build the two lines of a COGS entry for an invoice slice.
///
/// An invoice debits the expense and credits stock interim; a credit memo
/// (negative signed quantity) mirrors the sides so the clawback reverses the
/// original recognition.
pub fn cogs_entry_lines(
    accounts: &CogsAccounts,
    unit_cost: Decimal,
    signed_quantity: Decimal,
    currency: &Currency,
) -> Vec<EntryLine> {
    let magnitude = truncate2((unit_cost * signed_quantity).abs());
    if signed_quantity >= Decimal::ZERO {
        vec![
            EntryLine::debit(accounts.cogs_expense.clone(), magnitude, currency.clone()),
            EntryLine::credit(accounts.stock_interim.clone(), magnitude, currency.clone()),
        ]
    } else {
        vec![
            EntryLine::debit(accounts.stock_interim.clone(), magnitude, currency.clone()),
            EntryLine::credit(accounts.cogs_expense.clone(), magnitude, currency.clone()),
        ]
    }
}

/// Ledger boundary.
///
/// `post` is the initial write; `unpost`/`rewrite`/`repost` exist only for
/// the two-phase backfill, mirroring the draft -> write -> post cycle of the
/// host ledger.
pub trait LedgerGateway {
    fn post(&mut self, lines: Vec<EntryLine>) -> DomainResult<EntryId>;
    fn unpost(&mut self, entry: EntryId) -> DomainResult<()>;
    fn rewrite(&mut self, entry: EntryId, lines: Vec<EntryLine>) -> DomainResult<()>;
    fn repost(&mut self, entry: EntryId) -> DomainResult<()>;
}

/// In-memory ledger double.
///
/// Tracks posted state per entry and can be told to fail reposts for chosen
/// entries, which is how the backfill's failure handling is exercised.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: HashMap<EntryId, (Vec<EntryLine>, bool)>,
    fail_repost: Vec<EntryId>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_repost_of(mut self, entry: EntryId) -> Self {
        self.fail_repost.push(entry);
        self
    }

    pub fn lines(&self, entry: EntryId) -> Option<&[EntryLine]> {
        self.entries.get(&entry).map(|(lines, _)| lines.as_slice())
    }

    pub fn is_posted(&self, entry: EntryId) -> bool {
        self.entries.get(&entry).is_some_and(|(_, posted)| *posted)
    }
}

impl LedgerGateway for InMemoryLedger {
    fn post(&mut self, lines: Vec<EntryLine>) -> DomainResult<EntryId> {
        if !is_balanced(&lines) {
            return Err(DomainError::invariant("debits must equal credits"));
        }
        let id = EntryId::new(EntityId::new());
        self.entries.insert(id, (lines, true));
        Ok(id)
    }

    fn unpost(&mut self, entry: EntryId) -> DomainResult<()> {
        match self.entries.get_mut(&entry) {
            Some((_, posted)) => {
                *posted = false;
                Ok(())
            }
            None => Err(DomainError::not_found()),
        }
    }

    fn rewrite(&mut self, entry: EntryId, lines: Vec<EntryLine>) -> DomainResult<()> {
        if !is_balanced(&lines) {
            return Err(DomainError::invariant("debits must equal credits"));
        }
        match self.entries.get_mut(&entry) {
            Some((existing, posted)) => {
                if *posted {
                    return Err(DomainError::conflict("cannot rewrite a posted entry"));
                }
                *existing = lines;
                Ok(())
            }
            None => Err(DomainError::not_found()),
        }
    }

    fn repost(&mut self, entry: EntryId) -> DomainResult<()> {
        if self.fail_repost.contains(&entry) {
            return Err(DomainError::external("ledger rejected repost"));
        }
        match self.entries.get_mut(&entry) {
            Some((_, posted)) => {
                *posted = true;
                Ok(())
            }
            None => Err(DomainError::not_found()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn accounts() -> CogsAccounts {
        CogsAccounts {
            stock_interim: Account {
                code: "1101".to_string(),
                name: "Stock Interim (Delivered)".to_string(),
                kind: AccountKind::Asset,
            },
            cogs_expense: Account {
                code: "5100".to_string(),
                name: "Cost of Goods Sold".to_string(),
                kind: AccountKind::Expense,
            },
        }
    }

    #[test]
    fn invoice_entry_debits_expense_and_credits_interim() {
        let lines = cogs_entry_lines(&accounts(), dec!(16.66), dec!(15), &Currency::new("USD"));
        assert!(is_balanced(&lines));
        assert_eq!(lines[0].account.kind, AccountKind::Expense);
        assert_eq!(lines[0].debit, dec!(249.90));
        assert_eq!(lines[1].credit, dec!(249.90));
    }

    #[test]
    fn credit_memo_mirrors_the_sides() {
        let lines = cogs_entry_lines(&accounts(), dec!(10), dec!(-10), &Currency::new("USD"));
        assert!(is_balanced(&lines));
        assert_eq!(lines[0].account.kind, AccountKind::Asset);
        assert_eq!(lines[0].debit, dec!(100.00));
        assert_eq!(lines[1].account.kind, AccountKind::Expense);
        assert_eq!(lines[1].credit, dec!(100.00));
    }

    #[test]
    fn in_memory_ledger_rejects_unbalanced_entries() {
        let mut ledger = InMemoryLedger::new();
        let acc = accounts();
        let lines = vec![EntryLine::debit(
            acc.cogs_expense,
            dec!(10),
            Currency::new("USD"),
        )];
        assert!(ledger.post(lines).is_err());
    }

    #[test]
    fn rewrite_requires_unposted_state() {
        let mut ledger = InMemoryLedger::new();
        let lines = cogs_entry_lines(&accounts(), dec!(10), dec!(5), &Currency::new("USD"));
        let id = ledger.post(lines.clone()).unwrap();
        assert!(ledger.rewrite(id, lines.clone()).is_err());
        ledger.unpost(id).unwrap();
        assert!(ledger.rewrite(id, lines).is_ok());
    }
}
