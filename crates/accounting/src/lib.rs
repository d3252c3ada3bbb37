//! `costchain-accounting` — accounting entry shapes and the ledger boundary.
//!
//! The engine never owns a ledger; it computes debit/credit magnitudes for
//! the stock-interim and COGS-expense roles and hands them across the
//! [`LedgerGateway`]. Backfilling posted entries is a two-phase operation:
//! compute the rewrites first (pure), then apply each one as
//! unpost -> rewrite -> repost, surfacing any failed repost instead of
//! pretending the old amounts survived.

pub mod entry;
pub mod repost;

pub use entry::{
    cogs_entry_lines, is_balanced, Account, AccountKind, CogsAccounts, EntryId, EntryLine,
    InMemoryLedger, LedgerGateway,
};
pub use repost::{
    apply_adjustments, plan_adjustment, BackfillReport, EntryAdjustment, RepostError,
    ADJUST_TOLERANCE,
};
