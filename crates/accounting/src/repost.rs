use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use costchain_core::DomainError;

use crate::entry::{EntryId, EntryLine, LedgerGateway};

/// Magnitude below which an entry is left alone rather than cycled through
/// unpost/repost.
pub const ADJUST_TOLERANCE: Decimal = dec!(0.01);

/// Failure while applying one adjustment. The entry named here is left in
/// whatever state the ledger reached; a `Repost` failure means it is sitting
/// unposted and needs manual correction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepostError {
    #[error("repost failed for entry {entry}: {reason}; entry left unposted")]
    Repost { entry: EntryId, reason: String },

    #[error("could not unpost entry {entry}: {reason}")]
    Unpost { entry: EntryId, reason: String },

    #[error("could not rewrite entry {entry}: {reason}")]
    Rewrite { entry: EntryId, reason: String },
}

/// A planned rewrite of one posted entry. Produced by the pure phase,
/// consumed by [`apply_adjustments`].
#[derive(Debug, Clone, PartialEq)]
pub struct EntryAdjustment {
    pub entry: EntryId,
    pub lines: Vec<EntryLine>,
}

/// Outcome of one backfill batch: how many entries were rewritten, how many
/// were already within tolerance, and which ones failed along the way.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BackfillReport {
    pub updated: usize,
    pub skipped: usize,
    pub failures: Vec<RepostError>,
}

/// Phase one (pure): decide whether an entry needs rewriting.
///
/// Returns `None` when the debit and credit totals both move by no more than
/// [`ADJUST_TOLERANCE`] — reposting an entry to change it by a sub-cent
/// amount churns the ledger for nothing.
pub fn plan_adjustment(
    entry: EntryId,
    current: &[EntryLine],
    desired: Vec<EntryLine>,
) -> Option<EntryAdjustment> {
    let debit_now: Decimal = current.iter().map(|l| l.debit).sum();
    let credit_now: Decimal = current.iter().map(|l| l.credit).sum();
    let debit_new: Decimal = desired.iter().map(|l| l.debit).sum();
    let credit_new: Decimal = desired.iter().map(|l| l.credit).sum();

    if (debit_now - debit_new).abs() <= ADJUST_TOLERANCE
        && (credit_now - credit_new).abs() <= ADJUST_TOLERANCE
    {
        return None;
    }
    Some(EntryAdjustment {
        entry,
        lines: desired,
    })
}

/// Phase two: apply planned adjustments via unpost -> rewrite -> repost.
///
/// Takes the planning phase's output directly: a `None` plan counts as a
/// skipped entry. Each adjustment is applied independently; one failure
/// never aborts the rest of the batch (at-least-once, not all-or-nothing).
/// If the rewrite fails after a successful unpost, the original content is
/// reposted so the ledger keeps the old amounts; if the *repost* fails, the
/// entry stays unposted and the failure is surfaced for manual correction.
pub fn apply_adjustments(
    gateway: &mut dyn LedgerGateway,
    plans: impl IntoIterator<Item = Option<EntryAdjustment>>,
) -> BackfillReport {
    let mut report = BackfillReport::default();

    for plan in plans {
        let Some(adjustment) = plan else {
            report.skipped += 1;
            continue;
        };
        let entry = adjustment.entry;

        if let Err(e) = gateway.unpost(entry) {
            report.failures.push(RepostError::Unpost {
                entry,
                reason: reason(e),
            });
            continue;
        }

        if let Err(e) = gateway.rewrite(entry, adjustment.lines) {
            // restore the old amounts if the ledger still lets us
            let restore = gateway.repost(entry);
            report.failures.push(RepostError::Rewrite {
                entry,
                reason: reason(e),
            });
            if let Err(e) = restore {
                report.failures.push(RepostError::Repost {
                    entry,
                    reason: reason(e),
                });
            }
            continue;
        }

        match gateway.repost(entry) {
            Ok(()) => report.updated += 1,
            Err(e) => report.failures.push(RepostError::Repost {
                entry,
                reason: reason(e),
            }),
        }
    }

    tracing::info!(
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failures.len(),
        "ledger backfill applied"
    );
    report
}

fn reason(e: DomainError) -> String {
    e.to_string()
}
