//! # Assignment Ledger
//!
//! Read side of the append-only audit trail. Entries for a report, read in
//! creation order, reconstruct every authority the report has held: each
//! entry's `previous_authority_id` equals the preceding entry's
//! `new_authority_id`, starting from an unassigned report, and the last
//! entry's `new_authority_id` is the report's current authority.

use std::fmt;

use sqlx::SqliteConnection;

use crate::database::ledger_store::{self, DbHistoryRow};
use crate::types::{AssignmentHistoryItem, AssignmentLedgerEntry, AuthoritySummary};
use crate::Result;

/// A place where the ledger chain does not reconstruct the report's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainBreak {
    /// Entry `entry_id` starts from an authority other than where the previous one ended
    Gap {
        entry_id: i64,
        expected_previous: Option<i64>,
        recorded_previous: Option<i64>,
    },
    /// The last entry disagrees with the report's stored authority
    HeadMismatch {
        last_entry_id: Option<i64>,
        ledger_authority: Option<i64>,
        report_authority: Option<i64>,
    },
}

impl fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainBreak::Gap {
                entry_id,
                expected_previous,
                recorded_previous,
            } => write!(
                f,
                "entry {entry_id} records previous authority {recorded_previous:?}, chain expected {expected_previous:?}"
            ),
            ChainBreak::HeadMismatch {
                last_entry_id,
                ledger_authority,
                report_authority,
            } => write!(
                f,
                "ledger ends at {ledger_authority:?} (entry {last_entry_id:?}) but report holds {report_authority:?}"
            ),
        }
    }
}

/// Check that `entries` (oldest first) reconstruct `current_authority`
pub fn verify_chain(entries: &[AssignmentLedgerEntry], current_authority: Option<i64>) -> Vec<ChainBreak> {
    let mut breaks = Vec::new();
    let mut held: Option<i64> = None;

    for entry in entries {
        if entry.previous_authority_id != held {
            breaks.push(ChainBreak::Gap {
                entry_id: entry.id,
                expected_previous: held,
                recorded_previous: entry.previous_authority_id,
            });
        }
        held = entry.new_authority_id;
    }

    if held != current_authority {
        breaks.push(ChainBreak::HeadMismatch {
            last_entry_id: entries.last().map(|entry| entry.id),
            ledger_authority: held,
            report_authority: current_authority,
        });
    }

    breaks
}

fn summary(id: Option<i64>, name: Option<String>) -> Option<AuthoritySummary> {
    id.map(|id| AuthoritySummary { id, name })
}

/// Decode a joined ledger row into the audit view
pub fn decode_history_row(row: DbHistoryRow) -> Result<AssignmentHistoryItem> {
    let DbHistoryRow {
        entry,
        previous_authority_name,
        new_authority_name,
    } = row;
    let entry = AssignmentLedgerEntry::try_from(entry)?;

    Ok(AssignmentHistoryItem {
        timestamp: entry.created_at,
        from_authority: summary(entry.previous_authority_id, previous_authority_name),
        to_authority: summary(entry.new_authority_id, new_authority_name),
        outcome: entry.outcome,
        reason: entry.reason,
        actor: entry.actor_id,
        trigger: entry.trigger,
    })
}

/// Decoded history for a report, oldest first
pub async fn history_for_report(conn: &mut SqliteConnection, report_id: i64) -> Result<Vec<AssignmentHistoryItem>> {
    ledger_store::history_rows_for_report(conn, report_id)
        .await?
        .into_iter()
        .map(decode_history_row)
        .collect()
}
