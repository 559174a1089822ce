//! Append-only assignment ledger storage
//!
//! Entries are written once and never touched again; the schema's triggers
//! abort any UPDATE or DELETE. Chronological order is the insertion sequence
//! (`id`), not the wall-clock timestamp.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::AssignmentDatabase;
use crate::types::{AssignmentLedgerEntry, NewLedgerEntry};
use crate::{Error, Result};

/// Ledger row as stored; trigger and outcome still in their text form
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct DbLedgerEntry {
    pub id: i64,
    pub report_id: i64,
    pub actor_id: String,
    pub trigger_kind: String,
    pub outcome: String,
    pub previous_authority_id: Option<i64>,
    pub new_authority_id: Option<i64>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbLedgerEntry> for AssignmentLedgerEntry {
    type Error = Error;

    fn try_from(row: DbLedgerEntry) -> Result<Self> {
        let trigger = row
            .trigger_kind
            .parse()
            .map_err(|_| Error::corrupt(format!("ledger entry {} has trigger {:?}", row.id, row.trigger_kind)))?;
        let outcome = row
            .outcome
            .parse()
            .map_err(|_| Error::corrupt(format!("ledger entry {} has outcome {:?}", row.id, row.outcome)))?;

        Ok(AssignmentLedgerEntry {
            id: row.id,
            report_id: row.report_id,
            actor_id: row.actor_id,
            trigger,
            outcome,
            previous_authority_id: row.previous_authority_id,
            new_authority_id: row.new_authority_id,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

/// Ledger row joined with the names of the authorities it references
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct DbHistoryRow {
    #[sqlx(flatten)]
    pub entry: DbLedgerEntry,
    pub previous_authority_name: Option<String>,
    pub new_authority_name: Option<String>,
}

/// Append one entry and return it as stored
pub async fn append_entry(conn: &mut SqliteConnection, entry: NewLedgerEntry) -> Result<AssignmentLedgerEntry> {
    let created_at = Utc::now();

    let id = sqlx::query(
        "INSERT INTO assignment_ledger (
            report_id, actor_id, trigger_kind, outcome,
            previous_authority_id, new_authority_id, reason, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(entry.report_id)
    .bind(&entry.actor_id)
    .bind(entry.trigger.as_str())
    .bind(entry.outcome.as_str())
    .bind(entry.previous_authority_id)
    .bind(entry.new_authority_id)
    .bind(&entry.reason)
    .bind(created_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    debug!(
        "🧾 Ledger entry {} for report {}: {} {:?} -> {:?}",
        id, entry.report_id, entry.outcome, entry.previous_authority_id, entry.new_authority_id
    );

    Ok(AssignmentLedgerEntry {
        id,
        report_id: entry.report_id,
        actor_id: entry.actor_id,
        trigger: entry.trigger,
        outcome: entry.outcome,
        previous_authority_id: entry.previous_authority_id,
        new_authority_id: entry.new_authority_id,
        reason: entry.reason,
        created_at,
    })
}

/// All entries for a report, oldest first
pub async fn entries_for_report(conn: &mut SqliteConnection, report_id: i64) -> Result<Vec<AssignmentLedgerEntry>> {
    let rows = sqlx::query_as::<_, DbLedgerEntry>(
        "SELECT id, report_id, actor_id, trigger_kind, outcome,
                previous_authority_id, new_authority_id, reason, created_at
         FROM assignment_ledger
         WHERE report_id = ?1
         ORDER BY id ASC",
    )
    .bind(report_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(AssignmentLedgerEntry::try_from).collect()
}

/// All entries for a report with authority names resolved, oldest first
pub async fn history_rows_for_report(conn: &mut SqliteConnection, report_id: i64) -> Result<Vec<DbHistoryRow>> {
    let rows = sqlx::query_as::<_, DbHistoryRow>(
        "SELECT l.id, l.report_id, l.actor_id, l.trigger_kind, l.outcome,
                l.previous_authority_id, l.new_authority_id, l.reason, l.created_at,
                pa.name AS previous_authority_name,
                na.name AS new_authority_name
         FROM assignment_ledger l
         LEFT JOIN authorities pa ON pa.id = l.previous_authority_id
         LEFT JOIN authorities na ON na.id = l.new_authority_id
         WHERE l.report_id = ?1
         ORDER BY l.id ASC",
    )
    .bind(report_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

pub async fn count_for_report(conn: &mut SqliteConnection, report_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM assignment_ledger WHERE report_id = ?1")
        .bind(report_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

/// Read-only ledger access over the pool
#[derive(Clone)]
pub struct LedgerStore {
    db: AssignmentDatabase,
}

impl LedgerStore {
    pub fn new(db: AssignmentDatabase) -> Self {
        Self { db }
    }

    pub async fn entries_for_report(&self, report_id: i64) -> Result<Vec<AssignmentLedgerEntry>> {
        let mut conn = self.db.pool().acquire().await?;
        entries_for_report(&mut conn, report_id).await
    }

    pub async fn count_for_report(&self, report_id: i64) -> Result<i64> {
        let mut conn = self.db.pool().acquire().await?;
        count_for_report(&mut conn, report_id).await
    }

    pub async fn total_entries(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM assignment_ledger")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}
