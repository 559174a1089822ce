//! Report rows as seen by the assignment engine
//!
//! Only the orchestrator may change `authority_id`; intake only ever inserts
//! reports unassigned.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::{catalog_store, AssignmentDatabase};
use crate::types::{NewReport, Report};
use crate::{Error, Result};

const REPORT_COLUMNS: &str =
    "id, issue_category_id, city_id, region, authority_id, status, created_at, updated_at";

/// Insert an unassigned report. Its category and city must be in the catalog.
pub async fn insert_report(conn: &mut SqliteConnection, request: NewReport) -> Result<Report> {
    if !catalog_store::issue_category_exists(conn, request.issue_category_id).await? {
        return Err(Error::not_found(format!("issue category {}", request.issue_category_id)));
    }
    if let Some(city_id) = request.city_id {
        if !catalog_store::city_exists(conn, city_id).await? {
            return Err(Error::not_found(format!("city {city_id}")));
        }
    }

    let now = Utc::now();
    let region = request
        .region
        .map(|region| region.trim().to_string())
        .filter(|region| !region.is_empty());

    let id = sqlx::query(
        "INSERT INTO reports (issue_category_id, city_id, region, authority_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?5)",
    )
    .bind(request.issue_category_id)
    .bind(request.city_id)
    .bind(&region)
    .bind(&request.status)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    debug!("📝 Inserted report {}", id);

    Ok(Report {
        id,
        issue_category_id: request.issue_category_id,
        city_id: request.city_id,
        region,
        authority_id: None,
        status: request.status,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_report(conn: &mut SqliteConnection, report_id: i64) -> Result<Option<Report>> {
    let query = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1");

    let report = sqlx::query_as::<_, Report>(&query)
        .bind(report_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(report)
}

/// Take the write lock on a report before reading it.
///
/// SQLite has no row locks; this no-op write acquires the database write lock
/// for the enclosing transaction, so a concurrent decision on the same report
/// waits here until the first one commits. Returns `false` when the report
/// does not exist.
pub async fn lock_report(conn: &mut SqliteConnection, report_id: i64) -> Result<bool> {
    let touched = sqlx::query("UPDATE reports SET authority_id = authority_id WHERE id = ?1")
        .bind(report_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(touched > 0)
}

pub async fn update_report_authority(
    conn: &mut SqliteConnection,
    report_id: i64,
    authority_id: Option<i64>,
) -> Result<()> {
    sqlx::query("UPDATE reports SET authority_id = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(authority_id)
        .bind(Utc::now())
        .bind(report_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Report store for one-off reads and intake outside a caller's transaction
#[derive(Clone)]
pub struct ReportStore {
    db: AssignmentDatabase,
}

impl ReportStore {
    pub fn new(db: AssignmentDatabase) -> Self {
        Self { db }
    }

    pub async fn create_report(&self, request: NewReport) -> Result<Report> {
        let mut conn = self.db.pool().acquire().await?;
        insert_report(&mut conn, request).await
    }

    pub async fn get_report(&self, report_id: i64) -> Result<Option<Report>> {
        let mut conn = self.db.pool().acquire().await?;
        get_report(&mut conn, report_id).await
    }
}
