//! # Assignment Orchestrator
//!
//! Transactional state machine that owns every change to a report's
//! `authority_id`. Each decision runs in exactly one transaction and commits
//! two things together or not at all:
//!
//! 1. the report's new `authority_id`
//! 2. one append-only ledger entry describing the decision
//!
//! ## Paths
//!
//! - **assign** (trigger `System`, also `Admin`/`Retry`): runs the
//!   [`resolver`](crate::resolver). Configuration gaps are outcomes, not errors.
//! - **reassign** (admin only): explicit target or explicit unassignment;
//!   bypasses the resolver. Misuse (unknown, cross-city or inactive target) is
//!   an error and leaves everything untouched.
//! - **retry_assignment**: re-runs matching with the report's stored category,
//!   city and region.
//!
//! Every operation has an `_in` variant taking `&mut SqliteConnection`, so a
//! caller that already holds a transaction (report intake creating the report)
//! can make its own writes and the assignment one atomic unit.
//!
//! ## Concurrency
//!
//! The first statement of a decision is a write on the report row, which takes
//! SQLite's write lock. A concurrent decision on the same report waits there
//! (up to the configured busy timeout), then reads the committed result of
//! the first as its `previous` authority.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::config::AssignmentConfig;
use crate::database::{catalog_store, ledger_store, report_store, AssignmentDatabase};
use crate::ledger::{self, ChainBreak};
use crate::resolver;
use crate::types::{
    AssignRequest, AssignmentHistoryItem, AssignmentLedgerEntry, AssignmentOutcome, AssignmentResult,
    NewLedgerEntry, NewReport, Report, Trigger,
};
use crate::{Error, Result};

/// Operations exposed to the admin/HTTP layer
#[async_trait]
pub trait AssignmentService: Send + Sync {
    /// Automatic assignment, invoked by report intake
    async fn assign(&self, request: AssignRequest) -> Result<AssignmentResult>;

    /// Explicit admin override; `None` unassigns the report
    async fn reassign(&self, report_id: i64, authority_id: Option<i64>, actor_id: &str) -> Result<AssignmentResult>;

    /// Re-run automatic matching with the report's stored attributes
    async fn retry_assignment(&self, report_id: i64, actor_id: &str) -> Result<AssignmentResult>;

    /// Decoded ledger for a report, oldest first
    async fn assignment_history(&self, report_id: i64) -> Result<Vec<AssignmentHistoryItem>>;
}

/// Decision to be written: the report's new authority plus its audit record
struct Decision {
    trigger: Trigger,
    actor_id: String,
    outcome: AssignmentOutcome,
    authority_id: Option<i64>,
    reason: String,
}

#[derive(Clone)]
pub struct AssignmentOrchestrator {
    db: AssignmentDatabase,
    system_actor_id: String,
}

impl AssignmentOrchestrator {
    pub fn new(db: AssignmentDatabase, config: &AssignmentConfig) -> Self {
        Self::with_system_actor(db, config.system_actor_id.clone())
    }

    pub fn with_system_actor(db: AssignmentDatabase, system_actor_id: impl Into<String>) -> Self {
        Self {
            db,
            system_actor_id: system_actor_id.into(),
        }
    }

    pub fn system_actor_id(&self) -> &str {
        &self.system_actor_id
    }

    /// Run automatic matching for a report in its own transaction
    pub async fn assign(&self, request: AssignRequest) -> Result<AssignmentResult> {
        self.decision_actor(request.trigger, request.actor_id.as_deref())?;
        self.ensure_report_exists(request.report_id).await?;

        let mut tx = self.db.begin().await?;
        let result = self.assign_in(&mut tx, request).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Run automatic matching inside the caller's transaction
    pub async fn assign_in(&self, conn: &mut SqliteConnection, request: AssignRequest) -> Result<AssignmentResult> {
        let actor_id = self.decision_actor(request.trigger, request.actor_id.as_deref())?;
        let report = lock_for_decision(conn, request.report_id).await?;

        let decision = self
            .automatic_decision(
                conn,
                request.issue_category_id,
                request.city_id,
                request.region.as_deref(),
                request.trigger,
                actor_id,
            )
            .await?;

        record_decision(conn, &report, decision).await
    }

    /// Explicit admin override in its own transaction
    pub async fn reassign(
        &self,
        report_id: i64,
        authority_id: Option<i64>,
        actor_id: &str,
    ) -> Result<AssignmentResult> {
        self.decision_actor(Trigger::Admin, Some(actor_id))?;
        self.ensure_report_exists(report_id).await?;

        let mut tx = self.db.begin().await?;
        let result = self.reassign_in(&mut tx, report_id, authority_id, actor_id).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Explicit admin override inside the caller's transaction
    pub async fn reassign_in(
        &self,
        conn: &mut SqliteConnection,
        report_id: i64,
        authority_id: Option<i64>,
        actor_id: &str,
    ) -> Result<AssignmentResult> {
        let actor_id = self.decision_actor(Trigger::Admin, Some(actor_id))?;
        let report = lock_for_decision(conn, report_id).await?;

        let reason = match authority_id {
            None => "admin override: unassigned".to_string(),
            Some(target_id) => {
                let target = catalog_store::get_authority(conn, target_id)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("authority {target_id}")))?;

                if report.city_id != Some(target.city_id) {
                    warn!(
                        "🚫 Rejected cross-city reassignment of report {} (city {:?}) to authority {} (city {}) by {}",
                        report.id, report.city_id, target.id, target.city_id, actor_id
                    );
                    return Err(Error::CrossCityReassignment {
                        authority_id: target.id,
                        authority_city_id: target.city_id,
                        report_city_id: report.city_id,
                    });
                }

                if !target.is_active() {
                    warn!(
                        "🚫 Rejected reassignment of report {} to inactive authority {} by {}",
                        report.id, target.id, actor_id
                    );
                    return Err(Error::InactiveAuthority(target.id));
                }

                format!("admin override: assigned to {} ({})", target.name, target.id)
            }
        };

        let decision = Decision {
            trigger: Trigger::Admin,
            actor_id,
            outcome: AssignmentOutcome::ReassignedByAdmin,
            authority_id,
            reason,
        };

        record_decision(conn, &report, decision).await
    }

    /// Re-run automatic matching in its own transaction
    pub async fn retry_assignment(&self, report_id: i64, actor_id: &str) -> Result<AssignmentResult> {
        self.decision_actor(Trigger::Retry, Some(actor_id))?;
        self.ensure_report_exists(report_id).await?;

        let mut tx = self.db.begin().await?;
        let result = self.retry_assignment_in(&mut tx, report_id, actor_id).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Re-run automatic matching inside the caller's transaction
    pub async fn retry_assignment_in(
        &self,
        conn: &mut SqliteConnection,
        report_id: i64,
        actor_id: &str,
    ) -> Result<AssignmentResult> {
        let actor_id = self.decision_actor(Trigger::Retry, Some(actor_id))?;
        let report = lock_for_decision(conn, report_id).await?;

        let decision = match report.city_id {
            Some(city_id) => {
                self.automatic_decision(
                    conn,
                    report.issue_category_id,
                    city_id,
                    report.region.as_deref(),
                    Trigger::Retry,
                    actor_id,
                )
                .await?
            }
            None => Decision {
                trigger: Trigger::Retry,
                actor_id,
                outcome: AssignmentOutcome::UnassignedConfigurationError,
                authority_id: None,
                reason: "report has no city recorded".to_string(),
            },
        };

        record_decision(conn, &report, decision).await
    }

    /// Create a report and, when its city is known, assign it; one transaction.
    ///
    /// Reports without a city are stored unassigned and no decision is made.
    pub async fn intake_report(&self, request: NewReport) -> Result<(Report, Option<AssignmentResult>)> {
        let mut tx = self.db.begin().await?;

        let report = report_store::insert_report(&mut tx, request).await?;
        let result = match AssignRequest::for_report(&report, Trigger::System, None) {
            Some(assign) => Some(self.assign_in(&mut tx, assign).await?),
            None => {
                debug!("Report {} has no city; skipping automatic assignment", report.id);
                None
            }
        };

        tx.commit().await?;

        let report = Report {
            authority_id: result.as_ref().and_then(|result| result.authority_id),
            ..report
        };
        Ok((report, result))
    }

    /// Decoded ledger for a report, oldest first
    pub async fn assignment_history(&self, report_id: i64) -> Result<Vec<AssignmentHistoryItem>> {
        let mut conn = self.db.pool().acquire().await?;
        if report_store::get_report(&mut conn, report_id).await?.is_none() {
            return Err(Error::not_found(format!("report {report_id}")));
        }
        ledger::history_for_report(&mut conn, report_id).await
    }

    /// Raw ledger entries for a report, oldest first
    pub async fn ledger_entries(&self, report_id: i64) -> Result<Vec<AssignmentLedgerEntry>> {
        let mut conn = self.db.pool().acquire().await?;
        if report_store::get_report(&mut conn, report_id).await?.is_none() {
            return Err(Error::not_found(format!("report {report_id}")));
        }
        ledger_store::entries_for_report(&mut conn, report_id).await
    }

    /// Check that a report's ledger reconstructs its current authority
    pub async fn verify_ledger(&self, report_id: i64) -> Result<Vec<ChainBreak>> {
        let mut tx = self.db.begin().await?;
        let report = report_store::get_report(&mut tx, report_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("report {report_id}")))?;
        let entries = ledger_store::entries_for_report(&mut tx, report_id).await?;
        tx.commit().await?;

        Ok(ledger::verify_chain(&entries, report.authority_id))
    }

    /// Actor to record for a decision, or `MissingActor` when one is required
    fn decision_actor(&self, trigger: Trigger, actor_id: Option<&str>) -> Result<String> {
        let actor_id = actor_id.map(str::trim).filter(|actor| !actor.is_empty());

        if trigger.requires_actor() && actor_id.is_none() {
            return Err(Error::MissingActor);
        }

        match (trigger, actor_id) {
            (Trigger::System, _) | (_, None) => Ok(self.system_actor_id.clone()),
            (_, Some(actor)) => Ok(actor.to_string()),
        }
    }

    async fn ensure_report_exists(&self, report_id: i64) -> Result<()> {
        let mut conn = self.db.pool().acquire().await?;
        match report_store::get_report(&mut conn, report_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!("report {report_id}"))),
        }
    }

    async fn automatic_decision(
        &self,
        conn: &mut SqliteConnection,
        issue_category_id: i64,
        city_id: i64,
        region: Option<&str>,
        trigger: Trigger,
        actor_id: String,
    ) -> Result<Decision> {
        if !catalog_store::city_exists(conn, city_id).await? {
            return Ok(Decision {
                trigger,
                actor_id,
                outcome: AssignmentOutcome::UnassignedConfigurationError,
                authority_id: None,
                reason: format!("city {city_id} is not in the routing catalog"),
            });
        }

        let candidates = catalog_store::authorities_for_category(conn, issue_category_id).await?;
        let resolution = resolver::resolve(&candidates, issue_category_id, city_id, region);

        Ok(Decision {
            trigger,
            actor_id,
            outcome: resolution.outcome(),
            authority_id: resolution.authority_id(),
            reason: resolution.reason(),
        })
    }
}

/// Lock the report row for this transaction and read its current state
async fn lock_for_decision(conn: &mut SqliteConnection, report_id: i64) -> Result<Report> {
    if !report_store::lock_report(conn, report_id).await? {
        return Err(Error::not_found(format!("report {report_id}")));
    }

    report_store::get_report(conn, report_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("report {report_id}")))
}

/// Apply a decision: update the report, append its ledger entry
async fn record_decision(conn: &mut SqliteConnection, report: &Report, decision: Decision) -> Result<AssignmentResult> {
    let previous = report.authority_id;

    report_store::update_report_authority(conn, report.id, decision.authority_id).await?;

    let entry = ledger_store::append_entry(
        conn,
        NewLedgerEntry {
            report_id: report.id,
            actor_id: decision.actor_id,
            trigger: decision.trigger,
            outcome: decision.outcome,
            previous_authority_id: previous,
            new_authority_id: decision.authority_id,
            reason: decision.reason,
        },
    )
    .await?;

    if entry.outcome.is_unassigned() {
        warn!(
            "⚠️ Report {} left unassigned ({}): {}",
            report.id, entry.outcome, entry.reason
        );
    } else {
        info!(
            "📋 Report {} {} by {} ({}): {:?} -> {:?}",
            report.id, entry.outcome, entry.actor_id, entry.trigger, previous, entry.new_authority_id
        );
    }

    Ok(AssignmentResult {
        outcome: entry.outcome,
        authority_id: entry.new_authority_id,
        reason: entry.reason,
    })
}

#[async_trait]
impl AssignmentService for AssignmentOrchestrator {
    async fn assign(&self, request: AssignRequest) -> Result<AssignmentResult> {
        AssignmentOrchestrator::assign(self, request).await
    }

    async fn reassign(&self, report_id: i64, authority_id: Option<i64>, actor_id: &str) -> Result<AssignmentResult> {
        AssignmentOrchestrator::reassign(self, report_id, authority_id, actor_id).await
    }

    async fn retry_assignment(&self, report_id: i64, actor_id: &str) -> Result<AssignmentResult> {
        AssignmentOrchestrator::retry_assignment(self, report_id, actor_id).await
    }

    async fn assignment_history(&self, report_id: i64) -> Result<Vec<AssignmentHistoryItem>> {
        AssignmentOrchestrator::assignment_history(self, report_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn orchestrator() -> AssignmentOrchestrator {
        let db = AssignmentDatabase::new_in_memory().await.unwrap();
        AssignmentOrchestrator::with_system_actor(db, "intake-bot")
    }

    #[tokio::test]
    async fn test_decision_actor_per_trigger() {
        let orchestrator = orchestrator().await;

        assert_eq!(orchestrator.decision_actor(Trigger::System, Some("op-1")).unwrap(), "intake-bot");
        assert_eq!(orchestrator.decision_actor(Trigger::Admin, Some(" op-1 ")).unwrap(), "op-1");
        assert_eq!(orchestrator.decision_actor(Trigger::Retry, Some("op-2")).unwrap(), "op-2");
        assert_eq!(orchestrator.decision_actor(Trigger::Retry, Some("  ")).unwrap(), "intake-bot");
    }

    #[tokio::test]
    async fn test_every_trigger_requiring_an_actor_rejects_blank() {
        let orchestrator = orchestrator().await;

        for trigger in [Trigger::System, Trigger::Admin, Trigger::Retry] {
            let result = orchestrator.decision_actor(trigger, None);
            assert_eq!(result.is_err(), trigger.requires_actor(), "trigger {trigger}");
        }
    }
}
