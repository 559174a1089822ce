//! # Assignment-Core
//!
//! Authority assignment engine for civic issue reports.
//!
//! This crate provides:
//! - Deterministic matching of a report to the responsible authority
//!   (issue category, city, optional region)
//! - Transactional assignment, admin reassignment and retry
//! - An append-only ledger recording every decision, with a decoded history view
//! - SQLite storage for the routing catalog, reports and the ledger
//!
//! ## Architecture
//!
//! The [`resolver`] is pure: it decides from a list of candidate authorities
//! and never touches storage. The [`orchestrator`] wraps each decision in one
//! transaction that updates the report and appends its ledger entry together.
//! Report intake lives elsewhere and calls [`AssignmentService::assign`], or
//! [`AssignmentOrchestrator::assign_in`] from inside its own transaction.

pub mod error;
pub mod types;
pub mod config;
pub mod database;
pub mod resolver;
pub mod ledger;
pub mod orchestrator;

pub use error::{Error, Result};
pub use types::{
    AssignRequest, AssignmentHistoryItem, AssignmentLedgerEntry, AssignmentOutcome, AssignmentResult, Authority,
    AuthorityCategoryMapping, AuthoritySummary, City, IssueCategory, NewAuthority, NewReport, Report, Trigger,
};
pub use config::AssignmentConfig;
pub use database::{AssignmentDatabase, CatalogStore, LedgerStore, ReportStore};
pub use resolver::{resolve, MatchReason, Resolution, ResolutionFailure};
pub use ledger::{verify_chain, ChainBreak};
pub use orchestrator::{AssignmentOrchestrator, AssignmentService};

/// Initialize the assignment engine
pub async fn init(config: AssignmentConfig) -> Result<AssignmentOrchestrator> {
    let db = AssignmentDatabase::connect(&config).await?;
    Ok(AssignmentOrchestrator::new(db, &config))
}
