//! Core types for the assignment engine

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// City known to the routing catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct City {
    pub id: i64,
    pub name: String,
}

/// Issue category known to the routing catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IssueCategory {
    pub id: i64,
    pub name: String,
}

/// Government office responsible for some categories within a city
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Authority {
    pub id: i64,
    pub name: String,
    pub city_id: i64,
    pub region: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Authority {
    /// Eligibility predicate used by both automatic matching and admin overrides
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Declares that an authority handles an issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityCategoryMapping {
    pub authority_id: i64,
    pub issue_category_id: i64,
}

/// Request to register a new authority in the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct NewAuthority {
    pub name: String,
    pub city_id: i64,
    pub region: Option<String>,
    pub active: bool,
    /// Creation time carried over from an upstream catalog; defaults to now
    pub created_at: Option<DateTime<Utc>>,
}

/// Citizen-submitted report, as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: i64,
    pub issue_category_id: i64,
    pub city_id: Option<i64>,
    pub region: Option<String>,
    pub authority_id: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Report as handed over by intake. Reports always start unassigned.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReport {
    pub issue_category_id: i64,
    pub city_id: Option<i64>,
    pub region: Option<String>,
    pub status: String,
}

/// Actor class that initiated an assignment decision
///
/// Serialized in its stored lowercase form; parsing goes through [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Trigger {
    /// Automatic, on report creation
    System,
    /// Explicit operator action
    Admin,
    /// Operator-requested re-run of automatic matching
    Retry,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::System => "system",
            Trigger::Admin => "admin",
            Trigger::Retry => "retry",
        }
    }

    /// Whether decisions under this trigger must name the operator
    pub fn requires_actor(&self) -> bool {
        match self {
            Trigger::Admin => true,
            Trigger::System | Trigger::Retry => false,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Trigger> for String {
    fn from(trigger: Trigger) -> Self {
        trigger.as_str().to_string()
    }
}

impl TryFrom<String> for Trigger {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Trigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Trigger::System),
            "admin" => Ok(Trigger::Admin),
            "retry" => Ok(Trigger::Retry),
            _ => Err(Error::InvalidTrigger(s.to_string())),
        }
    }
}

/// Result of a single assignment decision. Every decision produces exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentOutcome {
    Assigned,
    UnassignedNoMatchingAuthority,
    UnassignedAuthorityInactive,
    UnassignedConfigurationError,
    ReassignedByAdmin,
}

impl AssignmentOutcome {
    pub const ALL: [AssignmentOutcome; 5] = [
        AssignmentOutcome::Assigned,
        AssignmentOutcome::UnassignedNoMatchingAuthority,
        AssignmentOutcome::UnassignedAuthorityInactive,
        AssignmentOutcome::UnassignedConfigurationError,
        AssignmentOutcome::ReassignedByAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentOutcome::Assigned => "assigned",
            AssignmentOutcome::UnassignedNoMatchingAuthority => "unassigned_no_matching_authority",
            AssignmentOutcome::UnassignedAuthorityInactive => "unassigned_authority_inactive",
            AssignmentOutcome::UnassignedConfigurationError => "unassigned_configuration_error",
            AssignmentOutcome::ReassignedByAdmin => "reassigned_by_admin",
        }
    }

    /// Whether automatic matching gave up on this decision
    pub fn is_unassigned(&self) -> bool {
        match self {
            AssignmentOutcome::Assigned | AssignmentOutcome::ReassignedByAdmin => false,
            AssignmentOutcome::UnassignedNoMatchingAuthority
            | AssignmentOutcome::UnassignedAuthorityInactive
            | AssignmentOutcome::UnassignedConfigurationError => true,
        }
    }
}

impl fmt::Display for AssignmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssignmentOutcome::ALL
            .into_iter()
            .find(|outcome| outcome.as_str() == s)
            .ok_or_else(|| Error::InvalidOutcome(s.to_string()))
    }
}

/// Structured result returned by every assignment operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    pub outcome: AssignmentOutcome,
    pub authority_id: Option<i64>,
    pub reason: String,
}

/// Input to the automatic assignment path
#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub report_id: i64,
    pub issue_category_id: i64,
    pub city_id: i64,
    pub region: Option<String>,
    pub trigger: Trigger,
    pub actor_id: Option<String>,
}

impl AssignRequest {
    /// Automatic assignment as performed by report intake
    pub fn system(report_id: i64, issue_category_id: i64, city_id: i64, region: Option<String>) -> Self {
        Self {
            report_id,
            issue_category_id,
            city_id,
            region,
            trigger: Trigger::System,
            actor_id: None,
        }
    }

    /// Build a request from a stored report; `None` when the report has no city
    pub fn for_report(report: &Report, trigger: Trigger, actor_id: Option<String>) -> Option<Self> {
        let city_id = report.city_id?;
        Some(Self {
            report_id: report.id,
            issue_category_id: report.issue_category_id,
            city_id,
            region: report.region.clone(),
            trigger,
            actor_id,
        })
    }
}

/// Immutable audit record of one assignment decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentLedgerEntry {
    pub id: i64,
    pub report_id: i64,
    pub actor_id: String,
    pub trigger: Trigger,
    pub outcome: AssignmentOutcome,
    pub previous_authority_id: Option<i64>,
    pub new_authority_id: Option<i64>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry about to be appended
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub report_id: i64,
    pub actor_id: String,
    pub trigger: Trigger,
    pub outcome: AssignmentOutcome,
    pub previous_authority_id: Option<i64>,
    pub new_authority_id: Option<i64>,
    pub reason: String,
}

/// Authority reference as shown in the audit view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritySummary {
    pub id: i64,
    /// `None` once the authority row no longer exists in the catalog
    pub name: Option<String>,
}

/// Decoded ledger entry for the admin/audit view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentHistoryItem {
    pub timestamp: DateTime<Utc>,
    pub from_authority: Option<AuthoritySummary>,
    pub to_authority: Option<AuthoritySummary>,
    pub outcome: AssignmentOutcome,
    pub reason: String,
    pub actor: String,
    pub trigger: Trigger,
}
