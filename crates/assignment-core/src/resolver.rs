//! # Matching Resolver
//!
//! Pure decision logic for automatic assignment. Given every authority mapped
//! to a report's issue category, the report's city and an optional region
//! hint, the resolver picks at most one candidate:
//!
//! ```text
//! mapped authorities ── none ──────────────────────────► NoMapping
//!        │
//!   same city only ──── none ──────────────────────────► NoAuthorityInCity
//!        │
//!   region hint? ── exact (case-insensitive) match ────► candidate
//!        │                      │ no match
//!        └──────────── oldest-created authority ───────► candidate
//!                                                           │
//!                                    inactive? ─── yes ──► AuthorityInactive
//!                                                           │ no
//!                                                        Matched
//! ```
//!
//! An inactive candidate is terminal: the resolver never falls through to the
//! next authority, so the same catalog always yields the same decision.

use std::cmp::Ordering;
use std::fmt;

use crate::types::{AssignmentOutcome, Authority};

/// Why a candidate was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    /// The authority's region equals the report's region
    ExactRegionMatch { region: String },
    /// No usable region match; oldest authority in the city
    CityFallback { region_requested: bool },
}

impl MatchReason {
    /// Operator-facing audit text
    pub fn describe(&self, authority: &Authority) -> String {
        match self {
            MatchReason::ExactRegionMatch { region } => format!(
                "exact region match: {} ({}) serves region {:?}",
                authority.name, authority.id, region
            ),
            MatchReason::CityFallback { region_requested: true } => format!(
                "city fallback: no authority serves the requested region; {} ({}) is the oldest in city {}",
                authority.name, authority.id, authority.city_id
            ),
            MatchReason::CityFallback { region_requested: false } => format!(
                "city fallback: no region given; {} ({}) is the oldest in city {}",
                authority.name, authority.id, authority.city_id
            ),
        }
    }
}

/// Why no authority could be chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// Nothing is mapped to the issue category at all
    NoMapping { issue_category_id: i64 },
    /// Mapped authorities exist, but none in the report's city
    NoAuthorityInCity { issue_category_id: i64, city_id: i64 },
    /// The deterministic candidate is disabled
    AuthorityInactive { authority_id: i64, name: String },
}

impl ResolutionFailure {
    pub fn outcome(&self) -> AssignmentOutcome {
        match self {
            ResolutionFailure::NoMapping { .. } | ResolutionFailure::NoAuthorityInCity { .. } => {
                AssignmentOutcome::UnassignedNoMatchingAuthority
            }
            ResolutionFailure::AuthorityInactive { .. } => AssignmentOutcome::UnassignedAuthorityInactive,
        }
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::NoMapping { issue_category_id } => write!(
                f,
                "no authority configured for this category (category {issue_category_id})"
            ),
            ResolutionFailure::NoAuthorityInCity {
                issue_category_id,
                city_id,
            } => write!(
                f,
                "no authority configured for this category in this city (category {issue_category_id}, city {city_id})"
            ),
            ResolutionFailure::AuthorityInactive { authority_id, name } => {
                write!(f, "authority inactive: {name} ({authority_id})")
            }
        }
    }
}

/// Resolver verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched { authority: Authority, reason: MatchReason },
    Failed(ResolutionFailure),
}

impl Resolution {
    pub fn outcome(&self) -> AssignmentOutcome {
        match self {
            Resolution::Matched { .. } => AssignmentOutcome::Assigned,
            Resolution::Failed(failure) => failure.outcome(),
        }
    }

    pub fn authority_id(&self) -> Option<i64> {
        match self {
            Resolution::Matched { authority, .. } => Some(authority.id),
            Resolution::Failed(_) => None,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Resolution::Matched { authority, reason } => reason.describe(authority),
            Resolution::Failed(failure) => failure.to_string(),
        }
    }
}

/// Trimmed region hint, or `None` when absent or blank
pub fn normalize_region(region: Option<&str>) -> Option<&str> {
    region.map(str::trim).filter(|region| !region.is_empty())
}

/// Case-insensitive exact equality; never a prefix or substring match
pub fn region_matches(authority_region: Option<&str>, requested: &str) -> bool {
    match normalize_region(authority_region) {
        Some(region) => region.to_lowercase() == requested.trim().to_lowercase(),
        None => false,
    }
}

/// Oldest-created first; ties broken by the lower id
pub fn oldest_first(a: &Authority, b: &Authority) -> Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

/// Choose the authority for a report.
///
/// `candidates` must be the authorities mapped to `issue_category_id`; their
/// order does not matter.
pub fn resolve(
    candidates: &[Authority],
    issue_category_id: i64,
    city_id: i64,
    region: Option<&str>,
) -> Resolution {
    if candidates.is_empty() {
        return Resolution::Failed(ResolutionFailure::NoMapping { issue_category_id });
    }

    let in_city: Vec<&Authority> = candidates.iter().filter(|a| a.city_id == city_id).collect();
    let requested = normalize_region(region);

    let region_match = requested.and_then(|wanted| {
        in_city
            .iter()
            .copied()
            .filter(|a| region_matches(a.region.as_deref(), wanted))
            .min_by(|a, b| oldest_first(a, b))
    });
    let oldest = in_city.iter().copied().min_by(|a, b| oldest_first(a, b));

    let (candidate, reason) = match (region_match, oldest) {
        (Some(authority), _) => (
            authority,
            MatchReason::ExactRegionMatch {
                region: authority.region.clone().unwrap_or_default(),
            },
        ),
        (None, Some(authority)) => (
            authority,
            MatchReason::CityFallback {
                region_requested: requested.is_some(),
            },
        ),
        (None, None) => {
            return Resolution::Failed(ResolutionFailure::NoAuthorityInCity {
                issue_category_id,
                city_id,
            });
        }
    };

    if !candidate.is_active() {
        return Resolution::Failed(ResolutionFailure::AuthorityInactive {
            authority_id: candidate.id,
            name: candidate.name.clone(),
        });
    }

    Resolution::Matched {
        authority: candidate.clone(),
        reason,
    }
}
