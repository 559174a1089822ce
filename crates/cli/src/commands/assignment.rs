//! Assignment commands - Intake, admin override, retry and audit

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{info, warn};

use assignment_core::{AssignmentOrchestrator, AssignmentService, NewReport};

/// Store a report and assign it the way intake does
pub async fn submit_report(
    orchestrator: &AssignmentOrchestrator,
    issue_category_id: i64,
    city_id: Option<i64>,
    region: Option<String>,
    status: String,
) -> Result<Value> {
    let (report, result) = orchestrator
        .intake_report(NewReport {
            issue_category_id,
            city_id,
            region,
            status,
        })
        .await?;

    match &result {
        Some(result) => info!("📨 Report {} submitted: {}", report.id, result.outcome),
        None => warn!("📨 Report {} submitted without a city; left unassigned", report.id),
    }

    Ok(json!({ "report": report, "assignment": result }))
}

pub async fn reassign(
    service: &dyn AssignmentService,
    report_id: i64,
    authority_id: Option<i64>,
    actor_id: &str,
) -> Result<Value> {
    let result = service.reassign(report_id, authority_id, actor_id).await?;
    Ok(serde_json::to_value(result)?)
}

pub async fn retry(service: &dyn AssignmentService, report_id: i64, actor_id: &str) -> Result<Value> {
    let result = service.retry_assignment(report_id, actor_id).await?;
    Ok(serde_json::to_value(result)?)
}

pub async fn history(service: &dyn AssignmentService, report_id: i64) -> Result<Value> {
    let history = service.assignment_history(report_id).await?;
    Ok(serde_json::to_value(history)?)
}

pub async fn verify(orchestrator: &AssignmentOrchestrator, report_id: i64) -> Result<Value> {
    let breaks = orchestrator.verify_ledger(report_id).await?;

    if breaks.is_empty() {
        info!("✅ Ledger for report {} is intact", report_id);
    } else {
        for chain_break in &breaks {
            warn!("⚠️ Report {}: {}", report_id, chain_break);
        }
    }

    Ok(json!({
        "reportId": report_id,
        "intact": breaks.is_empty(),
        "breaks": breaks.iter().map(ToString::to_string).collect::<Vec<_>>(),
    }))
}
