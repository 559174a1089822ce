//! Tests for automatic assignment through the orchestrator
//! These tests serve as both verification and developer examples

use assignment_core::{
    AssignRequest, AssignmentConfig, AssignmentDatabase, AssignmentOrchestrator, AssignmentOutcome,
    AssignmentService, Authority, CatalogStore, Error, LedgerStore, NewAuthority, NewReport, Report, ReportStore,
    Trigger,
};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Route engine logs to the test harness; `RUST_LOG` overrides the default
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("assignment_core=debug")),
        )
        .with_test_writer()
        .try_init();
}

struct TestEngine {
    orchestrator: AssignmentOrchestrator,
    catalog: CatalogStore,
    reports: ReportStore,
    ledger: LedgerStore,
    _temp_dir: TempDir,
}

/// Helper to create a test engine over a fresh database file
async fn create_test_engine() -> TestEngine {
    init_tracing();

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("assignment.db");
    let config = AssignmentConfig::with_database_url(format!("sqlite://{}?mode=rwc", db_path.display()));

    let db = AssignmentDatabase::connect(&config)
        .await
        .expect("Failed to create test database");

    TestEngine {
        orchestrator: AssignmentOrchestrator::new(db.clone(), &config),
        catalog: CatalogStore::new(db.clone()),
        reports: ReportStore::new(db.clone()),
        ledger: LedgerStore::new(db),
        _temp_dir: temp_dir,
    }
}

async fn add_authority(
    engine: &TestEngine,
    name: &str,
    city_id: i64,
    region: Option<&str>,
    active: bool,
    age_days: i64,
) -> Authority {
    engine
        .catalog
        .create_authority(NewAuthority {
            name: name.to_string(),
            city_id,
            region: region.map(str::to_string),
            active,
            created_at: Some(Utc::now() - Duration::days(age_days)),
        })
        .await
        .unwrap()
}

async fn add_report(engine: &TestEngine, category_id: i64, city_id: i64, region: Option<&str>) -> Report {
    engine
        .reports
        .create_report(NewReport {
            issue_category_id: category_id,
            city_id: Some(city_id),
            region: region.map(str::to_string),
            status: "open".to_string(),
        })
        .await
        .unwrap()
}

async fn assign_system(engine: &TestEngine, report: &Report) -> assignment_core::AssignmentResult {
    let request = AssignRequest::for_report(report, Trigger::System, None).unwrap();
    engine.orchestrator.assign(request).await.unwrap()
}

#[tokio::test]
async fn test_zero_mappings_leaves_report_unassigned() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();
    add_authority(&engine, "Roads Office", city.id, None, true, 1).await;

    let report = add_report(&engine, category.id, city.id, None).await;
    let result = assign_system(&engine, &report).await;

    assert_eq!(result.outcome, AssignmentOutcome::UnassignedNoMatchingAuthority);
    assert_eq!(result.authority_id, None);
    assert!(result.reason.contains("no authority configured for this category"));

    let stored = engine.reports.get_report(report.id).await.unwrap().unwrap();
    assert_eq!(stored.authority_id, None);
    assert_eq!(engine.ledger.count_for_report(report.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_mapping_only_in_other_city() {
    let engine = create_test_engine().await;
    let here = engine.catalog.create_city("Springfield").await.unwrap();
    let there = engine.catalog.create_city("Shelbyville").await.unwrap();
    let category = engine.catalog.create_issue_category("Graffiti").await.unwrap();
    let elsewhere = add_authority(&engine, "Shelbyville Works", there.id, None, true, 3).await;
    engine.catalog.map_authority(elsewhere.id, category.id).await.unwrap();

    let report = add_report(&engine, category.id, here.id, None).await;
    let result = assign_system(&engine, &report).await;

    assert_eq!(result.outcome, AssignmentOutcome::UnassignedNoMatchingAuthority);
    assert!(result.reason.contains("in this city"));
}

#[tokio::test]
async fn test_only_inactive_authority_does_not_fall_through() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Streetlights").await.unwrap();
    let inactive = add_authority(&engine, "Old Lighting Dept", city.id, None, false, 10).await;
    engine.catalog.map_authority(inactive.id, category.id).await.unwrap();

    let report = add_report(&engine, category.id, city.id, None).await;
    let result = assign_system(&engine, &report).await;

    assert_eq!(result.outcome, AssignmentOutcome::UnassignedAuthorityInactive);
    assert_eq!(result.authority_id, None);
    assert!(result.reason.starts_with("authority inactive"));
}

#[tokio::test]
async fn test_inactive_oldest_is_not_skipped_for_younger_active() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Parks").await.unwrap();
    let oldest = add_authority(&engine, "Parks Board", city.id, None, false, 30).await;
    let younger = add_authority(&engine, "Parks Trust", city.id, None, true, 2).await;
    engine.catalog.map_authority(oldest.id, category.id).await.unwrap();
    engine.catalog.map_authority(younger.id, category.id).await.unwrap();

    let report = add_report(&engine, category.id, city.id, None).await;
    let result = assign_system(&engine, &report).await;

    assert_eq!(result.outcome, AssignmentOutcome::UnassignedAuthorityInactive);
    assert_eq!(result.authority_id, None);
}

#[tokio::test]
async fn test_region_match_beats_creation_order() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();
    let older = add_authority(&engine, "Central Roads", city.id, Some("Downtown"), true, 100).await;
    let newer = add_authority(&engine, "Harbor Roads", city.id, Some("Harbor"), true, 1).await;
    engine.catalog.map_authority(older.id, category.id).await.unwrap();
    engine.catalog.map_authority(newer.id, category.id).await.unwrap();

    let report = add_report(&engine, category.id, city.id, Some("harbor")).await;
    let result = assign_system(&engine, &report).await;

    assert_eq!(result.outcome, AssignmentOutcome::Assigned);
    assert_eq!(result.authority_id, Some(newer.id));
    assert!(result.reason.starts_with("exact region match"));
}

#[tokio::test]
async fn test_oldest_authority_wins_without_region() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Noise").await.unwrap();
    let younger = add_authority(&engine, "Noise Patrol", city.id, None, true, 1).await;
    let oldest = add_authority(&engine, "Environmental Health", city.id, None, true, 50).await;
    engine.catalog.map_authority(younger.id, category.id).await.unwrap();
    engine.catalog.map_authority(oldest.id, category.id).await.unwrap();

    for _ in 0..3 {
        let report = add_report(&engine, category.id, city.id, None).await;
        let result = assign_system(&engine, &report).await;
        assert_eq!(result.outcome, AssignmentOutcome::Assigned);
        assert_eq!(result.authority_id, Some(oldest.id));
        assert!(result.reason.starts_with("city fallback"));
    }
}

#[tokio::test]
async fn test_zone_scenario() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Waste").await.unwrap();
    let zone_one = add_authority(&engine, "Authority A", city.id, Some("Zone 1"), true, 5).await;
    let zone_two = add_authority(&engine, "Authority B", city.id, Some("Zone 2"), true, 5).await;
    engine.catalog.map_authority(zone_one.id, category.id).await.unwrap();
    engine.catalog.map_authority(zone_two.id, category.id).await.unwrap();

    let report = add_report(&engine, category.id, city.id, Some("Zone 1")).await;
    let result = assign_system(&engine, &report).await;
    assert_eq!(result.outcome, AssignmentOutcome::Assigned);
    assert_eq!(result.authority_id, Some(zone_one.id));

    engine.catalog.set_authority_active(zone_one.id, false).await.unwrap();

    let report = add_report(&engine, category.id, city.id, Some("Zone 1")).await;
    let result = assign_system(&engine, &report).await;
    assert_eq!(result.outcome, AssignmentOutcome::UnassignedAuthorityInactive);
    assert_eq!(result.authority_id, None);
}

#[tokio::test]
async fn test_unknown_city_is_configuration_error() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();
    let report = add_report(&engine, category.id, city.id, None).await;

    let request = AssignRequest::system(report.id, category.id, 9_999, None);
    let result = engine.orchestrator.assign(request).await.unwrap();

    assert_eq!(result.outcome, AssignmentOutcome::UnassignedConfigurationError);
    assert_eq!(result.authority_id, None);
    assert_eq!(engine.ledger.count_for_report(report.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_admin_trigger_requires_actor() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();
    let report = add_report(&engine, category.id, city.id, None).await;

    let request = AssignRequest {
        trigger: Trigger::Admin,
        actor_id: Some("   ".to_string()),
        ..AssignRequest::system(report.id, category.id, city.id, None)
    };
    let result = engine.orchestrator.assign(request).await;

    assert!(matches!(result, Err(Error::MissingActor)));
    assert_eq!(engine.ledger.count_for_report(report.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_system_decisions_record_system_actor() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();
    let report = add_report(&engine, category.id, city.id, None).await;

    let request = AssignRequest {
        actor_id: Some("someone-else".to_string()),
        ..AssignRequest::system(report.id, category.id, city.id, None)
    };
    engine.orchestrator.assign(request).await.unwrap();

    let entries = engine.orchestrator.ledger_entries(report.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor_id, "system");
    assert_eq!(entries[0].trigger, Trigger::System);
}

#[tokio::test]
async fn test_assign_missing_report_not_found() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();

    let result = engine
        .orchestrator
        .assign(AssignRequest::system(404, category.id, city.id, None))
        .await;

    match result {
        Err(err @ Error::NotFound(_)) => assert_eq!(err.status_code(), 404),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(engine.ledger.total_entries().await.unwrap(), 0);
}

#[tokio::test]
async fn test_every_decision_matches_its_ledger_entry() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();
    let roads = add_authority(&engine, "Roads Office", city.id, None, true, 4).await;
    engine.catalog.map_authority(roads.id, category.id).await.unwrap();

    let report = add_report(&engine, category.id, city.id, None).await;
    let service: &dyn AssignmentService = &engine.orchestrator;

    let request = AssignRequest::for_report(&report, Trigger::System, None).unwrap();
    let results = vec![
        service.assign(request).await.unwrap(),
        service.reassign(report.id, None, "op-1").await.unwrap(),
        service.retry_assignment(report.id, "op-1").await.unwrap(),
    ];

    let entries = engine.ledger.entries_for_report(report.id).await.unwrap();
    assert_eq!(entries.len(), results.len());
    for (entry, result) in entries.iter().zip(&results) {
        assert_eq!(entry.new_authority_id, result.authority_id);
        assert_eq!(entry.outcome, result.outcome);
    }

    let stored = engine.reports.get_report(report.id).await.unwrap().unwrap();
    assert_eq!(stored.authority_id, Some(roads.id));
}

#[tokio::test]
async fn test_intake_assigns_in_one_step() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();
    let roads = add_authority(&engine, "Roads Office", city.id, None, true, 4).await;
    engine.catalog.map_authority(roads.id, category.id).await.unwrap();

    let (report, result) = engine
        .orchestrator
        .intake_report(NewReport {
            issue_category_id: category.id,
            city_id: Some(city.id),
            region: None,
            status: "open".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(report.authority_id, Some(roads.id));
    assert_eq!(result.map(|result| result.outcome), Some(AssignmentOutcome::Assigned));

    let (report, result) = engine
        .orchestrator
        .intake_report(NewReport {
            issue_category_id: category.id,
            city_id: None,
            region: Some("North".to_string()),
            status: "open".to_string(),
        })
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(report.authority_id, None);
    assert_eq!(engine.ledger.count_for_report(report.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_report_with_unknown_category_not_found() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();

    let err = engine
        .reports
        .create_report(NewReport {
            issue_category_id: 4_242,
            city_id: Some(city.id),
            region: None,
            status: "open".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(ref what) if what.contains("issue category")));
    assert_eq!(err.status_code(), 404);

    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();
    let err = engine
        .orchestrator
        .intake_report(NewReport {
            issue_category_id: category.id,
            city_id: Some(777),
            region: None,
            status: "open".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(ref what) if what.contains("city")));
    assert_eq!(engine.ledger.total_entries().await.unwrap(), 0);
}

#[tokio::test]
async fn test_mappings_listed_for_category() {
    let engine = create_test_engine().await;
    let city = engine.catalog.create_city("Springfield").await.unwrap();
    let category = engine.catalog.create_issue_category("Potholes").await.unwrap();
    let other = engine.catalog.create_issue_category("Graffiti").await.unwrap();
    let roads = add_authority(&engine, "Roads Office", city.id, None, true, 4).await;
    let works = add_authority(&engine, "Public Works", city.id, None, true, 2).await;

    engine.catalog.map_authority(works.id, category.id).await.unwrap();
    engine.catalog.map_authority(roads.id, category.id).await.unwrap();
    engine.catalog.map_authority(roads.id, category.id).await.unwrap();
    engine.catalog.map_authority(works.id, other.id).await.unwrap();

    let authorities: Vec<i64> = engine
        .catalog
        .list_mappings(category.id)
        .await
        .unwrap()
        .into_iter()
        .map(|mapping| mapping.authority_id)
        .collect();
    assert_eq!(authorities, vec![roads.id, works.id]);

    assert!(engine.catalog.unmap_authority(works.id, category.id).await.unwrap());
    assert_eq!(engine.catalog.list_mappings(category.id).await.unwrap().len(), 1);
}
