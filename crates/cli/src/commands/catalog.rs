//! Catalog commands - Maintain cities, categories and authorities

use anyhow::{bail, Result};
use serde_json::{json, Value};
use tracing::info;

use assignment_core::{AssignmentDatabase, CatalogStore, NewAuthority};

/// Schema is created on connect; report whether the database answers
pub async fn init(db: &AssignmentDatabase) -> Result<Value> {
    if !db.health_check().await? {
        bail!("database did not answer the health check");
    }
    info!("✅ Schema ready");
    Ok(json!({ "initialized": true }))
}

pub async fn add_city(db: &AssignmentDatabase, name: &str) -> Result<Value> {
    let city = CatalogStore::new(db.clone()).create_city(name).await?;
    Ok(serde_json::to_value(city)?)
}

pub async fn add_category(db: &AssignmentDatabase, name: &str) -> Result<Value> {
    let category = CatalogStore::new(db.clone()).create_issue_category(name).await?;
    Ok(serde_json::to_value(category)?)
}

pub async fn add_authority(
    db: &AssignmentDatabase,
    name: String,
    city_id: i64,
    region: Option<String>,
    active: bool,
) -> Result<Value> {
    let authority = CatalogStore::new(db.clone())
        .create_authority(NewAuthority {
            name,
            city_id,
            region,
            active,
            created_at: None,
        })
        .await?;
    Ok(serde_json::to_value(authority)?)
}

pub async fn map(db: &AssignmentDatabase, authority_id: i64, issue_category_id: i64) -> Result<Value> {
    let catalog = CatalogStore::new(db.clone());
    if catalog.get_authority(authority_id).await?.is_none() {
        return Err(assignment_core::Error::not_found(format!("authority {authority_id}")).into());
    }

    let mapping = catalog.map_authority(authority_id, issue_category_id).await?;
    info!("🔗 Authority {} now handles category {}", authority_id, issue_category_id);
    Ok(serde_json::to_value(mapping)?)
}

pub async fn unmap(db: &AssignmentDatabase, authority_id: i64, issue_category_id: i64) -> Result<Value> {
    let removed = CatalogStore::new(db.clone())
        .unmap_authority(authority_id, issue_category_id)
        .await?;
    Ok(json!({ "authorityId": authority_id, "issueCategoryId": issue_category_id, "removed": removed }))
}

pub async fn set_active(db: &AssignmentDatabase, authority_id: i64, active: bool) -> Result<Value> {
    let authority = CatalogStore::new(db.clone())
        .set_authority_active(authority_id, active)
        .await?;
    Ok(serde_json::to_value(authority)?)
}

pub async fn list_authorities(db: &AssignmentDatabase, city_id: i64) -> Result<Value> {
    let authorities = CatalogStore::new(db.clone()).list_authorities(city_id).await?;
    Ok(serde_json::to_value(authorities)?)
}

pub async fn list_mappings(db: &AssignmentDatabase, issue_category_id: i64) -> Result<Value> {
    let mappings = CatalogStore::new(db.clone()).list_mappings(issue_category_id).await?;
    Ok(serde_json::to_value(mappings)?)
}
