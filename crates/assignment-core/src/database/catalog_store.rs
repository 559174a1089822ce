//! Routing catalog access
//!
//! The engine only reads the catalog while deciding. Writes here exist for the
//! tooling that maintains the catalog (the CLI, seed scripts, tests) and never
//! run inside an assignment transaction.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::AssignmentDatabase;
use crate::types::{Authority, AuthorityCategoryMapping, City, IssueCategory, NewAuthority};
use crate::{Error, Result};

const AUTHORITY_COLUMNS: &str = "a.id, a.name, a.city_id, a.region, a.active, a.created_at";

/// All authorities mapped to an issue category, in no particular order
pub async fn authorities_for_category(
    conn: &mut SqliteConnection,
    issue_category_id: i64,
) -> Result<Vec<Authority>> {
    let query = format!(
        "SELECT {AUTHORITY_COLUMNS}
         FROM authorities a
         JOIN authority_categories ac ON ac.authority_id = a.id
         WHERE ac.issue_category_id = ?1"
    );

    let authorities = sqlx::query_as::<_, Authority>(&query)
        .bind(issue_category_id)
        .fetch_all(&mut *conn)
        .await?;

    debug!(
        "🔍 Category {} has {} mapped authorities",
        issue_category_id,
        authorities.len()
    );
    Ok(authorities)
}

pub async fn get_authority(conn: &mut SqliteConnection, authority_id: i64) -> Result<Option<Authority>> {
    let query = format!("SELECT {AUTHORITY_COLUMNS} FROM authorities a WHERE a.id = ?1");

    let authority = sqlx::query_as::<_, Authority>(&query)
        .bind(authority_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(authority)
}

pub async fn city_exists(conn: &mut SqliteConnection, city_id: i64) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM cities WHERE id = ?1")
        .bind(city_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

pub async fn issue_category_exists(conn: &mut SqliteConnection, issue_category_id: i64) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM issue_categories WHERE id = ?1")
        .bind(issue_category_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(found.is_some())
}

pub async fn insert_city(conn: &mut SqliteConnection, name: &str) -> Result<City> {
    let name = required_name(name, "city")?;

    let id = sqlx::query("INSERT INTO cities (name) VALUES (?1)")
        .bind(name)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    Ok(City {
        id,
        name: name.to_string(),
    })
}

pub async fn insert_issue_category(conn: &mut SqliteConnection, name: &str) -> Result<IssueCategory> {
    let name = required_name(name, "issue category")?;

    let id = sqlx::query("INSERT INTO issue_categories (name) VALUES (?1)")
        .bind(name)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    Ok(IssueCategory {
        id,
        name: name.to_string(),
    })
}

pub async fn insert_authority(conn: &mut SqliteConnection, request: NewAuthority) -> Result<Authority> {
    let name = required_name(&request.name, "authority")?.to_string();

    if !city_exists(conn, request.city_id).await? {
        return Err(Error::not_found(format!("city {}", request.city_id)));
    }

    let region = request
        .region
        .map(|region| region.trim().to_string())
        .filter(|region| !region.is_empty());
    let created_at = request.created_at.unwrap_or_else(Utc::now);

    let id = sqlx::query(
        "INSERT INTO authorities (name, city_id, region, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&name)
    .bind(request.city_id)
    .bind(&region)
    .bind(request.active)
    .bind(created_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(Authority {
        id,
        name,
        city_id: request.city_id,
        region,
        active: request.active,
        created_at,
    })
}

/// Declare an authority eligible for a category. Mapping twice is a no-op.
pub async fn insert_mapping(
    conn: &mut SqliteConnection,
    authority_id: i64,
    issue_category_id: i64,
) -> Result<AuthorityCategoryMapping> {
    sqlx::query(
        "INSERT OR IGNORE INTO authority_categories (authority_id, issue_category_id)
         VALUES (?1, ?2)",
    )
    .bind(authority_id)
    .bind(issue_category_id)
    .execute(&mut *conn)
    .await?;

    Ok(AuthorityCategoryMapping {
        authority_id,
        issue_category_id,
    })
}

pub async fn delete_mapping(
    conn: &mut SqliteConnection,
    authority_id: i64,
    issue_category_id: i64,
) -> Result<bool> {
    let removed = sqlx::query(
        "DELETE FROM authority_categories WHERE authority_id = ?1 AND issue_category_id = ?2",
    )
    .bind(authority_id)
    .bind(issue_category_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(removed > 0)
}

pub async fn update_authority_active(
    conn: &mut SqliteConnection,
    authority_id: i64,
    active: bool,
) -> Result<Authority> {
    let updated = sqlx::query("UPDATE authorities SET active = ?1 WHERE id = ?2")
        .bind(active)
        .bind(authority_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(Error::not_found(format!("authority {authority_id}")));
    }

    get_authority(conn, authority_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("authority {authority_id}")))
}

fn required_name<'a>(name: &'a str, kind: &str) -> Result<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid_input(format!("{kind} name must not be empty")));
    }
    Ok(name)
}

/// Catalog store for one-off reads and catalog maintenance
#[derive(Clone)]
pub struct CatalogStore {
    db: AssignmentDatabase,
}

impl CatalogStore {
    pub fn new(db: AssignmentDatabase) -> Self {
        Self { db }
    }

    pub async fn create_city(&self, name: &str) -> Result<City> {
        let mut conn = self.db.pool().acquire().await?;
        let city = insert_city(&mut conn, name).await?;
        info!("🏙️ Created city {} ({})", city.name, city.id);
        Ok(city)
    }

    pub async fn create_issue_category(&self, name: &str) -> Result<IssueCategory> {
        let mut conn = self.db.pool().acquire().await?;
        let category = insert_issue_category(&mut conn, name).await?;
        info!("🏷️ Created issue category {} ({})", category.name, category.id);
        Ok(category)
    }

    pub async fn create_authority(&self, request: NewAuthority) -> Result<Authority> {
        let mut conn = self.db.pool().acquire().await?;
        let authority = insert_authority(&mut conn, request).await?;
        info!(
            "🏛️ Created authority {} ({}) in city {} region {:?}",
            authority.name, authority.id, authority.city_id, authority.region
        );
        Ok(authority)
    }

    pub async fn map_authority(&self, authority_id: i64, issue_category_id: i64) -> Result<AuthorityCategoryMapping> {
        let mut conn = self.db.pool().acquire().await?;
        insert_mapping(&mut conn, authority_id, issue_category_id).await
    }

    pub async fn unmap_authority(&self, authority_id: i64, issue_category_id: i64) -> Result<bool> {
        let mut conn = self.db.pool().acquire().await?;
        delete_mapping(&mut conn, authority_id, issue_category_id).await
    }

    /// Disable or re-enable an authority for matching and admin overrides
    pub async fn set_authority_active(&self, authority_id: i64, active: bool) -> Result<Authority> {
        let mut conn = self.db.pool().acquire().await?;
        let authority = update_authority_active(&mut conn, authority_id, active).await?;
        info!(
            "🏛️ Authority {} is now {}",
            authority.id,
            if authority.active { "active" } else { "inactive" }
        );
        Ok(authority)
    }

    pub async fn get_authority(&self, authority_id: i64) -> Result<Option<Authority>> {
        let mut conn = self.db.pool().acquire().await?;
        get_authority(&mut conn, authority_id).await
    }

    pub async fn authorities_for_category(&self, issue_category_id: i64) -> Result<Vec<Authority>> {
        let mut conn = self.db.pool().acquire().await?;
        authorities_for_category(&mut conn, issue_category_id).await
    }

    /// Every authority in a city, oldest first
    pub async fn list_authorities(&self, city_id: i64) -> Result<Vec<Authority>> {
        let query = format!(
            "SELECT {AUTHORITY_COLUMNS} FROM authorities a WHERE a.city_id = ?1 ORDER BY a.created_at, a.id"
        );

        let authorities = sqlx::query_as::<_, Authority>(&query)
            .bind(city_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(authorities)
    }

    pub async fn list_mappings(&self, issue_category_id: i64) -> Result<Vec<AuthorityCategoryMapping>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT authority_id, issue_category_id FROM authority_categories
             WHERE issue_category_id = ?1 ORDER BY authority_id",
        )
        .bind(issue_category_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(authority_id, issue_category_id)| AuthorityCategoryMapping {
                authority_id,
                issue_category_id,
            })
            .collect())
    }
}
