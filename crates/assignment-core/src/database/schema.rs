//! Database schema definitions
//!
//! Every statement is idempotent so the schema can be applied on each start.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::Result;

/// Create all tables, indexes and ledger guards
pub async fn create_all(conn: &mut SqliteConnection) -> Result<()> {
    debug!("📋 Creating assignment database schema");

    create_catalog_tables(conn).await?;
    create_reports_table(conn).await?;
    create_assignment_ledger_table(conn).await?;
    create_indexes(conn).await?;
    create_ledger_guards(conn).await?;

    debug!("✅ Database schema created successfully");
    Ok(())
}

/// Create the routing catalog tables
pub async fn create_catalog_tables(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issue_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS authorities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            city_id INTEGER NOT NULL REFERENCES cities(id),
            region TEXT,
            active INTEGER NOT NULL DEFAULT 1 CHECK (active IN (0, 1)),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS authority_categories (
            authority_id INTEGER NOT NULL REFERENCES authorities(id),
            issue_category_id INTEGER NOT NULL REFERENCES issue_categories(id),
            PRIMARY KEY (authority_id, issue_category_id)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    debug!("✅ Catalog tables created");
    Ok(())
}

/// Create the reports table
pub async fn create_reports_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            issue_category_id INTEGER NOT NULL REFERENCES issue_categories(id),
            city_id INTEGER REFERENCES cities(id),
            region TEXT,
            authority_id INTEGER REFERENCES authorities(id),
            status TEXT NOT NULL DEFAULT 'open',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    debug!("✅ Reports table created");
    Ok(())
}

/// Create the append-only assignment ledger
///
/// Authority columns carry no foreign keys; entries outlive catalog rows.
pub async fn create_assignment_ledger_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignment_ledger (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id INTEGER NOT NULL REFERENCES reports(id),
            actor_id TEXT NOT NULL,
            trigger_kind TEXT NOT NULL
                CHECK (trigger_kind IN ('system', 'admin', 'retry')),
            outcome TEXT NOT NULL
                CHECK (outcome IN (
                    'assigned',
                    'unassigned_no_matching_authority',
                    'unassigned_authority_inactive',
                    'unassigned_configuration_error',
                    'reassigned_by_admin'
                )),
            previous_authority_id INTEGER,
            new_authority_id INTEGER,
            reason TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    debug!("✅ Assignment ledger table created");
    Ok(())
}

/// Create indexes for the lookups the engine performs
pub async fn create_indexes(conn: &mut SqliteConnection) -> Result<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_authority_categories_category ON authority_categories(issue_category_id)",
        "CREATE INDEX IF NOT EXISTS idx_authorities_city ON authorities(city_id)",
        "CREATE INDEX IF NOT EXISTS idx_assignment_ledger_report ON assignment_ledger(report_id, id)",
    ];

    for statement in indexes {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    Ok(())
}

/// Reject any attempt to rewrite ledger history
pub async fn create_ledger_guards(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS assignment_ledger_no_update
        BEFORE UPDATE ON assignment_ledger
        BEGIN
            SELECT RAISE(ABORT, 'assignment ledger is append-only');
        END
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS assignment_ledger_no_delete
        BEFORE DELETE ON assignment_ledger
        BEGIN
            SELECT RAISE(ABORT, 'assignment ledger is append-only');
        END
        "#,
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}
