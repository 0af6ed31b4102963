//! Dialect-aware schema bootstrap.
//!
//! Every dialect ships an ordered list of migration scripts. Applied steps are
//! recorded in `schema_migrations`, so `ensure_schema` only runs what is
//! missing and is a no-op on an up-to-date database.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{Result, StoreError};

/// Table whose presence marks a database created before the migration log.
const PRIMARY_TABLE: &str = "articles";

const SQLITE_PRODUCT_NAME: &str = "SQLite";

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

static SQLITE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: include_str!("sql/sqlite/0001_initial_schema.sql"),
}];

/// Migration scripts for a lower-cased dialect name.
pub fn migrations_for(dialect: &str) -> Option<&'static [Migration]> {
    match dialect {
        "sqlite" => Some(SQLITE_MIGRATIONS),
        _ => None,
    }
}

/// Product name of the database behind `conn`, lower-cased.
pub fn detect_dialect(conn: &Connection) -> Result<String> {
    let version: String = conn
        .query_row("SELECT sqlite_version()", [], |row| row.get(0))
        .map_err(|e| StoreError::Connection(format!("could not read database metadata: {e}")))?;
    tracing::debug!("Detected SQLite {}", version);
    Ok(SQLITE_PRODUCT_NAME.to_lowercase())
}

pub fn ensure_schema(conn: &mut Connection) -> Result<()> {
    let dialect = detect_dialect(conn)?;
    let migrations = migrations_for(&dialect).ok_or_else(|| {
        StoreError::SchemaBootstrap(format!("no schema script for dialect {dialect}"))
    })?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )
    .map_err(|e| bootstrap_error("create schema_migrations", e))?;

    let mut current = current_version(conn)?;

    // Databases created before the log existed already carry the initial schema.
    if current == 0 && table_exists(conn, PRIMARY_TABLE)? {
        if let Some(first) = migrations.first() {
            record_version(conn, first)?;
            current = first.version;
            tracing::info!("Existing schema detected, recorded migration V{}", first.version);
        }
    }

    for migration in migrations.iter().filter(|m| m.version > current) {
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        apply(conn, migration)?;
    }

    tracing::debug!("Schema up to date for {}", dialect);
    Ok(())
}

/// Run one migration and its log entry as a single transaction.
fn apply(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let context = format!("migration V{} ({})", migration.version, migration.name);
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| bootstrap_error(&context, e))?;

    for statement in split_statements(migration.sql) {
        tracing::trace!("Executing: {}", statement);
        tx.execute_batch(&statement)
            .map_err(|e| bootstrap_error(&context, e))?;
    }
    record_version(&tx, migration)?;

    tx.commit().map_err(|e| bootstrap_error(&context, e))
}

/// Split a script into statements. Comment-only lines are dropped and a
/// statement ends on a line ending with `;`.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(trimmed);

        if trimmed.ends_with(';') {
            let statement = current.trim_end_matches(';').trim().to_string();
            if !statement.is_empty() {
                statements.push(statement);
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| bootstrap_error("read schema version", e))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| bootstrap_error("inspect tables", e))?;
    Ok(found.is_some())
}

fn record_version(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (?1, ?2)",
        params![migration.version, migration.name],
    )
    .map_err(|e| bootstrap_error(&format!("record V{}", migration.version), e))?;
    Ok(())
}

fn bootstrap_error(context: &str, err: rusqlite::Error) -> StoreError {
    StoreError::SchemaBootstrap(format!("{context}: {err}"))
}
