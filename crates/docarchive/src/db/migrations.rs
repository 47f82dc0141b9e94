//! Schema migrations for the document repository.
//!
//! Applied versions are recorded in `_migrations`. The archive columns were
//! added after the `documents` table existed, which is exactly the state the
//! backfill job repairs; `AddColumn` migrations are skipped when the column
//! is already present so an externally created schema is accepted as-is.

use std::collections::HashSet;

use rusqlite::{params, Connection};

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    Standard,
    /// `ALTER TABLE ADD COLUMN`, skipped if the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_documents_table",
        sql: include_str!("sql/001_create_documents.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "add_content_to_documents",
        sql: include_str!("sql/002_add_content.sql"),
        kind: MigrationKind::AddColumn {
            table: "documents",
            column: "content",
        },
    },
    Migration {
        version: 3,
        description: "add_archive_checksum_to_documents",
        sql: include_str!("sql/003_add_archive_checksum.sql"),
        kind: MigrationKind::AddColumn {
            table: "documents",
            column: "archive_checksum",
        },
    },
    Migration {
        version: 4,
        description: "add_archive_filename_to_documents",
        sql: include_str!("sql/004_add_archive_filename.sql"),
        kind: MigrationKind::AddColumn {
            table: "documents",
            column: "archive_filename",
        },
    },
    Migration {
        version: 5,
        description: "unique_archive_filename_index",
        sql: include_str!("sql/005_unique_archive_filename.sql"),
        kind: MigrationKind::Standard,
    },
];

/// Applies every migration not yet recorded in `_migrations`.
///
/// Each migration and its bookkeeping row share one transaction, so an
/// interrupted run never leaves a half-applied version behind.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied = applied_versions(conn)?;
    let pending = MIGRATIONS.iter().filter(|m| !applied.contains(&m.version));

    for migration in pending {
        let tx = conn.unchecked_transaction()?;
        apply(&tx, migration)?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            params![migration.version, migration.description],
        )?;
        tx.commit()?;
    }

    Ok(())
}

fn applied_versions(conn: &Connection) -> Result<HashSet<u32>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT version FROM _migrations")?;
    let versions = stmt
        .query_map([], |row| row.get::<_, u32>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(versions)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    if let MigrationKind::AddColumn { table, column } = migration.kind {
        if column_exists(conn, table, column)? {
            log::info!(
                "Migration v{} ({}): {}.{} already present",
                migration.version,
                migration.description,
                table,
                column
            );
            return Ok(());
        }
    }

    log::info!(
        "Applying migration v{}: {}",
        migration.version,
        migration.description
    );
    conn.execute_batch(migration.sql)
        .map_err(|e| DatabaseError::Migration {
            version: migration.version,
            reason: e.to_string(),
        })
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
