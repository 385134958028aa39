/*!
 * Database schema definitions and migrations.
 *
 * Each document collection maps to one table. List-shaped fields
 * (subject/object pairs, sentences, interval schedules, profiles)
 * are stored as JSON text.
 */

use anyhow::{Context, Result};
use rusqlite::Connection;
use log::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            id TEXT PRIMARY KEY,
            profile TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // General exercise records
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS exercises (
            id TEXT PRIMARY KEY,
            therapy TEXT NOT NULL,
            reviewed INTEGER NOT NULL DEFAULT 0,
            visibility TEXT NOT NULL,
            created_by TEXT NOT NULL,
            personalized INTEGER NOT NULL DEFAULT 0,
            base_reference TEXT,
            patient_id TEXT,
            adapted_description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            CHECK (personalized = 0 OR base_reference IS NOT NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_exercises_therapy ON exercises(therapy);
        CREATE INDEX IF NOT EXISTS idx_exercises_patient ON exercises(patient_id);
        "#,
    )?;

    // Detail records share the general record id
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS vnest_exercises (
            id TEXT PRIMARY KEY,
            level TEXT NOT NULL,
            context TEXT NOT NULL,
            verb TEXT NOT NULL,
            pairs TEXT NOT NULL DEFAULT '[]',
            sentences TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_vnest_context_verb ON vnest_exercises(context, verb);

        CREATE TABLE IF NOT EXISTS sr_exercises (
            id TEXT PRIMARY KEY,
            question TEXT NOT NULL,
            correct_answer TEXT NOT NULL,
            interval_index INTEGER NOT NULL DEFAULT 0,
            intervals_sec TEXT NOT NULL,
            success_streak INTEGER NOT NULL DEFAULT 0,
            lapses INTEGER NOT NULL DEFAULT 0,
            next_due INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'learning',
            context TEXT
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            patient_id TEXT NOT NULL,
            exercise_id TEXT NOT NULL,
            context TEXT,
            therapy TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pendiente',
            priority INTEGER NOT NULL,
            last_performed TEXT,
            times_performed INTEGER NOT NULL DEFAULT 0,
            assigned_at TEXT NOT NULL,
            personalized INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (patient_id, exercise_id)
        );

        CREATE INDEX IF NOT EXISTS idx_assignments_context ON assignments(patient_id, context);
        CREATE INDEX IF NOT EXISTS idx_assignments_status ON assignments(patient_id, status);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    let current = from_version;

    if current < SCHEMA_VERSION {
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate.",
            current
        ));
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
