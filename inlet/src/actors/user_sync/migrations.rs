//! Schema migrations for the per-user store.
//!
//! Migrations are applied exactly once per database, tracked by the
//! `schema_migrations` ledger table. Each pending migration runs inside its
//! own transaction so the DDL and its ledger row commit together; a failure
//! leaves the ledger consistent and aborts actor startup.

use rusqlite::Connection;

use super::SyncError;

/// Current schema version. A sync cookie minted under a different schema
/// version forces a full resync on pull.
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_collection",
        r#"
        CREATE TABLE items (
            id TEXT PRIMARY KEY,
            content_type TEXT NOT NULL,
            provider TEXT NOT NULL,
            provider_item_id TEXT NOT NULL,
            url TEXT,
            title TEXT,
            creator TEXT,
            thumbnail_url TEXT,
            duration_seconds INTEGER,
            published_at TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (provider, provider_item_id)
        );

        CREATE TABLE user_items (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL UNIQUE REFERENCES items(id),
            state TEXT NOT NULL,
            ingested_at TEXT,
            bookmarked_at TEXT,
            archived_at TEXT
        );

        CREATE TABLE sources (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            name TEXT NOT NULL,
            config TEXT
        );

        CREATE TABLE seen_items (
            source_id TEXT NOT NULL,
            provider_item_id TEXT NOT NULL,
            seen_at TEXT NOT NULL,
            PRIMARY KEY (source_id, provider_item_id)
        );

        CREATE INDEX idx_user_items_state ON user_items(state);
        "#,
    ),
    (
        "0002_sync_protocol",
        r#"
        CREATE TABLE sync_clients (
            client_group_id TEXT NOT NULL,
            client_id TEXT NOT NULL,
            last_mutation_id INTEGER NOT NULL,
            PRIMARY KEY (client_group_id, client_id)
        );

        CREATE TABLE sync_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        INSERT INTO sync_version (id, version) VALUES (1, 0);
        "#,
    ),
    (
        "0003_profile",
        r#"
        CREATE TABLE profile (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            user_id TEXT,
            email TEXT,
            given_name TEXT,
            family_name TEXT,
            created_at TEXT
        );
        "#,
    ),
];

/// Apply every migration not yet recorded in the ledger, in order.
/// Returns the names applied by this call (all of them on a fresh database,
/// empty once the schema is current).
pub fn run(conn: &mut Connection) -> Result<Vec<String>, SyncError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let mut applied = Vec::new();
    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        if already_applied {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
            rusqlite::params![name, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        tracing::info!(migration = name, "Applied schema migration");
        applied.push((*name).to_string());
    }

    Ok(applied)
}

/// Migration names currently recorded in the ledger, in applied order.
pub fn applied_names(conn: &Connection) -> Result<Vec<String>, SyncError> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY rowid")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}
