//! Embedded per-user store.
//!
//! Every row in this database belongs to exactly one user; the owning actor
//! is the only writer, so no statement here takes a lock beyond what SQLite
//! itself needs. All SQL for the sync engine lives in this module; the
//! handlers compose these accessors inside their own transactions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use shared_types::{CanonicalItem, ItemState, Profile, Provider, Source, UserItem};

use super::{migrations, SyncError};

/// Where a user's database lives. InMemory is for tests.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

/// Owns the SQLite connection for one user.
pub struct UserStore {
    pub(super) conn: Connection,
}

impl UserStore {
    /// Open (creating if missing) and migrate the database. Returns the
    /// store plus the migration names applied by this open.
    pub fn open(location: &StoreLocation) -> Result<(Self, Vec<String>), SyncError> {
        let mut conn = match location {
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| SyncError::Database(format!("create data dir: {e}")))?;
                }
                let conn = Connection::open(path)?;
                // journal_mode returns the new mode as a row
                conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
                conn
            }
            StoreLocation::InMemory => Connection::open_in_memory()?,
        };
        conn.pragma_update(None, "foreign_keys", true)?;

        let applied = migrations::run(&mut conn)?;
        Ok((Self { conn }, applied))
    }
}

// ============================================================================
// Version Counter
// ============================================================================

pub(super) fn get_version(conn: &Connection) -> Result<i64, SyncError> {
    let version = conn.query_row("SELECT version FROM sync_version WHERE id = 1", [], |row| {
        row.get(0)
    })?;
    Ok(version)
}

pub(super) fn bump_version(conn: &Connection) -> Result<i64, SyncError> {
    conn.execute("UPDATE sync_version SET version = version + 1 WHERE id = 1", [])?;
    get_version(conn)
}

pub(super) fn reset_version(conn: &Connection) -> Result<(), SyncError> {
    conn.execute("UPDATE sync_version SET version = 0 WHERE id = 1", [])?;
    Ok(())
}

// ============================================================================
// Client Records (push replay protection)
// ============================================================================

pub(super) fn last_mutation_id(
    conn: &Connection,
    client_group_id: &str,
    client_id: &str,
) -> Result<u64, SyncError> {
    let last: Option<i64> = conn
        .query_row(
            "SELECT last_mutation_id FROM sync_clients
             WHERE client_group_id = ?1 AND client_id = ?2",
            [client_group_id, client_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(last.unwrap_or(0) as u64)
}

pub(super) fn record_mutation_id(
    conn: &Connection,
    client_group_id: &str,
    client_id: &str,
    mutation_id: u64,
) -> Result<(), SyncError> {
    // max() keeps last_mutation_id non-decreasing even on misuse
    conn.execute(
        "INSERT INTO sync_clients (client_group_id, client_id, last_mutation_id)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(client_group_id, client_id)
         DO UPDATE SET last_mutation_id = MAX(sync_clients.last_mutation_id, excluded.last_mutation_id)",
        rusqlite::params![client_group_id, client_id, mutation_id as i64],
    )?;
    Ok(())
}

pub(super) fn group_last_mutation_ids(
    conn: &Connection,
    client_group_id: &str,
) -> Result<BTreeMap<String, u64>, SyncError> {
    let mut stmt = conn.prepare(
        "SELECT client_id, last_mutation_id FROM sync_clients WHERE client_group_id = ?1",
    )?;
    let rows = stmt.query_map([client_group_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut map = BTreeMap::new();
    for row in rows {
        let (client_id, last) = row?;
        map.insert(client_id, last as u64);
    }
    Ok(map)
}

// ============================================================================
// Canonical Items
// ============================================================================

pub(super) fn insert_item(conn: &Connection, item: &CanonicalItem) -> Result<(), SyncError> {
    conn.execute(
        "INSERT INTO items (id, content_type, provider, provider_item_id, url, title,
                            creator, thumbnail_url, duration_seconds, published_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            item.id,
            item.content_type.as_str(),
            item.provider.as_str(),
            item.provider_item_id,
            item.url,
            item.title,
            item.creator,
            item.thumbnail_url,
            item.duration_seconds,
            item.published_at.map(|ts| ts.to_rfc3339()),
            item.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub(super) fn find_item_id(
    conn: &Connection,
    provider: Provider,
    provider_item_id: &str,
) -> Result<Option<String>, SyncError> {
    let id = conn
        .query_row(
            "SELECT id FROM items WHERE provider = ?1 AND provider_item_id = ?2",
            [provider.as_str(), provider_item_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub(super) fn list_items(conn: &Connection) -> Result<Vec<CanonicalItem>, SyncError> {
    struct Raw {
        id: String,
        content_type: String,
        provider: String,
        provider_item_id: String,
        url: Option<String>,
        title: Option<String>,
        creator: Option<String>,
        thumbnail_url: Option<String>,
        duration_seconds: Option<i64>,
        published_at: Option<String>,
        created_at: String,
    }

    let mut stmt = conn.prepare(
        "SELECT id, content_type, provider, provider_item_id, url, title,
                creator, thumbnail_url, duration_seconds, published_at, created_at
         FROM items ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Raw {
            id: row.get(0)?,
            content_type: row.get(1)?,
            provider: row.get(2)?,
            provider_item_id: row.get(3)?,
            url: row.get(4)?,
            title: row.get(5)?,
            creator: row.get(6)?,
            thumbnail_url: row.get(7)?,
            duration_seconds: row.get(8)?,
            published_at: row.get(9)?,
            created_at: row.get(10)?,
        })
    })?;

    let mut items = Vec::new();
    for row in rows {
        let raw = row?;
        items.push(CanonicalItem {
            content_type: parse_content_type(&raw.content_type)?,
            provider: parse_provider(&raw.provider)?,
            published_at: parse_timestamp_opt(raw.published_at)?,
            created_at: parse_timestamp(&raw.created_at)?,
            id: raw.id,
            provider_item_id: raw.provider_item_id,
            url: raw.url,
            title: raw.title,
            creator: raw.creator,
            thumbnail_url: raw.thumbnail_url,
            duration_seconds: raw.duration_seconds,
        });
    }
    Ok(items)
}

// ============================================================================
// User Items
// ============================================================================

pub(super) fn insert_user_item(conn: &Connection, user_item: &UserItem) -> Result<(), SyncError> {
    conn.execute(
        "INSERT INTO user_items (id, item_id, state, ingested_at, bookmarked_at, archived_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            user_item.id,
            user_item.item_id,
            user_item.state.as_str(),
            user_item.ingested_at.map(|ts| ts.to_rfc3339()),
            user_item.bookmarked_at.map(|ts| ts.to_rfc3339()),
            user_item.archived_at.map(|ts| ts.to_rfc3339()),
        ],
    )?;
    Ok(())
}

pub(super) fn user_item_exists_for_item(
    conn: &Connection,
    item_id: &str,
) -> Result<bool, SyncError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_items WHERE item_id = ?1)",
        [item_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Bookmark transition: clears archived_at so an archived item returns to
/// the bookmarked shelf cleanly. Returns false if the row does not exist.
pub(super) fn bookmark_user_item(
    conn: &Connection,
    user_item_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, SyncError> {
    let changed = conn.execute(
        "UPDATE user_items
         SET state = 'BOOKMARKED', bookmarked_at = ?2, archived_at = NULL
         WHERE id = ?1",
        rusqlite::params![user_item_id, now.to_rfc3339()],
    )?;
    Ok(changed > 0)
}

pub(super) fn archive_user_item(
    conn: &Connection,
    user_item_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, SyncError> {
    let changed = conn.execute(
        "UPDATE user_items SET state = 'ARCHIVED', archived_at = ?2 WHERE id = ?1",
        rusqlite::params![user_item_id, now.to_rfc3339()],
    )?;
    Ok(changed > 0)
}

/// Raw state set. bookmarked_at / archived_at are first-write-wins here,
/// unlike the dedicated transitions above.
pub(super) fn update_user_item_state(
    conn: &Connection,
    user_item_id: &str,
    state: ItemState,
    now: DateTime<Utc>,
) -> Result<bool, SyncError> {
    let changed = conn.execute(
        "UPDATE user_items
         SET state = ?2,
             bookmarked_at = CASE WHEN ?2 = 'BOOKMARKED'
                                  THEN COALESCE(bookmarked_at, ?3)
                                  ELSE bookmarked_at END,
             archived_at = CASE WHEN ?2 = 'ARCHIVED'
                                THEN COALESCE(archived_at, ?3)
                                ELSE archived_at END
         WHERE id = ?1",
        rusqlite::params![user_item_id, state.as_str(), now.to_rfc3339()],
    )?;
    Ok(changed > 0)
}

pub(super) fn list_user_items(conn: &Connection) -> Result<Vec<UserItem>, SyncError> {
    struct Raw {
        id: String,
        item_id: String,
        state: String,
        ingested_at: Option<String>,
        bookmarked_at: Option<String>,
        archived_at: Option<String>,
    }

    let mut stmt = conn.prepare(
        "SELECT id, item_id, state, ingested_at, bookmarked_at, archived_at
         FROM user_items ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Raw {
            id: row.get(0)?,
            item_id: row.get(1)?,
            state: row.get(2)?,
            ingested_at: row.get(3)?,
            bookmarked_at: row.get(4)?,
            archived_at: row.get(5)?,
        })
    })?;

    let mut user_items = Vec::new();
    for row in rows {
        let raw = row?;
        user_items.push(UserItem {
            state: parse_state(&raw.state)?,
            ingested_at: parse_timestamp_opt(raw.ingested_at)?,
            bookmarked_at: parse_timestamp_opt(raw.bookmarked_at)?,
            archived_at: parse_timestamp_opt(raw.archived_at)?,
            id: raw.id,
            item_id: raw.item_id,
        });
    }
    Ok(user_items)
}

// ============================================================================
// Sources
// ============================================================================

pub(super) fn upsert_source(conn: &Connection, source: &Source) -> Result<(), SyncError> {
    let config = source
        .config
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO sources (id, provider, provider_id, name, config)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             provider = excluded.provider,
             provider_id = excluded.provider_id,
             name = excluded.name,
             config = excluded.config",
        rusqlite::params![
            source.id,
            source.provider.as_str(),
            source.provider_id,
            source.name,
            config,
        ],
    )?;
    Ok(())
}

pub(super) fn delete_source(conn: &Connection, source_id: &str) -> Result<bool, SyncError> {
    let changed = conn.execute("DELETE FROM sources WHERE id = ?1", [source_id])?;
    Ok(changed > 0)
}

pub(super) fn get_source(conn: &Connection, source_id: &str) -> Result<Option<Source>, SyncError> {
    let raw = conn
        .query_row(
            "SELECT id, provider, provider_id, name, config FROM sources WHERE id = ?1",
            [source_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;

    match raw {
        None => Ok(None),
        Some((id, provider, provider_id, name, config)) => Ok(Some(Source {
            provider: parse_provider(&provider)?,
            config: config.as_deref().map(serde_json::from_str).transpose()?,
            id,
            provider_id,
            name,
        })),
    }
}

pub(super) fn list_sources(conn: &Connection) -> Result<Vec<Source>, SyncError> {
    let mut stmt =
        conn.prepare("SELECT id, provider, provider_id, name, config FROM sources ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut sources = Vec::new();
    for row in rows {
        let (id, provider, provider_id, name, config) = row?;
        sources.push(Source {
            provider: parse_provider(&provider)?,
            config: config.as_deref().map(serde_json::from_str).transpose()?,
            id,
            provider_id,
            name,
        });
    }
    Ok(sources)
}

// ============================================================================
// Seen Marks (ingestion dedup)
// ============================================================================

pub(super) fn is_seen(
    conn: &Connection,
    source_id: &str,
    provider_item_id: &str,
) -> Result<bool, SyncError> {
    let seen = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM seen_items WHERE source_id = ?1 AND provider_item_id = ?2)",
        [source_id, provider_item_id],
        |row| row.get(0),
    )?;
    Ok(seen)
}

pub(super) fn mark_seen(
    conn: &Connection,
    source_id: &str,
    provider_item_id: &str,
    now: DateTime<Utc>,
) -> Result<(), SyncError> {
    conn.execute(
        "INSERT INTO seen_items (source_id, provider_item_id, seen_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![source_id, provider_item_id, now.to_rfc3339()],
    )?;
    Ok(())
}

// ============================================================================
// Profile
// ============================================================================

/// Field-wise merge: a partial `/init` body never erases fields set earlier.
pub(super) fn upsert_profile(conn: &Connection, profile: &Profile) -> Result<(), SyncError> {
    conn.execute(
        "INSERT INTO profile (id, user_id, email, given_name, family_name, created_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             user_id = COALESCE(excluded.user_id, profile.user_id),
             email = COALESCE(excluded.email, profile.email),
             given_name = COALESCE(excluded.given_name, profile.given_name),
             family_name = COALESCE(excluded.family_name, profile.family_name),
             created_at = COALESCE(excluded.created_at, profile.created_at)",
        rusqlite::params![
            profile.id,
            profile.email,
            profile.given_name,
            profile.family_name,
            profile.created_at.map(|ts| ts.to_rfc3339()),
        ],
    )?;
    Ok(())
}

pub(super) fn get_profile(conn: &Connection) -> Result<Option<Profile>, SyncError> {
    let raw = conn
        .query_row(
            "SELECT user_id, email, given_name, family_name, created_at FROM profile WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;

    match raw {
        None => Ok(None),
        Some((id, email, given_name, family_name, created_at)) => Ok(Some(Profile {
            created_at: parse_timestamp_opt(created_at)?,
            id,
            email,
            given_name,
            family_name,
        })),
    }
}

// ============================================================================
// Cleanup
// ============================================================================

/// Tables erased by account cleanup, child tables first. The migration
/// ledger is infrastructure and survives.
const USER_TABLES: &[&str] = &[
    "seen_items",
    "user_items",
    "items",
    "sources",
    "sync_clients",
    "profile",
];

pub(super) fn clear_all(conn: &Connection) -> Result<Vec<String>, SyncError> {
    for table in USER_TABLES {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
    }
    reset_version(conn)?;
    Ok(USER_TABLES.iter().map(|t| (*t).to_string()).collect())
}

// ============================================================================
// Row Parsing
// ============================================================================

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SyncError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| SyncError::InvalidRow(format!("timestamp '{value}': {e}")))
}

fn parse_timestamp_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>, SyncError> {
    value.as_deref().map(parse_timestamp).transpose()
}

fn parse_state(value: &str) -> Result<ItemState, SyncError> {
    ItemState::parse(value).ok_or_else(|| SyncError::InvalidRow(format!("item state '{value}'")))
}

fn parse_provider(value: &str) -> Result<Provider, SyncError> {
    Provider::parse(value).ok_or_else(|| SyncError::InvalidRow(format!("provider '{value}'")))
}

fn parse_content_type(value: &str) -> Result<shared_types::ContentType, SyncError> {
    shared_types::ContentType::parse(value)
        .ok_or_else(|| SyncError::InvalidRow(format!("content type '{value}'")))
}

// ============================================================================
// Tests
// ============================================================================
