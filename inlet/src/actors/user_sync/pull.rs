//! Pull handler: serves a client a consistent snapshot of its user's state.
//!
//! Baseline contract: every pull recomputes the full snapshot as a clear
//! followed by an upsert per row. Incremental diffing is deliberately not
//! the default; the only shortcut is `skip_unchanged`, which may answer
//! with an empty patch when the client's cookie already matches the
//! current version under the current schema.

use rusqlite::Connection;
use shared_types::{PatchOp, PullRequest, PullResponse, SyncCookie};

use super::migrations::SCHEMA_VERSION;
use super::{store, SyncError};

pub(super) fn handle_pull(
    conn: &Connection,
    request: &PullRequest,
    skip_unchanged: bool,
) -> Result<PullResponse, SyncError> {
    let version = store::get_version(conn)?;
    let cookie = SyncCookie {
        version,
        schema_version: SCHEMA_VERSION,
    };
    let last_mutation_id_changes = store::group_last_mutation_ids(conn, &request.client_group_id)?;

    if skip_unchanged {
        if let Some(prev) = &request.cookie {
            if prev.schema_version == SCHEMA_VERSION && prev.version != 0 && prev.version == version
            {
                tracing::debug!(version, "Pull cookie is current; returning empty patch");
                return Ok(PullResponse {
                    cookie,
                    last_mutation_id_changes,
                    patch: Vec::new(),
                });
            }
        }
    }

    let mut patch = vec![PatchOp::Clear];
    for item in store::list_items(conn)? {
        patch.push(PatchOp::Put {
            key: format!("item/{}", item.id),
            value: serde_json::to_value(&item)?,
        });
    }
    for user_item in store::list_user_items(conn)? {
        patch.push(PatchOp::Put {
            key: format!("userItem/{}", user_item.id),
            value: serde_json::to_value(&user_item)?,
        });
    }
    for source in store::list_sources(conn)? {
        patch.push(PatchOp::Put {
            key: format!("source/{}", source.id),
            value: serde_json::to_value(&source)?,
        });
    }

    Ok(PullResponse {
        cookie,
        last_mutation_id_changes,
        patch,
    })
}
