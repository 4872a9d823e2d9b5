//! Mutation processor.
//!
//! Closed dispatch from a wire mutation (name + args) to store writes. Each
//! known name is one enum variant; an unrecognized name parses to `Unknown`
//! and applies as a logged no-op so newer clients can ship mutation kinds
//! this server version has never heard of. Malformed args for a known name
//! are an error: skipping them silently would desync the client.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use shared_types::{ItemState, Source};

use super::{store, SyncError};

#[derive(Debug, Clone)]
pub enum Mutation {
    BookmarkItem { user_item_id: String },
    ArchiveItem { user_item_id: String },
    UpdateUserItemState { user_item_id: String, state: ItemState },
    AddSource { source: Source },
    RemoveSource { source_id: String },
    Unknown { name: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserItemArgs {
    user_item_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStateArgs {
    user_item_id: String,
    state: ItemState,
}

#[derive(Debug, Deserialize)]
struct AddSourceArgs {
    source: Source,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveSourceArgs {
    source_id: String,
}

impl Mutation {
    pub fn parse(name: &str, args: &serde_json::Value) -> Result<Self, SyncError> {
        match name {
            shared_types::MUTATION_BOOKMARK_ITEM => {
                let args: UserItemArgs = serde_json::from_value(args.clone())?;
                Ok(Mutation::BookmarkItem {
                    user_item_id: args.user_item_id,
                })
            }
            shared_types::MUTATION_ARCHIVE_ITEM => {
                let args: UserItemArgs = serde_json::from_value(args.clone())?;
                Ok(Mutation::ArchiveItem {
                    user_item_id: args.user_item_id,
                })
            }
            shared_types::MUTATION_UPDATE_USER_ITEM_STATE => {
                let args: UpdateStateArgs = serde_json::from_value(args.clone())?;
                Ok(Mutation::UpdateUserItemState {
                    user_item_id: args.user_item_id,
                    state: args.state,
                })
            }
            shared_types::MUTATION_ADD_SOURCE => {
                let args: AddSourceArgs = serde_json::from_value(args.clone())?;
                Ok(Mutation::AddSource {
                    source: args.source,
                })
            }
            shared_types::MUTATION_REMOVE_SOURCE => {
                let args: RemoveSourceArgs = serde_json::from_value(args.clone())?;
                Ok(Mutation::RemoveSource {
                    source_id: args.source_id,
                })
            }
            other => Ok(Mutation::Unknown {
                name: other.to_string(),
            }),
        }
    }

    /// Apply this mutation's store writes with the call's timestamp.
    pub fn apply(&self, conn: &Connection, now: DateTime<Utc>) -> Result<(), SyncError> {
        match self {
            Mutation::BookmarkItem { user_item_id } => {
                if !store::bookmark_user_item(conn, user_item_id, now)? {
                    return Err(SyncError::UserItemNotFound(user_item_id.clone()));
                }
                Ok(())
            }
            Mutation::ArchiveItem { user_item_id } => {
                if !store::archive_user_item(conn, user_item_id, now)? {
                    return Err(SyncError::UserItemNotFound(user_item_id.clone()));
                }
                Ok(())
            }
            Mutation::UpdateUserItemState {
                user_item_id,
                state,
            } => {
                if !store::update_user_item_state(conn, user_item_id, *state, now)? {
                    return Err(SyncError::UserItemNotFound(user_item_id.clone()));
                }
                Ok(())
            }
            Mutation::AddSource { source } => store::upsert_source(conn, source),
            // Deleting an already-removed source replays as a no-op
            Mutation::RemoveSource { source_id } => {
                store::delete_source(conn, source_id)?;
                Ok(())
            }
            Mutation::Unknown { name } => {
                tracing::warn!(mutation = %name, "Ignoring unknown mutation kind");
                Ok(())
            }
        }
    }
}
