//! Shared types between the sync server and client libraries
//!
//! These types are used by both:
//! - ractor actors (native Rust)
//! - the TypeScript client library (generated bindings)
//!
//! Serializable with serde for JSON over HTTP. Wire field names are
//! camelCase; database column names are the server's concern.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Domain Enums
// ============================================================================

/// Per-user lifecycle state of a collected item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub enum ItemState {
    Inbox,
    Bookmarked,
    Archived,
}

impl ItemState {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemState::Inbox => "INBOX",
            ItemState::Bookmarked => "BOOKMARKED",
            ItemState::Archived => "ARCHIVED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INBOX" => Some(ItemState::Inbox),
            "BOOKMARKED" => Some(ItemState::Bookmarked),
            "ARCHIVED" => Some(ItemState::Archived),
            _ => None,
        }
    }
}

/// What kind of content a canonical item holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub enum ContentType {
    Video,
    Podcast,
    Article,
    Post,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Video => "VIDEO",
            ContentType::Podcast => "PODCAST",
            ContentType::Article => "ARTICLE",
            ContentType::Post => "POST",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "VIDEO" => Some(ContentType::Video),
            "PODCAST" => Some(ContentType::Podcast),
            "ARTICLE" => Some(ContentType::Article),
            "POST" => Some(ContentType::Post),
            _ => None,
        }
    }
}

/// External platform a source or item originates from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub enum Provider {
    Youtube,
    Podcast,
    Rss,
    Mastodon,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Youtube => "YOUTUBE",
            Provider::Podcast => "PODCAST",
            Provider::Rss => "RSS",
            Provider::Mastodon => "MASTODON",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "YOUTUBE" => Some(Provider::Youtube),
            "PODCAST" => Some(Provider::Podcast),
            "RSS" => Some(Provider::Rss),
            "MASTODON" => Some(Provider::Mastodon),
            _ => None,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// One piece of content, identity shared across everyone who collects it.
/// Immutable after creation except metadata backfill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct CanonicalItem {
    pub id: String,
    pub content_type: ContentType,
    pub provider: Provider,
    pub provider_item_id: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A user's relationship to one canonical item. Exactly one per item;
/// re-saving transitions the row instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct UserItem {
    pub id: String,
    pub item_id: String,
    pub state: ItemState,
    pub ingested_at: Option<DateTime<Utc>>,
    pub bookmarked_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// A subscribed external feed or channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct Source {
    pub id: String,
    pub provider: Provider,
    pub provider_id: String,
    pub name: String,
    #[serde(default)]
    #[ts(type = "unknown")]
    pub config: Option<serde_json::Value>,
}

/// Account profile fields accepted by `/init` and returned by `/profile`.
/// Everything is optional; the server trusts the caller-supplied identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct Profile {
    pub id: Option<String>,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// True if no field is set (an empty `/init` body).
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.email.is_none()
            && self.given_name.is_none()
            && self.family_name.is_none()
            && self.created_at.is_none()
    }
}

// ============================================================================
// Mutation Names
// ============================================================================

pub const MUTATION_BOOKMARK_ITEM: &str = "bookmarkItem";
pub const MUTATION_ARCHIVE_ITEM: &str = "archiveItem";
pub const MUTATION_UPDATE_USER_ITEM_STATE: &str = "updateUserItemState";
pub const MUTATION_ADD_SOURCE: &str = "addSource";
pub const MUTATION_REMOVE_SOURCE: &str = "removeSource";

// ============================================================================
// Push Protocol
// ============================================================================

/// One queued client mutation. `id` is a strictly increasing sequence number
/// scoped to `client_id`; the server applies each (client, id) pair at most
/// once. `args` stays opaque here so newer clients can ship mutation kinds
/// this server version does not know.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct MutationEnvelope {
    pub id: u64,
    pub client_id: String,
    pub name: String,
    #[ts(type = "unknown")]
    pub args: serde_json::Value,
    /// Client-local wall clock in epoch milliseconds, informational only.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct PushRequest {
    pub client_group_id: String,
    pub mutations: Vec<MutationEnvelope>,
}

// ============================================================================
// Pull Protocol
// ============================================================================

/// Version cursor a client hands back on its next pull. A cookie minted
/// under a different schema version forces a full resync.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct SyncCookie {
    pub version: i64,
    pub schema_version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct PullRequest {
    pub client_group_id: String,
    #[serde(default)]
    pub cookie: Option<SyncCookie>,
}

/// One snapshot patch operation. `clear` drops the client's local replica;
/// `put` upserts one keyed value.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "op", rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub enum PatchOp {
    Clear,
    Put {
        key: String,
        #[ts(type = "unknown")]
        value: serde_json::Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct PullResponse {
    pub cookie: SyncCookie,
    /// clientId -> last applied mutation id, for every client in the
    /// requesting group. Clients prune their outgoing queues with this.
    pub last_mutation_id_changes: BTreeMap<String, u64>,
    pub patch: Vec<PatchOp>,
}

// ============================================================================
// Ingestion Protocol
// ============================================================================

/// One externally-fetched content candidate, already normalized by the
/// provider client that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct IngestCandidate {
    pub provider_item_id: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct IngestRequest {
    pub source_id: String,
    pub items: Vec<IngestCandidate>,
}

/// Ingestion never fails for individual items; it reports them here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct IngestOutcome {
    pub ingested: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

// ============================================================================
// Account Protocol
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct InitResponse {
    pub success: bool,
    pub schema_version: i64,
    pub migrations_applied: Vec<String>,
    pub profile_updated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../clients/web/src/types/generated.ts")]
pub struct CleanupResponse {
    pub success: bool,
    pub tables_cleared: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ts_rs::Config;

    #[test]
    fn test_item_state_wire_format() {
        let json = serde_json::to_string(&ItemState::Bookmarked).unwrap();
        assert_eq!(json, "\"BOOKMARKED\"");
        let parsed: ItemState = serde_json::from_str("\"ARCHIVED\"").unwrap();
        assert_eq!(parsed, ItemState::Archived);
        assert_eq!(ItemState::parse("INBOX"), Some(ItemState::Inbox));
        assert_eq!(ItemState::parse("inbox"), None);
    }

    #[test]
    fn test_patch_op_tagging() {
        let clear = serde_json::to_value(&PatchOp::Clear).unwrap();
        assert_eq!(clear, serde_json::json!({"op": "clear"}));

        let put = serde_json::to_value(&PatchOp::Put {
            key: "item/01ABC".to_string(),
            value: serde_json::json!({"title": "T"}),
        })
        .unwrap();
        assert_eq!(put["op"], "put");
        assert_eq!(put["key"], "item/01ABC");
    }

    #[test]
    fn test_push_request_wire_format() {
        let json = serde_json::json!({
            "clientGroupId": "group-1",
            "mutations": [{
                "id": 1,
                "clientId": "client-a",
                "name": "bookmarkItem",
                "args": {"userItemId": "ui-1"}
            }]
        });
        let req: PushRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.client_group_id, "group-1");
        assert_eq!(req.mutations.len(), 1);
        assert_eq!(req.mutations[0].name, MUTATION_BOOKMARK_ITEM);
        assert_eq!(req.mutations[0].timestamp, None);
    }

    #[test]
    fn test_pull_request_without_cookie() {
        let req: PullRequest =
            serde_json::from_value(serde_json::json!({"clientGroupId": "g", "cookie": null}))
                .unwrap();
        assert!(req.cookie.is_none());

        let req: PullRequest =
            serde_json::from_value(serde_json::json!({"clientGroupId": "g"})).unwrap();
        assert!(req.cookie.is_none());
    }

    #[test]
    fn test_profile_is_empty() {
        assert!(Profile::default().is_empty());
        let profile = Profile {
            email: Some("a@b.test".to_string()),
            ..Profile::default()
        };
        assert!(!profile.is_empty());
    }

    #[test]
    fn test_source_round_trip() {
        let source = Source {
            id: "src-1".to_string(),
            provider: Provider::Youtube,
            provider_id: "UC1".to_string(),
            name: "Chan".to_string(),
            config: None,
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["provider"], "YOUTUBE");
        assert_eq!(json["providerId"], "UC1");
        let back: Source = serde_json::from_value(json).unwrap();
        assert_eq!(back, source);
    }

    #[test]
    fn export_types() {
        // Export all types to TypeScript
        // The export_to attribute in each type's #[ts] macro specifies the output file
        let config = Config::default();
        ItemState::export(&config).unwrap();
        ContentType::export(&config).unwrap();
        Provider::export(&config).unwrap();
        CanonicalItem::export(&config).unwrap();
        UserItem::export(&config).unwrap();
        Source::export(&config).unwrap();
        Profile::export(&config).unwrap();
        MutationEnvelope::export(&config).unwrap();
        PushRequest::export(&config).unwrap();
        SyncCookie::export(&config).unwrap();
        PullRequest::export(&config).unwrap();
        PatchOp::export(&config).unwrap();
        PullResponse::export(&config).unwrap();
        IngestCandidate::export(&config).unwrap();
        IngestRequest::export(&config).unwrap();
        IngestOutcome::export(&config).unwrap();
        InitResponse::export(&config).unwrap();
        CleanupResponse::export(&config).unwrap();
    }
}
