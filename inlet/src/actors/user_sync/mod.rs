//! UserSyncActor - the per-user synchronization engine
//!
//! One actor per user owns that user's embedded SQLite store. ractor
//! delivers messages one at a time, so every handler runs with exclusive
//! store access: no locks, mutations applied in arrival order, and a pull
//! issued after a push always observes the push's writes.
//!
//! # Example
//!
//! ```rust,ignore
//! use ractor::{Actor, call};
//!
//! let (actor, _handle) = Actor::spawn(
//!     None,
//!     UserSyncActor,
//!     UserSyncArguments {
//!         user_id: "user-1".to_string(),
//!         location: StoreLocation::File("/var/lib/inlet/users/user-1.db".into()),
//!         pull_skip_unchanged: false,
//!     },
//! ).await?;
//!
//! let response = call!(actor, |reply| UserSyncMsg::Pull {
//!     request: PullRequest { client_group_id: "group-1".to_string(), cookie: None },
//!     reply,
//! })?;
//! ```

mod ingest;
pub mod migrations;
mod mutations;
mod pull;
mod push;
pub mod store;

pub use migrations::SCHEMA_VERSION;
pub use mutations::Mutation;
pub use store::{StoreLocation, UserStore};

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{
    CleanupResponse, IngestOutcome, IngestRequest, InitResponse, Profile, PullRequest,
    PullResponse, PushRequest,
};

/// Actor serving one user's sync protocol.
#[derive(Debug, Default)]
pub struct UserSyncActor;

/// Arguments for spawning UserSyncActor
#[derive(Debug, Clone)]
pub struct UserSyncArguments {
    pub user_id: String,
    pub location: StoreLocation,
    /// Optional pull enhancement: answer an up-to-date cookie with an empty
    /// patch instead of recomputing the snapshot.
    pub pull_skip_unchanged: bool,
}

/// State for UserSyncActor
pub struct UserSyncState {
    user_id: String,
    store: UserStore,
    /// Migration names applied when this instance opened its store,
    /// reported by `/init`.
    migrations_applied: Vec<String>,
    pull_skip_unchanged: bool,
}

// ============================================================================
// Messages
// ============================================================================

/// Messages handled by UserSyncActor
#[derive(Debug)]
pub enum UserSyncMsg {
    /// Upsert profile fields and report schema/migration status
    Init {
        profile: Profile,
        reply: RpcReplyPort<Result<InitResponse, SyncError>>,
    },
    /// Apply an ordered batch of client mutations exactly once
    Push {
        request: PushRequest,
        reply: RpcReplyPort<Result<(), SyncError>>,
    },
    /// Serve a snapshot patch and a fresh sync cookie
    Pull {
        request: PullRequest,
        reply: RpcReplyPort<Result<PullResponse, SyncError>>,
    },
    /// Fold fetched candidates into the store, deduplicated per source
    Ingest {
        request: IngestRequest,
        reply: RpcReplyPort<Result<IngestOutcome, SyncError>>,
    },
    /// Erase every row this user owns and reset the version cursor
    Cleanup {
        reply: RpcReplyPort<Result<CleanupResponse, SyncError>>,
    },
    /// Read the stored profile, if any
    GetProfile {
        reply: RpcReplyPort<Result<Option<Profile>, SyncError>>,
    },
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur in UserSyncActor
#[derive(Debug, thiserror::Error, Clone)]
pub enum SyncError {
    #[error("mutation {id} failed: {detail}")]
    MutationFailed { id: u64, detail: String },

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("user item not found: {0}")]
    UserItemNotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid row: {0}")]
    InvalidRow(String),
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for UserSyncActor {
    type Msg = UserSyncMsg;
    type State = UserSyncState;
    type Arguments = UserSyncArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            user_id = %args.user_id,
            "UserSyncActor starting"
        );

        // Schema is current before the first message is processed; an open
        // or migration failure aborts the spawn instead of serving requests
        // against a partially migrated store.
        let (store, migrations_applied) = UserStore::open(&args.location)
            .map_err(|e| ActorProcessingErr::from(format!("Failed to open user store: {e}")))?;

        Ok(UserSyncState {
            user_id: args.user_id,
            store,
            migrations_applied,
            pull_skip_unchanged: args.pull_skip_unchanged,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            UserSyncMsg::Init { profile, reply } => {
                let result = self.handle_init(profile, state);
                let _ = reply.send(result);
            }
            UserSyncMsg::Push { request, reply } => {
                let result = self.handle_push(request, state);
                let _ = reply.send(result);
            }
            UserSyncMsg::Pull { request, reply } => {
                let result = self.handle_pull(request, state);
                let _ = reply.send(result);
            }
            UserSyncMsg::Ingest { request, reply } => {
                let result = self.handle_ingest(request, state);
                let _ = reply.send(result);
            }
            UserSyncMsg::Cleanup { reply } => {
                let result = self.handle_cleanup(state);
                let _ = reply.send(result);
            }
            UserSyncMsg::GetProfile { reply } => {
                let result = store::get_profile(&state.store.conn);
                let _ = reply.send(result);
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            user_id = %state.user_id,
            "UserSyncActor stopped"
        );
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl UserSyncActor {
    fn handle_init(
        &self,
        profile: Profile,
        state: &mut UserSyncState,
    ) -> Result<InitResponse, SyncError> {
        let profile_updated = !profile.is_empty();
        if profile_updated {
            store::upsert_profile(&state.store.conn, &profile)?;
        }

        Ok(InitResponse {
            success: true,
            schema_version: SCHEMA_VERSION,
            migrations_applied: state.migrations_applied.clone(),
            profile_updated,
        })
    }

    fn handle_push(&self, request: PushRequest, state: &mut UserSyncState) -> Result<(), SyncError> {
        push::handle_push(&mut state.store.conn, &request, chrono::Utc::now())
    }

    fn handle_pull(
        &self,
        request: PullRequest,
        state: &mut UserSyncState,
    ) -> Result<PullResponse, SyncError> {
        pull::handle_pull(&state.store.conn, &request, state.pull_skip_unchanged)
    }

    fn handle_ingest(
        &self,
        request: IngestRequest,
        state: &mut UserSyncState,
    ) -> Result<IngestOutcome, SyncError> {
        ingest::handle_ingest(&mut state.store.conn, &request, chrono::Utc::now())
    }

    fn handle_cleanup(&self, state: &mut UserSyncState) -> Result<CleanupResponse, SyncError> {
        let tables_cleared = store::clear_all(&state.store.conn)?;
        tracing::info!(user_id = %state.user_id, "Cleared all user data");
        Ok(CleanupResponse {
            success: true,
            tables_cleared,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convenience function to push a mutation batch
pub async fn push(
    actor: &ActorRef<UserSyncMsg>,
    request: PushRequest,
) -> Result<Result<(), SyncError>, ractor::RactorErr<UserSyncMsg>> {
    ractor::call!(actor, |reply| UserSyncMsg::Push { request, reply })
}

/// Convenience function to pull a snapshot
pub async fn pull(
    actor: &ActorRef<UserSyncMsg>,
    request: PullRequest,
) -> Result<Result<PullResponse, SyncError>, ractor::RactorErr<UserSyncMsg>> {
    ractor::call!(actor, |reply| UserSyncMsg::Pull { request, reply })
}

/// Convenience function to ingest fetched candidates
pub async fn ingest(
    actor: &ActorRef<UserSyncMsg>,
    request: IngestRequest,
) -> Result<Result<IngestOutcome, SyncError>, ractor::RactorErr<UserSyncMsg>> {
    ractor::call!(actor, |reply| UserSyncMsg::Ingest { request, reply })
}

/// Convenience function to initialize the account
pub async fn init(
    actor: &ActorRef<UserSyncMsg>,
    profile: Profile,
) -> Result<Result<InitResponse, SyncError>, ractor::RactorErr<UserSyncMsg>> {
    ractor::call!(actor, |reply| UserSyncMsg::Init { profile, reply })
}

/// Convenience function to erase the account
pub async fn cleanup(
    actor: &ActorRef<UserSyncMsg>,
) -> Result<Result<CleanupResponse, SyncError>, ractor::RactorErr<UserSyncMsg>> {
    ractor::call!(actor, |reply| UserSyncMsg::Cleanup { reply })
}

/// Convenience function to read the profile
pub async fn get_profile(
    actor: &ActorRef<UserSyncMsg>,
) -> Result<Result<Option<Profile>, SyncError>, ractor::RactorErr<UserSyncMsg>> {
    ractor::call!(actor, |reply| UserSyncMsg::GetProfile { reply })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ractor::Actor;
    use shared_types::{MutationEnvelope, SyncCookie};

    async fn spawn_test_actor() -> ActorRef<UserSyncMsg> {
        let (actor, _handle) = Actor::spawn(
            None,
            UserSyncActor,
            UserSyncArguments {
                user_id: "test-user".to_string(),
                location: StoreLocation::InMemory,
                pull_skip_unchanged: false,
            },
        )
        .await
        .unwrap();
        actor
    }

    fn add_source_mutation(id: u64) -> MutationEnvelope {
        MutationEnvelope {
            id,
            client_id: "client-a".to_string(),
            name: shared_types::MUTATION_ADD_SOURCE.to_string(),
            args: serde_json::json!({
                "source": {
                    "id": "src-1",
                    "provider": "YOUTUBE",
                    "providerId": "UC1",
                    "name": "Chan"
                }
            }),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_init_reports_migrations_once() {
        let actor = spawn_test_actor().await;

        let response = init(&actor, Profile::default()).await.unwrap().unwrap();
        assert!(response.success);
        assert_eq!(response.schema_version, SCHEMA_VERSION);
        assert_eq!(
            response.migrations_applied.len() as i64,
            SCHEMA_VERSION,
            "fresh store applies every migration"
        );
        assert!(!response.profile_updated);

        actor.stop(None);
    }

    #[tokio::test]
    async fn test_profile_upsert_and_read() {
        let actor = spawn_test_actor().await;

        assert!(get_profile(&actor).await.unwrap().unwrap().is_none());

        let response = init(
            &actor,
            Profile {
                email: Some("ada@lovelace.test".to_string()),
                ..Profile::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert!(response.profile_updated);

        let profile = get_profile(&actor).await.unwrap().unwrap().unwrap();
        assert_eq!(profile.email.as_deref(), Some("ada@lovelace.test"));

        actor.stop(None);
    }

    #[tokio::test]
    async fn test_version_advances_per_call() {
        let actor = spawn_test_actor().await;

        let before = pull(
            &actor,
            PullRequest {
                client_group_id: "g".to_string(),
                cookie: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(before.cookie.version, 0);

        push(
            &actor,
            PushRequest {
                client_group_id: "g".to_string(),
                mutations: vec![add_source_mutation(1)],
            },
        )
        .await
        .unwrap()
        .unwrap();

        let after = pull(
            &actor,
            PullRequest {
                client_group_id: "g".to_string(),
                cookie: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(after.cookie.version, 1);
        assert_eq!(after.last_mutation_id_changes.get("client-a"), Some(&1));

        actor.stop(None);
    }

    #[tokio::test]
    async fn test_cleanup_resets_everything() {
        let actor = spawn_test_actor().await;

        push(
            &actor,
            PushRequest {
                client_group_id: "g".to_string(),
                mutations: vec![add_source_mutation(1)],
            },
        )
        .await
        .unwrap()
        .unwrap();

        let response = cleanup(&actor).await.unwrap().unwrap();
        assert!(response.success);
        assert!(response.tables_cleared.contains(&"sources".to_string()));

        let pulled = pull(
            &actor,
            PullRequest {
                client_group_id: "g".to_string(),
                cookie: Some(SyncCookie {
                    version: 99,
                    schema_version: SCHEMA_VERSION,
                }),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(pulled.cookie.version, 0);
        assert_eq!(pulled.patch.len(), 1, "only the clear op remains");
        assert!(pulled.last_mutation_id_changes.is_empty());

        actor.stop(None);
    }
}
