//! User Supervisor - root of the supervision tree
//!
//! Owns the registry of live per-user actors. Each user gets exactly one
//! actor, spawned lazily on first use and linked for supervision; when a
//! child fails or terminates, its registry entry is dropped so the next
//! request respawns it against the durable on-disk store.
//!
//! ## Architecture
//!
//! UserSupervisor (one_for_one strategy)
//! ├── UserSyncActor (user a)
//! ├── UserSyncActor (user b)
//! └── ...

use std::collections::HashMap;
use std::path::PathBuf;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use tracing::info;

use crate::actors::user_sync::{StoreLocation, UserSyncActor, UserSyncArguments, UserSyncMsg};

/// Where per-user databases live.
#[derive(Debug, Clone)]
pub enum StoreRoot {
    /// One `<user_id>.db` file per user under `<dir>/users/`
    Dir(PathBuf),
    /// Every user gets a fresh in-memory store (tests)
    InMemory,
}

impl StoreRoot {
    fn location_for(&self, user_id: &str) -> StoreLocation {
        match self {
            StoreRoot::Dir(dir) => {
                StoreLocation::File(dir.join("users").join(format!("{user_id}.db")))
            }
            StoreRoot::InMemory => StoreLocation::InMemory,
        }
    }
}

/// Root supervisor for all per-user actors
#[derive(Debug, Default)]
pub struct UserSupervisor;

#[derive(Debug, Clone)]
pub struct UserSupervisorArguments {
    pub store_root: StoreRoot,
    pub pull_skip_unchanged: bool,
}

/// User supervisor state
pub struct UserSupervisorState {
    store_root: StoreRoot,
    pull_skip_unchanged: bool,
    users: HashMap<String, ActorRef<UserSyncMsg>>,
    supervision_event_counts: SupervisionEventCounts,
    last_supervision_failure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisionEventCounts {
    pub actor_started: u64,
    pub actor_failed: u64,
    pub actor_terminated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSupervisorHealth {
    pub active_users: usize,
    pub supervision_event_counts: SupervisionEventCounts,
    pub last_supervision_failure: Option<String>,
}

/// Messages handled by UserSupervisor
#[derive(Debug)]
pub enum UserSupervisorMsg {
    /// Get the actor for a user, spawning it on first use
    GetOrCreateUser {
        user_id: String,
        reply: RpcReplyPort<Result<ActorRef<UserSyncMsg>, String>>,
    },
    /// Return health snapshot and supervision counters
    GetHealth {
        reply: RpcReplyPort<UserSupervisorHealth>,
    },
}

#[ractor::async_trait]
impl Actor for UserSupervisor {
    type Msg = UserSupervisorMsg;
    type State = UserSupervisorState;
    type Arguments = UserSupervisorArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(
            supervisor = %myself.get_id(),
            "UserSupervisor starting"
        );
        Ok(UserSupervisorState {
            store_root: args.store_root,
            pull_skip_unchanged: args.pull_skip_unchanged,
            users: HashMap::new(),
            supervision_event_counts: SupervisionEventCounts::default(),
            last_supervision_failure: None,
        })
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        event: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match &event {
            SupervisionEvent::ActorStarted(_) => {
                state.supervision_event_counts.actor_started += 1;
            }
            SupervisionEvent::ActorFailed(actor_cell, failure) => {
                state.supervision_event_counts.actor_failed += 1;
                state.last_supervision_failure =
                    Some(format!("actor_id={} error={failure}", actor_cell.get_id()));
                tracing::error!(
                    supervisor = %myself.get_id(),
                    actor_id = %actor_cell.get_id(),
                    error = %failure,
                    "User actor failed"
                );
                let failed_id = actor_cell.get_id();
                state.users.retain(|_, actor| actor.get_id() != failed_id);
            }
            SupervisionEvent::ActorTerminated(actor_cell, _, _) => {
                state.supervision_event_counts.actor_terminated += 1;
                let stopped_id = actor_cell.get_id();
                state.users.retain(|_, actor| actor.get_id() != stopped_id);
            }
            _ => {}
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            UserSupervisorMsg::GetOrCreateUser { user_id, reply } => {
                if let Some(existing) = state.users.get(&user_id) {
                    let _ = reply.send(Ok(existing.clone()));
                    return Ok(());
                }

                let args = UserSyncArguments {
                    user_id: user_id.clone(),
                    location: state.store_root.location_for(&user_id),
                    pull_skip_unchanged: state.pull_skip_unchanged,
                };

                // No fixed name - allows multiple supervisors in tests
                let result = Actor::spawn_linked(None, UserSyncActor, args, myself.get_cell())
                    .await
                    .map(|(actor, _handle)| actor)
                    .map_err(|e| e.to_string());

                if let Ok(actor) = &result {
                    info!(user_id = %user_id, actor_id = %actor.get_id(), "Spawned user actor");
                    state.users.insert(user_id, actor.clone());
                }
                let _ = reply.send(result);
            }
            UserSupervisorMsg::GetHealth { reply } => {
                let _ = reply.send(UserSupervisorHealth {
                    active_users: state.users.len(),
                    supervision_event_counts: state.supervision_event_counts.clone(),
                    last_supervision_failure: state.last_supervision_failure.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Convenience function to resolve a user's actor
pub async fn get_or_create_user(
    supervisor: &ActorRef<UserSupervisorMsg>,
    user_id: impl Into<String>,
) -> Result<Result<ActorRef<UserSyncMsg>, String>, ractor::RactorErr<UserSupervisorMsg>> {
    ractor::call!(supervisor, |reply| UserSupervisorMsg::GetOrCreateUser {
        user_id: user_id.into(),
        reply,
    })
}
