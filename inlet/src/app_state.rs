use ractor::{Actor, ActorRef};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::actors::user_sync::UserSyncMsg;
use crate::supervisor::{
    self, StoreRoot, UserSupervisor, UserSupervisorArguments, UserSupervisorMsg,
};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store_root: StoreRoot,
    pull_skip_unchanged: bool,
    supervisor: Mutex<Option<ActorRef<UserSupervisorMsg>>>,
}

impl AppState {
    pub fn new(store_root: StoreRoot, pull_skip_unchanged: bool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store_root,
                pull_skip_unchanged,
                supervisor: Mutex::new(None),
            }),
        }
    }

    pub async fn ensure_supervisor(&self) -> Result<ActorRef<UserSupervisorMsg>, String> {
        let mut guard = self.inner.supervisor.lock().await;
        if let Some(supervisor) = guard.as_ref() {
            return Ok(supervisor.clone());
        }

        let (supervisor, _) = Actor::spawn(
            Some(format!("user_supervisor:{}", ulid::Ulid::new())),
            UserSupervisor,
            UserSupervisorArguments {
                store_root: self.inner.store_root.clone(),
                pull_skip_unchanged: self.inner.pull_skip_unchanged,
            },
        )
        .await
        .map_err(|e| e.to_string())?;

        *guard = Some(supervisor.clone());
        Ok(supervisor)
    }

    /// Resolve the actor owning `user_id`'s store, spawning it on first use.
    pub async fn user_actor(&self, user_id: &str) -> Result<ActorRef<UserSyncMsg>, String> {
        let supervisor = self.ensure_supervisor().await?;
        supervisor::get_or_create_user(&supervisor, user_id)
            .await
            .map_err(|e| e.to_string())?
    }
}
