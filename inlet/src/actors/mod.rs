//! Actor implementations for the per-user sync engine

pub mod user_sync;

pub use user_sync::{SyncError, UserSyncActor, UserSyncArguments, UserSyncMsg};
