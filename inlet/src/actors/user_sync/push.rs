//! Push handler: applies an ordered batch of client mutations exactly once.
//!
//! Replay protection is keyed by (client group, client id): a mutation whose
//! sequence number is at or below the recorded cursor is skipped. The whole
//! call runs in one transaction, so a failing mutation rolls back everything
//! the call wrote, including the version bump.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use shared_types::PushRequest;

use super::mutations::Mutation;
use super::{store, SyncError};

pub(super) fn handle_push(
    conn: &mut Connection,
    request: &PushRequest,
    now: DateTime<Utc>,
) -> Result<(), SyncError> {
    let tx = conn.transaction()?;

    // Submission order, never reordered across clients
    for envelope in &request.mutations {
        let last = store::last_mutation_id(&tx, &request.client_group_id, &envelope.client_id)?;
        if envelope.id <= last {
            tracing::debug!(
                client_id = %envelope.client_id,
                mutation_id = envelope.id,
                last_applied = last,
                "Skipping already-applied mutation"
            );
            continue;
        }

        let applied = Mutation::parse(&envelope.name, &envelope.args)
            .and_then(|mutation| mutation.apply(&tx, now));
        if let Err(e) = applied {
            tracing::warn!(
                client_id = %envelope.client_id,
                mutation_id = envelope.id,
                mutation = %envelope.name,
                error = %e,
                "Mutation failed; rolling back push batch"
            );
            return Err(SyncError::MutationFailed {
                id: envelope.id,
                detail: e.to_string(),
            });
        }

        store::record_mutation_id(
            &tx,
            &request.client_group_id,
            &envelope.client_id,
            envelope.id,
        )?;
    }

    // One version bump per call with any mutations at all, replayed or not:
    // the cursor is call-granular, not item-granular.
    if !request.mutations.is_empty() {
        store::bump_version(&tx)?;
    }

    tx.commit()?;
    Ok(())
}
