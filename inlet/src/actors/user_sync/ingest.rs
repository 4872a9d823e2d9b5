//! Ingestion handler: folds externally-fetched candidates into the store.
//!
//! The seen-marks table is the sole dedup guard: a (source, provider item)
//! pair is ingested at most once, ever. Unlike push, one bad candidate does
//! not fail the batch; each candidate runs inside its own savepoint and a
//! failure is reported in `errors[]` while the rest of the batch proceeds.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction};
use shared_types::{CanonicalItem, IngestCandidate, IngestOutcome, IngestRequest, ItemState,
                   Provider, UserItem};
use ulid::Ulid;

use super::{store, SyncError};

pub(super) fn handle_ingest(
    conn: &mut Connection,
    request: &IngestRequest,
    now: DateTime<Utc>,
) -> Result<IngestOutcome, SyncError> {
    let mut tx = conn.transaction()?;

    // Unknown source aborts the whole batch; no partial ingestion here
    let source = store::get_source(&tx, &request.source_id)?
        .ok_or_else(|| SyncError::SourceNotFound(request.source_id.clone()))?;

    let mut outcome = IngestOutcome {
        ingested: 0,
        skipped: 0,
        errors: Vec::new(),
    };

    for candidate in &request.items {
        if store::is_seen(&tx, &request.source_id, &candidate.provider_item_id)? {
            outcome.skipped += 1;
            continue;
        }

        match ingest_candidate(&mut tx, &request.source_id, source.provider, candidate, now) {
            Ok(()) => outcome.ingested += 1,
            Err(e) => {
                tracing::warn!(
                    source_id = %request.source_id,
                    provider_item_id = %candidate.provider_item_id,
                    error = %e,
                    "Failed to ingest candidate"
                );
                outcome
                    .errors
                    .push(format!("{}: {e}", candidate.provider_item_id));
            }
        }
    }

    // Every ingest call advances the cursor, even an all-skipped batch
    store::bump_version(&tx)?;
    tx.commit()?;

    Ok(outcome)
}

fn ingest_candidate(
    tx: &mut Transaction,
    source_id: &str,
    provider: Provider,
    candidate: &IngestCandidate,
    now: DateTime<Utc>,
) -> Result<(), SyncError> {
    let sp = tx.savepoint()?;

    // Canonical identity is (provider, provider item id); an item first seen
    // through another source (or a manual save) is reused, not duplicated.
    let item_id = match store::find_item_id(&sp, provider, &candidate.provider_item_id)? {
        Some(id) => id,
        None => {
            let item_id = Ulid::new().to_string();
            store::insert_item(
                &sp,
                &CanonicalItem {
                    id: item_id.clone(),
                    content_type: candidate.content_type,
                    provider,
                    provider_item_id: candidate.provider_item_id.clone(),
                    url: candidate.url.clone(),
                    title: candidate.title.clone(),
                    creator: candidate.creator.clone(),
                    thumbnail_url: candidate.thumbnail_url.clone(),
                    duration_seconds: candidate.duration_seconds,
                    published_at: candidate.published_at,
                    created_at: now,
                },
            )?;
            item_id
        }
    };

    if !store::user_item_exists_for_item(&sp, &item_id)? {
        store::insert_user_item(
            &sp,
            &UserItem {
                id: Ulid::new().to_string(),
                item_id,
                state: ItemState::Inbox,
                ingested_at: Some(now),
                bookmarked_at: None,
                archived_at: None,
            },
        )?;
    }

    store::mark_seen(&sp, source_id, &candidate.provider_item_id, now)?;
    sp.commit()?;
    Ok(())
}
