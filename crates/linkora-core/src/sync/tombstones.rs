//! Deletions that happened while this client was offline.

use super::dto::TombstoneDto;
use super::event::SyncEvent;
use super::reconciler::{Outcome, Reconciler};
use super::routes;
use super::transport::Transport;
use crate::error::Result;

/// Fetch tombstones recorded after `since`.
pub async fn fetch<T: Transport>(transport: &T, since: i64) -> Result<Vec<TombstoneDto>> {
    let value = transport
        .get(
            routes::SYNC_TOMBSTONES,
            &[(routes::EVENT_TIMESTAMP_PARAM, since.to_string())],
        )
        .await?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value)?)
}

/// Replay tombstones in order, returning how many changed the store.
///
/// A tombstone that does not decode into a known event is logged and skipped.
pub async fn apply<T: Transport>(
    reconciler: &Reconciler<T>,
    tombstones: &[TombstoneDto],
) -> Result<usize> {
    let mut applied = 0;
    for tombstone in tombstones {
        let event = match SyncEvent::from_parts(&tombstone.operation, tombstone.payload.clone()) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(
                    "Ignoring undecodable tombstone {}: {error}",
                    tombstone.operation
                );
                continue;
            }
        };

        if reconciler.apply(&event).await? == Outcome::Applied {
            applied += 1;
        }
    }

    if applied > 0 {
        tracing::info!("Applied {applied} of {} tombstones", tombstones.len());
    }
    Ok(applied)
}
