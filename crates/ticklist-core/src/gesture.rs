//! Translation of list gestures made against the projected order back onto
//! store order.
//!
//! Swipe-delete and drag-reorder report offsets into the displayed list,
//! which buckets tasks by completion. Store order only tracks the manual
//! arrangement, so every offset is resolved to a task identity before the
//! store is touched.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::ordering::project;
use crate::store::{StoreError, TaskStore};

/// Removes the tasks shown at `offsets` in the projection. Offsets past the
/// end are stale and skipped.
#[instrument(skip(store, offsets), fields(offsets = ?offsets))]
pub fn delete_projected(store: &mut TaskStore, offsets: &BTreeSet<usize>) -> Vec<Uuid> {
    let projected = project(store.tasks());
    let ids: Vec<Uuid> = offsets
        .iter()
        .filter_map(|offset| projected.get(*offset))
        .map(|task| task.uuid)
        .collect();

    if ids.len() < offsets.len() {
        debug!(
            requested = offsets.len(),
            resolved = ids.len(),
            "ignoring stale delete offsets"
        );
    }

    let set: HashSet<Uuid> = ids.iter().copied().collect();
    store.remove(&set);
    ids
}

/// Moves the tasks shown at `sources` so they land before the task shown at
/// `destination`, or at the end of the store when `destination` is past the
/// projection.
#[instrument(skip(store, sources), fields(sources = ?sources))]
pub fn move_projected(
    store: &mut TaskStore,
    sources: &BTreeSet<usize>,
    destination: usize,
) -> Result<(), StoreError> {
    let projected = project(store.tasks());

    let source_positions: BTreeSet<usize> = sources
        .iter()
        .filter_map(|offset| projected.get(*offset))
        .filter_map(|task| store.position(task.uuid))
        .collect();
    if source_positions.is_empty() {
        debug!("no resolvable move sources; nothing to do");
        return Ok(());
    }

    let target = projected
        .get(destination)
        .and_then(|task| store.position(task.uuid))
        .unwrap_or(store.len());
    debug!(?source_positions, target, "translated move into store order");

    let mut order = store.ids();
    move_subset(&mut order, &source_positions, target);
    store.reorder(&order)
}

/// Moves the elements at `sources` so they sit, in their original relative
/// order, before the element that was at `destination`. A destination at or
/// past the end appends. Out-of-range sources are ignored.
pub fn move_subset<T>(items: &mut Vec<T>, sources: &BTreeSet<usize>, destination: usize) {
    let destination = destination.min(items.len());
    let before_destination = sources
        .iter()
        .filter(|idx| **idx < destination && **idx < items.len())
        .count();

    let mut moved = Vec::with_capacity(sources.len());
    let mut kept = Vec::with_capacity(items.len());
    for (idx, item) in items.drain(..).enumerate() {
        if sources.contains(&idx) {
            moved.push(item);
        } else {
            kept.push(item);
        }
    }

    let insert_at = destination - before_destination;
    let tail = kept.split_off(insert_at);
    kept.extend(moved);
    kept.extend(tail);
    *items = kept;
}
