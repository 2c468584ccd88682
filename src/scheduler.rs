//! Bounded fan-out executor shared by both batch engines.
//!
//! ## Why one scheduler?
//!
//! Converting and splitting are the same shape of work: N independent
//! units, each mapped through an async operation that always yields a
//! result record. Centralising the fan-out here means worker-count
//! semantics (`0` = all cores, `1` = strictly sequential) behave
//! identically across engines and are tested once.
//!
//! The per-unit operation must encode failure *inside* its record — the
//! scheduler has no error channel, so a unit cannot abort the batch.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Resolve a requested worker count to an actual one.
///
/// `0` means "one worker per CPU core". Falls back to 1 if the core count
/// cannot be determined.
pub fn effective_workers(requested: usize) -> usize {
    if requested == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        requested
    }
}

/// Run `op` over every unit with at most `workers` in flight.
///
/// Completion order is arbitrary when `workers > 1`; records must carry
/// their own unit identity and callers sort afterwards. `workers == 1`
/// takes an explicit sequential path (simpler backtraces, strictly ordered
/// logs) that produces the same records as the concurrent path.
pub async fn run_units<U, R, F, Fut>(units: Vec<U>, workers: usize, op: F) -> Vec<R>
where
    F: Fn(U) -> Fut,
    Fut: Future<Output = R>,
{
    let workers = effective_workers(workers);

    if workers == 1 {
        let mut records = Vec::with_capacity(units.len());
        for unit in units {
            records.push(op(unit).await);
        }
        return records;
    }

    stream::iter(units.into_iter().map(op))
        .buffer_unordered(workers)
        .collect()
        .await
}
