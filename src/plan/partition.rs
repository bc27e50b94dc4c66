//! Weighted work partitioner.
//!
//! Splits discovery-ordered work groups into contiguous slices of
//! approximately equal total weight, one slice per rank, by cutting the
//! cumulative weight sequence at evenly spaced fractions. Each rank's slice
//! is then reordered cheapest-group-first so quick groups finish early and
//! failures surface sooner. The cut search is an approximation (no
//! rebalancing after a bad cut); that is intentional.

use crate::error::{FetchError, Result};
use crate::plan::{Assignment, WorkGroup};

/// Partition `groups` across `worker_count` ranks.
///
/// Deterministic for a given input order and weight sequence. Zero-weight
/// groups are dropped; every other group lands on exactly one rank. An empty
/// input yields `worker_count` empty rank assignments, which is not an error.
///
/// # Errors
///
/// `InvalidArgument` if `worker_count` is zero. `AssignmentSizeMismatch` if
/// the produced rank count ever disagrees with `worker_count`; that would be
/// a partitioner bug, not a caller error.
pub fn plan(groups: &[WorkGroup], worker_count: usize) -> Result<Assignment> {
    if worker_count == 0 {
        return Err(FetchError::InvalidArgument(
            "worker count must be at least 1".to_string(),
        ));
    }

    // Zero-weight groups never occupy a slot.
    let live: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.weight() > 0)
        .map(|(i, _)| i)
        .collect();

    if live.is_empty() {
        return finish(vec![Vec::new(); worker_count], worker_count);
    }

    let weights: Vec<usize> = live.iter().map(|&i| groups[i].weight()).collect();
    let total: usize = weights.iter().sum();

    // Cumulative weight fractions, monotonically increasing in (0, 1].
    let mut cumfrac = Vec::with_capacity(weights.len());
    let mut running = 0usize;
    for &w in &weights {
        running += w;
        cumfrac.push(running as f64 / total as f64);
    }

    // One cut per rank boundary: the slice boundary sits just after the
    // first group whose cumulative fraction reaches k/worker_count.
    let mut cuts: Vec<usize> = (1..worker_count)
        .map(|k| {
            let target = k as f64 / worker_count as f64;
            cumfrac.partition_point(|&f| f < target) + 1
        })
        .collect();
    cuts.dedup();

    // Too few distinct cuts (tiny inputs): fall back to unweighted,
    // approximately-equal-length contiguous chunks.
    let bounds = if cuts.len() < worker_count - 1 {
        even_chunk_bounds(live.len(), worker_count)
    } else {
        cuts
    };

    let mut ranks = Vec::with_capacity(worker_count);
    let mut start = 0usize;
    for end in bounds.into_iter().chain(std::iter::once(live.len())) {
        let end = end.min(live.len());
        let mut slice: Vec<usize> = (start..end).collect();
        // Stable: equal weights keep discovery order.
        slice.sort_by_key(|&p| weights[p]);
        ranks.push(slice.into_iter().map(|p| live[p]).collect());
        start = end;
    }

    finish(ranks, worker_count)
}

/// Boundaries splitting `len` positions into `n` contiguous chunks whose
/// lengths differ by at most one; the first `len % n` chunks take the extra
/// element. Returns the `n - 1` interior boundaries.
fn even_chunk_bounds(len: usize, n: usize) -> Vec<usize> {
    let base = len / n;
    let extra = len % n;
    let mut bounds = Vec::with_capacity(n - 1);
    let mut pos = 0usize;
    for chunk in 0..n - 1 {
        pos += base + usize::from(chunk < extra);
        bounds.push(pos);
    }
    bounds
}

fn finish(ranks: Vec<Vec<usize>>, worker_count: usize) -> Result<Assignment> {
    if ranks.len() != worker_count {
        return Err(FetchError::AssignmentSizeMismatch {
            expected: worker_count,
            actual: ranks.len(),
        });
    }
    Ok(Assignment::new(ranks))
}
