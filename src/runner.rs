//! Rank orchestration: broadcast the plan, fan out fetches, join at the barrier.
//!
//! The coordinator computes the [`Assignment`] exactly once and sends each
//! rank its slice over a one-shot channel; ranks never recompute the plan, so
//! every rank works from the same view of the filesystem. Within a rank a
//! bounded pool fans the per-item fetches out concurrently. Awaiting every
//! rank handle is the completion barrier; per-item failures are counted, not
//! escalated.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::config::RunConfig;
use crate::error::{FetchError, Result};
use crate::fetch::{CutoutFetcher, FetchStatus};
use crate::plan::{self, WorkGroup};

/// Per-rank completion totals reported at the barrier.
#[derive(Debug, Clone, Serialize)]
pub struct RankSummary {
    pub rank: usize,
    pub groups: usize,
    pub completed: usize,
    pub failed: usize,
}

/// One rank's share of the plan, for `--plan` output.
#[derive(Debug, Clone, Serialize)]
pub struct RankPlan {
    pub rank: usize,
    pub groups: usize,
    pub items: usize,
}

/// Compute the assignment and report each rank's group and item totals
/// without fetching anything.
pub fn plan_report(groups: &[WorkGroup], ranks: usize) -> Result<Vec<RankPlan>> {
    let assignment = plan::plan(groups, ranks)?;
    let weights = assignment.rank_weights(groups);
    Ok(assignment
        .iter()
        .zip(weights)
        .enumerate()
        .map(|(rank, (indices, items))| RankPlan {
            rank,
            groups: indices.len(),
            items,
        })
        .collect())
}

/// Drives one full planning-and-fetch run.
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Plan the discovered groups, run every rank to completion, and return
    /// the per-rank summaries.
    ///
    /// # Errors
    ///
    /// Only planning errors and rank-task panics are fatal; individual fetch
    /// failures end up in the summaries.
    pub async fn run(&self, groups: Vec<WorkGroup>) -> Result<Vec<RankSummary>> {
        let assignment = plan::plan(&groups, self.config.ranks)?;
        let weights = assignment.rank_weights(&groups);
        for (rank, (indices, weight)) in assignment.iter().zip(&weights).enumerate() {
            tracing::info!(rank, groups = indices.len(), items = weight, "Rank assignment");
        }

        let groups = Arc::new(groups);
        let fetcher = CutoutFetcher::new(&self.config);

        // Spawn the rank tasks first, then broadcast each one its slice.
        let mut senders = Vec::with_capacity(assignment.size());
        let mut handles: Vec<JoinHandle<RankSummary>> = Vec::with_capacity(assignment.size());
        for rank in 0..assignment.size() {
            let (tx, rx) = mpsc::channel::<Vec<usize>>(1);
            senders.push(tx);
            let groups = Arc::clone(&groups);
            let fetcher = fetcher.clone();
            let jobs = self.config.jobs;
            handles.push(tokio::spawn(async move {
                run_rank(rank, rx, groups, fetcher, jobs).await
            }));
        }
        for (rank, tx) in senders.into_iter().enumerate() {
            let slice = assignment.rank(rank).to_vec();
            if tx.send(slice).await.is_err() {
                tracing::error!(rank, "Rank task dropped its plan channel");
            }
        }

        // Barrier: the run is complete only when every rank has finished.
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            let summary = handle
                .await
                .map_err(|e| FetchError::Internal(format!("rank task panicked: {e}")))?;
            summaries.push(summary);
        }
        summaries.sort_by_key(|s| s.rank);

        let completed: usize = summaries.iter().map(|s| s.completed).sum();
        let failed: usize = summaries.iter().map(|s| s.failed).sum();
        tracing::info!(completed, failed, ranks = summaries.len(), "All ranks finished");
        Ok(summaries)
    }
}

/// One rank: receive the slice of the plan, fetch every item of every
/// assigned group in plan order, at most `jobs` fetches in flight.
async fn run_rank(
    rank: usize,
    mut plan_rx: mpsc::Receiver<Vec<usize>>,
    groups: Arc<Vec<WorkGroup>>,
    fetcher: CutoutFetcher,
    jobs: usize,
) -> RankSummary {
    let Some(slice) = plan_rx.recv().await else {
        tracing::error!(rank, "Plan channel closed before broadcast");
        return RankSummary {
            rank,
            groups: 0,
            completed: 0,
            failed: 0,
        };
    };

    let pool = Arc::new(Semaphore::new(jobs));
    let mut fetches: Vec<JoinHandle<FetchStatus>> = Vec::new();
    for &group_index in &slice {
        for item in &groups[group_index].items {
            // Launch order follows the plan; the permit bounds concurrency.
            let Ok(permit) = Arc::clone(&pool).acquire_owned().await else {
                break;
            };
            let fetcher = fetcher.clone();
            let item = item.clone();
            fetches.push(tokio::spawn(async move {
                let outcome = fetcher.fetch(&item).await;
                drop(permit);
                outcome.status
            }));
        }
    }

    let mut completed = 0usize;
    let mut failed = 0usize;
    for fetch in fetches {
        match fetch.await {
            Ok(FetchStatus::Completed) | Ok(FetchStatus::Skipped) => completed += 1,
            Ok(FetchStatus::Failed) => failed += 1,
            Err(e) => {
                tracing::warn!(rank, error = %e, "Fetch task panicked");
                failed += 1;
            }
        }
    }

    tracing::info!(rank, groups = slice.len(), completed, failed, "Rank finished");
    RankSummary {
        rank,
        groups: slice.len(),
        completed,
        failed,
    }
}
