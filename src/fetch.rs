use std::process::Stdio;

use tokio::process::Command;

use crate::config::RunConfig;
use crate::plan::WorkItem;

/// Terminal state of one cutout fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Completed,
    Failed,
    /// Dry run: the command was printed, not executed
    Skipped,
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStatus::Completed => write!(f, "completed"),
            FetchStatus::Failed => write!(f, "failed"),
            FetchStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of one fetch attempt. Failures are data, not errors: a failed
/// item is reported and left incomplete for the next run to rediscover.
#[derive(Debug)]
pub struct FetchOutcome {
    pub targetid: i64,
    pub status: FetchStatus,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

/// Invokes the external cutout program once per work item.
///
/// Each invocation is an independent, idempotent call writing a distinct
/// output path, so fetches can run concurrently without coordination.
#[derive(Debug, Clone)]
pub struct CutoutFetcher {
    program: String,
    cutout_size: u32,
    dry_run: bool,
}

impl CutoutFetcher {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            program: config.fetch_program.clone(),
            cutout_size: config.cutout_size,
            dry_run: config.dry_run,
        }
    }

    /// The argv this fetcher would run for `item`.
    pub fn command_line(&self, item: &WorkItem) -> Vec<String> {
        vec![
            self.program.clone(),
            "--ra".to_string(),
            format!("{}", item.ra),
            "--dec".to_string(),
            format!("{}", item.dec),
            "--size".to_string(),
            self.cutout_size.to_string(),
            "--outfile".to_string(),
            item.out_path.display().to_string(),
        ]
    }

    /// Fetch one cutout. Never returns an error: a non-zero exit or spawn
    /// failure becomes a `Failed` outcome and a warning, and sibling items
    /// proceed.
    pub async fn fetch(&self, item: &WorkItem) -> FetchOutcome {
        let argv = self.command_line(item);

        if self.dry_run {
            println!("{}", argv.join(" "));
            return FetchOutcome {
                targetid: item.targetid,
                status: FetchStatus::Skipped,
                exit_code: None,
                error: None,
            };
        }

        if let Some(dir) = item.out_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                tracing::warn!(
                    targetid = item.targetid,
                    dir = %dir.display(),
                    error = %e,
                    "Could not create output directory"
                );
                return FetchOutcome {
                    targetid: item.targetid,
                    status: FetchStatus::Failed,
                    exit_code: None,
                    error: Some(e.to_string()),
                };
            }
        }

        tracing::debug!(
            targetid = item.targetid,
            ra = item.ra,
            dec = item.dec,
            out = %item.out_path.display(),
            "Fetching cutout"
        );

        let result = Command::new(&argv[0])
            .args(&argv[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => FetchOutcome {
                targetid: item.targetid,
                status: FetchStatus::Completed,
                exit_code: output.status.code(),
                error: None,
            },
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let exit_code = output.status.code();
                tracing::warn!(
                    targetid = item.targetid,
                    exit_code = ?exit_code,
                    stderr = %stderr.trim(),
                    "Cutout fetch failed"
                );
                FetchOutcome {
                    targetid: item.targetid,
                    status: FetchStatus::Failed,
                    exit_code,
                    error: Some(if stderr.is_empty() {
                        format!("Exit code: {:?}", exit_code)
                    } else {
                        stderr
                    }),
                }
            }
            Err(e) => {
                tracing::warn!(
                    targetid = item.targetid,
                    program = %self.program,
                    error = %e,
                    "Cutout fetch could not be spawned"
                );
                FetchOutcome {
                    targetid: item.targetid,
                    status: FetchStatus::Failed,
                    exit_code: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
