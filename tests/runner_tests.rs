//! End-to-end tests for the rank runner: plan broadcast, bounded fan-out,
//! and the completion barrier.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use cutout_fetch::config::{LayoutMode, RunConfig};
use cutout_fetch::discover::discover;
use cutout_fetch::runner::{plan_report, Runner};

fn write_targets(path: &Path, rows: &[(i64, f64, f64)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut contents = String::from("targetid,ra,dec\n");
    for (targetid, ra, dec) in rows {
        contents.push_str(&format!("{targetid},{ra},{dec}\n"));
    }
    fs::write(path, contents).unwrap();
}

/// Two healpix groups with three targets total.
fn seed_tree(data: &Path) {
    let root = data.join("daily").join("healpix");
    write_targets(
        &root.join("sv1/dark/100/10016/targets-sv1-dark-10016.csv"),
        &[(1001, 150.1, 2.2), (1002, 150.2, 2.3)],
    );
    write_targets(
        &root.join("sv1/dark/100/10017/targets-sv1-dark-10017.csv"),
        &[(1003, 150.3, 2.4)],
    );
}

fn config(data: &Path, out: &Path, program: &str) -> RunConfig {
    RunConfig::new(data.to_path_buf(), out.to_path_buf(), "daily")
        .with_mode(LayoutMode::Healpix)
        .with_fetch_program(program)
}

#[tokio::test]
async fn test_run_fetches_every_item_once() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed_tree(data.path());

    let config = config(data.path(), out.path(), "true")
        .with_ranks(2)
        .with_jobs(2);
    let groups = discover(&config).unwrap();
    let summaries = Runner::new(config).run(groups).await.unwrap();

    assert_eq!(summaries.len(), 2);
    let completed: usize = summaries.iter().map(|s| s.completed).sum();
    let failed: usize = summaries.iter().map(|s| s.failed).sum();
    assert_eq!(completed, 3);
    assert_eq!(failed, 0);
    assert_eq!(summaries[0].rank, 0);
    assert_eq!(summaries[1].rank, 1);
}

#[tokio::test]
async fn test_item_failures_do_not_abort_the_run() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed_tree(data.path());

    let config = config(data.path(), out.path(), "false").with_ranks(2);
    let groups = discover(&config).unwrap();
    let summaries = Runner::new(config).run(groups).await.unwrap();

    // Every fetch fails; the run still completes the barrier cleanly.
    let completed: usize = summaries.iter().map(|s| s.completed).sum();
    let failed: usize = summaries.iter().map(|s| s.failed).sum();
    assert_eq!(completed, 0);
    assert_eq!(failed, 3);
}

#[tokio::test]
async fn test_more_ranks_than_groups_leaves_idle_ranks() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed_tree(data.path());

    let config = config(data.path(), out.path(), "true").with_ranks(5);
    let groups = discover(&config).unwrap();
    let summaries = Runner::new(config).run(groups).await.unwrap();

    assert_eq!(summaries.len(), 5);
    let completed: usize = summaries.iter().map(|s| s.completed).sum();
    assert_eq!(completed, 3);
    assert!(summaries.iter().filter(|s| s.groups == 0).count() >= 3);
}

#[test]
fn test_plan_report_totals() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    seed_tree(data.path());

    let config = config(data.path(), out.path(), "true");
    let groups = discover(&config).unwrap();
    let report = plan_report(&groups, 2).unwrap();

    assert_eq!(report.len(), 2);
    let groups_total: usize = report.iter().map(|r| r.groups).sum();
    let items_total: usize = report.iter().map(|r| r.items).sum();
    assert_eq!(groups_total, 2);
    assert_eq!(items_total, 3);
}
