//! Filesystem discovery of cutout work.
//!
//! Scans the metadata tree for the selected layout mode, reads each matching
//! target table, derives every target's output path, and drops targets whose
//! cutout already exists (unless overwriting). One metadata file becomes one
//! [`WorkGroup`]; groups come back in lexicographic path order so a re-run
//! over the same tree always plans identically.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::{LayoutMode, RunConfig};
use crate::error::{FetchError, Result};
use crate::plan::{WorkGroup, WorkItem};

/// One row of a target metadata table.
#[derive(Debug, Deserialize)]
struct TargetRecord {
    targetid: i64,
    ra: f64,
    dec: f64,
}

/// Discover all remaining work under the configured tree.
///
/// Validates the mode/filter combination first so a malformed invocation
/// fails before any parallel work begins. Finding nothing is not an error;
/// the caller decides what an empty result means.
pub fn discover(config: &RunConfig) -> Result<Vec<WorkGroup>> {
    config.validate()?;

    let mut sources: Vec<PathBuf> = Vec::new();
    for pattern in metadata_patterns(config) {
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) => sources.push(path),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable metadata path"),
            }
        }
    }
    // Fixed discovery order; overlapping filter patterns may double-match.
    sources.sort();
    sources.dedup();

    let mut groups = Vec::with_capacity(sources.len());
    for source in &sources {
        groups.push(read_group(config, source)?);
    }

    let items: usize = groups.iter().map(WorkGroup::weight).sum();
    tracing::info!(
        mode = %config.mode,
        prod = %config.prod,
        groups = groups.len(),
        items,
        "Discovery complete"
    );
    Ok(groups)
}

/// Glob patterns for the metadata files of the selected mode, one per
/// filter combination. An empty filter matches everything.
fn metadata_patterns(config: &RunConfig) -> Vec<String> {
    let root = config.data_root.join(&config.prod).join(config.mode.as_str());
    let root = root.display();

    match config.mode {
        LayoutMode::Healpix => {
            let mut patterns = Vec::new();
            for survey in wildcard(&config.surveys) {
                for program in wildcard(&config.programs) {
                    for pixel in wildcard(&config.pixels) {
                        patterns.push(format!(
                            "{root}/{survey}/{program}/*/{pixel}/targets-{survey}-{program}-{pixel}.csv"
                        ));
                    }
                }
            }
            patterns
        }
        LayoutMode::Cumulative => {
            let mut patterns = Vec::new();
            for tile in wildcard(&config.tiles) {
                for night in wildcard(&config.nights) {
                    patterns.push(format!(
                        "{root}/{tile}/{night}/targets-{tile}-thru{night}.csv"
                    ));
                }
            }
            patterns
        }
        LayoutMode::Pernight => {
            let mut patterns = Vec::new();
            for tile in wildcard(&config.tiles) {
                for night in wildcard(&config.nights) {
                    patterns.push(format!(
                        "{root}/{tile}/{night}/targets-{tile}-{night}.csv"
                    ));
                }
            }
            patterns
        }
        LayoutMode::Perexp => wildcard(&config.tiles)
            .iter()
            .map(|tile| format!("{root}/{tile}/*/targets-{tile}-exp*.csv"))
            .collect(),
    }
}

fn wildcard(filter: &[String]) -> Vec<String> {
    if filter.is_empty() {
        vec!["*".to_string()]
    } else {
        filter.to_vec()
    }
}

/// Read one metadata file into a WorkGroup, filtering out targets whose
/// output cutout already exists when not overwriting.
fn read_group(config: &RunConfig, source: &Path) -> Result<WorkGroup> {
    let out_dir = output_dir(config, source)?;
    let group_key = source.display().to_string();

    let mut reader = csv::Reader::from_path(source)?;
    let mut items = Vec::new();
    for record in reader.deserialize() {
        let rec: TargetRecord = record?;
        let out_path = out_dir.join(format!("cutout-{}.jpg", rec.targetid));
        if !config.overwrite && out_path.is_file() {
            continue;
        }
        items.push(WorkItem {
            targetid: rec.targetid,
            ra: rec.ra,
            dec: rec.dec,
            out_path,
            group_key: group_key.clone(),
        });
    }

    tracing::debug!(source = %group_key, remaining = items.len(), "Read metadata group");
    Ok(WorkGroup::new(source.to_path_buf(), items))
}

/// Mirror the metadata file's directory under the output root.
fn output_dir(config: &RunConfig, source: &Path) -> Result<PathBuf> {
    let base = config.data_root.join(&config.prod);
    let rel = source
        .parent()
        .unwrap_or(source)
        .strip_prefix(&base)
        .map_err(|_| {
            FetchError::Internal(format!(
                "metadata path {} is outside the data root {}",
                source.display(),
                base.display()
            ))
        })?;
    Ok(config.out_root.join(&config.prod).join(rel))
}
