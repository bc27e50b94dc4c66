use std::path::PathBuf;

use crate::error::{FetchError, Result};

/// How the metadata tree under `<data-root>/<prod>` is laid out.
///
/// The mode decides which directory convention discovery globs over and
/// which filters are meaningful:
/// - `Healpix`: grouped by survey/program/healpix pixel
/// - `Cumulative`: per tile, coadded through a last night
/// - `Pernight`: per tile and night
/// - `Perexp`: per tile and exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Healpix,
    Cumulative,
    Pernight,
    Perexp,
}

impl LayoutMode {
    /// Directory name of this mode inside the production tree.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMode::Healpix => "healpix",
            LayoutMode::Cumulative => "cumulative",
            LayoutMode::Pernight => "pernight",
            LayoutMode::Perexp => "perexp",
        }
    }
}

impl std::fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for one planning-and-fetch run.
///
/// Built once from the CLI and passed explicitly into discovery, planning,
/// and execution; nothing reads the environment at call sites.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root of the metadata tree (contains `<prod>/<mode>/...`)
    pub data_root: PathBuf,
    /// Root of the cutout output tree (mirrors the metadata layout)
    pub out_root: PathBuf,
    /// Production / data release tag
    pub prod: String,
    /// Metadata layout mode
    pub mode: LayoutMode,
    /// Survey filter (healpix mode only; empty = all)
    pub surveys: Vec<String>,
    /// Program filter (healpix mode only; empty = all)
    pub programs: Vec<String>,
    /// Healpix pixel filter (healpix mode only; empty = all)
    pub pixels: Vec<String>,
    /// Tile filter (tile-based modes only; empty = all)
    pub tiles: Vec<String>,
    /// Night filter (cumulative/pernight only; empty = all)
    pub nights: Vec<String>,
    /// Number of parallel worker ranks the plan is split across
    pub ranks: usize,
    /// Concurrent fetches per rank
    pub jobs: usize,
    /// Cutout size in pixels, passed to the fetch program
    pub cutout_size: u32,
    /// External program invoked once per cutout
    pub fetch_program: String,
    /// Refetch cutouts whose output files already exist
    pub overwrite: bool,
    /// Print fetch commands without executing them
    pub dry_run: bool,
    /// Print the per-rank plan and exit without fetching
    pub plan_only: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            out_root: PathBuf::from("."),
            prod: "daily".to_string(),
            mode: LayoutMode::Healpix,
            surveys: Vec::new(),
            programs: Vec::new(),
            pixels: Vec::new(),
            tiles: Vec::new(),
            nights: Vec::new(),
            ranks: 1,
            jobs: 4,
            cutout_size: 256,
            fetch_program: "cutout".to_string(),
            overwrite: false,
            dry_run: false,
            plan_only: false,
        }
    }
}

impl RunConfig {
    pub fn new(data_root: PathBuf, out_root: PathBuf, prod: impl Into<String>) -> Self {
        Self {
            data_root,
            out_root,
            prod: prod.into(),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: LayoutMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ranks(mut self, ranks: usize) -> Self {
        self.ranks = ranks;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_fetch_program(mut self, program: impl Into<String>) -> Self {
        self.fetch_program = program.into();
        self
    }

    /// Reject malformed mode/filter combinations before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.ranks == 0 {
            return Err(FetchError::InvalidArgument(
                "rank count must be at least 1".to_string(),
            ));
        }
        if self.jobs == 0 {
            return Err(FetchError::InvalidArgument(
                "per-rank job count must be at least 1".to_string(),
            ));
        }
        match self.mode {
            LayoutMode::Healpix => {
                if !self.tiles.is_empty() || !self.nights.is_empty() {
                    return Err(FetchError::InvalidArgument(format!(
                        "--tile/--night do not apply to {} mode",
                        self.mode
                    )));
                }
            }
            LayoutMode::Cumulative | LayoutMode::Pernight | LayoutMode::Perexp => {
                if !self.surveys.is_empty() || !self.programs.is_empty() || !self.pixels.is_empty()
                {
                    return Err(FetchError::InvalidArgument(format!(
                        "--survey/--program/--healpix do not apply to {} mode",
                        self.mode
                    )));
                }
                if self.mode == LayoutMode::Perexp && !self.nights.is_empty() {
                    return Err(FetchError::InvalidArgument(
                        "--night does not apply to perexp mode".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_config_default() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.prod, "daily");
        assert_eq!(cfg.mode, LayoutMode::Healpix);
        assert_eq!(cfg.ranks, 1);
        assert_eq!(cfg.jobs, 4);
        assert_eq!(cfg.cutout_size, 256);
        assert!(!cfg.overwrite);
        assert!(!cfg.dry_run);
        assert!(!cfg.plan_only);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn run_config_builders() {
        let cfg = RunConfig::new(PathBuf::from("/data"), PathBuf::from("/out"), "fuji")
            .with_mode(LayoutMode::Cumulative)
            .with_ranks(8)
            .with_jobs(16)
            .with_overwrite(true)
            .with_fetch_program("curl-cutout");
        assert_eq!(cfg.data_root, PathBuf::from("/data"));
        assert_eq!(cfg.out_root, PathBuf::from("/out"));
        assert_eq!(cfg.prod, "fuji");
        assert_eq!(cfg.mode, LayoutMode::Cumulative);
        assert_eq!(cfg.ranks, 8);
        assert_eq!(cfg.jobs, 16);
        assert!(cfg.overwrite);
        assert_eq!(cfg.fetch_program, "curl-cutout");
    }

    #[test]
    fn layout_mode_names() {
        assert_eq!(LayoutMode::Healpix.as_str(), "healpix");
        assert_eq!(LayoutMode::Cumulative.as_str(), "cumulative");
        assert_eq!(LayoutMode::Pernight.as_str(), "pernight");
        assert_eq!(LayoutMode::Perexp.as_str(), "perexp");
        assert_eq!(LayoutMode::Perexp.to_string(), "perexp");
    }

    #[test]
    fn validate_rejects_zero_ranks() {
        let cfg = RunConfig::default().with_ranks(0);
        assert!(matches!(
            cfg.validate(),
            Err(FetchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_jobs() {
        let cfg = RunConfig::default().with_jobs(0);
        assert!(matches!(
            cfg.validate(),
            Err(FetchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_rejects_tile_filter_in_healpix_mode() {
        let mut cfg = RunConfig::default();
        cfg.tiles.push("80605".to_string());
        assert!(matches!(
            cfg.validate(),
            Err(FetchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_rejects_survey_filter_in_tile_modes() {
        let mut cfg = RunConfig::default().with_mode(LayoutMode::Pernight);
        cfg.surveys.push("sv1".to_string());
        assert!(matches!(
            cfg.validate(),
            Err(FetchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_rejects_night_filter_in_perexp_mode() {
        let mut cfg = RunConfig::default().with_mode(LayoutMode::Perexp);
        cfg.nights.push("20210403".to_string());
        assert!(matches!(
            cfg.validate(),
            Err(FetchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_accepts_matching_filters() {
        let mut cfg = RunConfig::default().with_mode(LayoutMode::Cumulative);
        cfg.tiles.push("80605".to_string());
        cfg.nights.push("20210403".to_string());
        assert!(cfg.validate().is_ok());

        let mut cfg = RunConfig::default();
        cfg.surveys.push("sv1".to_string());
        cfg.programs.push("dark".to_string());
        cfg.pixels.push("10016".to_string());
        assert!(cfg.validate().is_ok());
    }
}
