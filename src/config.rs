use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BuildError;

pub const PARAMS_FILE: &str = "pipeline.json";

/// Tunable parameters handed to individual augur steps.
///
/// Every field defaults to the value the build has always used, so a
/// `pipeline.json` only needs to name the fields it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineParams {
    pub group_by: Vec<String>,
    pub sequences_per_group: u32,
    pub coalescent: String,
    pub date_inference: String,
    pub clock_rate: f64,
    pub clock_std_dev: f64,
    pub trait_columns: Vec<String>,
    pub color_by_metadata: Vec<String>,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            group_by: strings(&["country", "year", "month"]),
            sequences_per_group: 2,
            coalescent: "opt".to_string(),
            date_inference: "joint".to_string(),
            clock_rate: 0.0008,
            clock_std_dev: 0.0002,
            trait_columns: strings(&["country", "region", "host", "year"]),
            color_by_metadata: strings(&["country", "region", "host"]),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Everything a build needs, fixed before the first step runs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub results_dir: Utf8PathBuf,
    pub configs_dir: Utf8PathBuf,
    pub threads: usize,
    pub sequences: Utf8PathBuf,
    pub reference: Utf8PathBuf,
    pub metadata: Utf8PathBuf,
    pub lat_longs: Utf8PathBuf,
    pub colors: Utf8PathBuf,
    pub maintainers: Option<String>,
    pub build_url: Option<String>,
    pub title: String,
    pub include_where: Option<String>,
    pub include_strains: Option<Utf8PathBuf>,
    pub auspice_output: Utf8PathBuf,
    pub view: bool,
    pub params: PipelineParams,
}

impl RunConfig {
    pub const DEFAULT_THREADS: usize = 8;
    pub const DEFAULT_TITLE: &'static str = "Nextstrain Analysis";
    pub const DEFAULT_AUSPICE_OUTPUT: &'static str = "auspice/westnile.json";

    pub fn new(
        results_dir: impl Into<Utf8PathBuf>,
        configs_dir: impl Into<Utf8PathBuf>,
        sequences: impl Into<Utf8PathBuf>,
        reference: impl Into<Utf8PathBuf>,
        metadata: impl Into<Utf8PathBuf>,
    ) -> Self {
        let configs_dir = configs_dir.into();
        Self {
            results_dir: results_dir.into(),
            lat_longs: default_lat_longs(&configs_dir),
            colors: default_colors(&configs_dir),
            configs_dir,
            threads: Self::DEFAULT_THREADS,
            sequences: sequences.into(),
            reference: reference.into(),
            metadata: metadata.into(),
            maintainers: None,
            build_url: None,
            title: Self::DEFAULT_TITLE.to_string(),
            include_where: None,
            include_strains: None,
            auspice_output: Utf8PathBuf::from(Self::DEFAULT_AUSPICE_OUTPUT),
            view: false,
            params: PipelineParams::default(),
        }
    }

    pub fn result_path(&self, file_name: &str) -> Utf8PathBuf {
        self.results_dir.join(file_name)
    }

    pub fn auspice_config(&self) -> Utf8PathBuf {
        self.configs_dir.join("auspice_config.json")
    }

    pub fn auspice_dir(&self) -> Utf8PathBuf {
        self.auspice_output
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."))
    }

    pub fn ensure_results_dir(&self) -> Result<(), BuildError> {
        fs::create_dir_all(self.results_dir.as_std_path()).map_err(|err| {
            BuildError::Filesystem(format!("create {}: {err}", self.results_dir))
        })
    }

    /// Returns `false` (after logging a warning) when the config directory is missing.
    pub fn check_configs_dir(&self) -> bool {
        if self.configs_dir.as_std_path().is_dir() {
            return true;
        }
        warn!(
            "config directory {} does not exist; export will fail unless the referenced files exist elsewhere",
            self.configs_dir
        );
        false
    }
}

pub fn default_lat_longs(configs_dir: &Utf8Path) -> Utf8PathBuf {
    configs_dir.join("lat_longs.tsv")
}

pub fn default_colors(configs_dir: &Utf8Path) -> Utf8PathBuf {
    configs_dir.join("colors.tsv")
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `pipeline.json` from the config directory, falling back to defaults
    /// when the file is absent.
    pub fn load_params(configs_dir: &Utf8Path) -> Result<PipelineParams, BuildError> {
        let path = configs_dir.join(PARAMS_FILE);
        if !path.as_std_path().exists() {
            debug!("no {} found, using default step parameters", path);
            return Ok(PipelineParams::default());
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| BuildError::ConfigRead(path.clone().into_std_path_buf()))?;
        Self::parse_params(&content)
    }

    pub fn parse_params(content: &str) -> Result<PipelineParams, BuildError> {
        serde_json::from_str(content).map_err(|err| BuildError::ConfigParse(err.to_string()))
    }
}
