//! TOML configuration for a pipeline run.
//!
//! Everything a run needs is in one explicit [`PipelineConfig`]: the window,
//! the output location and one entry per source file.
//!
//! ```toml
//! [window]
//! start = "2017-01-01"
//! end = "2023-06-01"
//!
//! [[observations]]
//! column = "spider_count"
//! path = "spiders.csv"
//! category = "Arachnida"
//!
//! [[stations]]
//! column = "temp_mean"
//! path = "weather.csv"
//! station = "LAGUARDIA AIRPORT, NY US"
//! ```

use crate::error::{PipelineError, Result};
use crate::grid::Window;
use crate::types::FillPolicy;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub observations: Vec<ObservationSource>,
    #[serde(default)]
    pub periods: Vec<PeriodSource>,
    #[serde(default)]
    pub stations: Vec<StationSource>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowConfig {
    pub start: NaiveDate,
    /// Inclusive; midnight of this day.
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: default_output_dir(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_preview_rows() -> usize {
    3
}

fn default_delimiter() -> char {
    ','
}

/// Sighting export (one row per observation).
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationSource {
    /// Name of the merged column, e.g. `spider_count`.
    pub column: String,
    pub path: PathBuf,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    #[serde(default = "default_category_column")]
    pub category_column: String,
    pub category: Option<String>,
    pub policy: Option<FillPolicy>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_timestamp_column() -> String {
    "observed_on".to_string()
}

fn default_category_column() -> String {
    "iconic_taxon_name".to_string()
}

/// Seasonal/annual environmental readings.
#[derive(Debug, Clone, Deserialize)]
pub struct PeriodSource {
    pub column: String,
    pub path: PathBuf,
    #[serde(default = "default_label_column")]
    pub label_column: String,
    #[serde(default = "default_start_column")]
    pub start_column: String,
    #[serde(default = "default_period_value_column")]
    pub value_column: String,
    pub policy: Option<FillPolicy>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_label_column() -> String {
    "Time Period".to_string()
}

fn default_start_column() -> String {
    "Start_Date".to_string()
}

fn default_period_value_column() -> String {
    "Data Value".to_string()
}

/// Monthly station summaries.
#[derive(Debug, Clone, Deserialize)]
pub struct StationSource {
    pub column: String,
    pub path: PathBuf,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default = "default_station_column")]
    pub station_column: String,
    pub station: String,
    #[serde(default = "default_station_value_column")]
    pub value_column: String,
    pub policy: Option<FillPolicy>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_date_column() -> String {
    "DATE".to_string()
}

fn default_station_column() -> String {
    "NAME".to_string()
}

fn default_station_value_column() -> String {
    "TAVG".to_string()
}

impl PipelineConfig {
    /// Load from a TOML file. Relative source and output paths are resolved
    /// against the directory holding the config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn window(&self) -> Result<Window> {
        Window::from_dates(self.window.start, self.window.end)
    }

    fn validate(&self) -> Result<()> {
        self.window()?;
        let delimiters = self
            .observations
            .iter()
            .map(|s| (&s.column, s.delimiter))
            .chain(self.periods.iter().map(|s| (&s.column, s.delimiter)))
            .chain(self.stations.iter().map(|s| (&s.column, s.delimiter)));
        for (column, delimiter) in delimiters {
            if !delimiter.is_ascii() {
                return Err(PipelineError::Config(format!(
                    "source '{column}': delimiter must be a single ASCII character"
                )));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.observations.iter_mut().for_each(|s| resolve(&mut s.path));
        self.periods.iter_mut().for_each(|s| resolve(&mut s.path));
        self.stations.iter_mut().for_each(|s| resolve(&mut s.path));
        resolve(&mut self.output.directory);
    }
}
