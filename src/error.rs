use chrono::NaiveDate;
use std::path::PathBuf;

/// Errors that abort a pipeline run.
///
/// Row-level parse failures never show up here: they are counted in a
/// `NormalizeReport` and the row is dropped.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A column required by a stage is absent from its input.
    #[error("{source_name}: missing required column(s): {}", columns.join(", "))]
    Schema {
        source_name: String,
        columns: Vec<String>,
    },

    /// A monthly row whose `month_start` does not agree with its year/month.
    #[error(
        "column '{column}': inconsistent month key (year={year}, month={month}, month_start={month_start})"
    )]
    Consistency {
        column: String,
        year: i32,
        month: u32,
        month_start: NaiveDate,
    },

    /// The merged table does not have exactly one row per grid month.
    #[error("merge integrity violated: {0}")]
    MergeIntegrity(String),

    #[error("invalid window: start {start} is after end {end}")]
    InvalidWindow { start: String, end: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl PipelineError {
    pub fn schema<S, I, C>(source_name: S, columns: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        PipelineError::Schema {
            source_name: source_name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
