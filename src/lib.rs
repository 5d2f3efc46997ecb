//! Monthly merge of arthropod sightings with air-quality and weather data.
//!
//! Sources with different native granularities (single observations,
//! seasonal/annual readings, monthly station summaries) are normalized to
//! month-keyed rows, aggregated, and left-joined onto a gap-free monthly grid.
pub mod aggregate;
pub mod config;
pub mod error;
pub mod grid;
pub mod loader;
pub mod merge;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod types;
pub mod util;
pub mod view;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use grid::{MonthGrid, MonthKey, Window};
pub use pipeline::{run, PipelineOutput};
pub use types::{FillPolicy, MergedTable, Season};
