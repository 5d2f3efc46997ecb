use crate::aggregate::{monthly_counts, monthly_means};
use crate::config::{ObservationSource, PeriodSource, PipelineConfig, StationSource};
use crate::error::Result;
use crate::grid::{MonthGrid, Window};
use crate::loader::{load_table, RawTable};
use crate::merge::{merge_monthly, MergeSource};
use crate::normalize::{
    normalize_periods, normalize_point_events, normalize_station_monthly, NormalizeReport,
    PeriodParams, PointEventParams, StationParams,
};
use crate::types::{FillPolicy, MergedTable};
use log::info;

/// Result of one batch pass.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub window: Window,
    pub grid: MonthGrid,
    pub merged: MergedTable,
    pub reports: Vec<NormalizeReport>,
}

impl PipelineOutput {
    /// Sources that produced no usable rows at all.
    pub fn empty_sources(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.kept_rows == 0)
            .map(|r| r.source.as_str())
            .collect()
    }
}

/// A configured source whose file has already been read.
#[derive(Debug, Clone, Copy)]
pub enum SourceRef<'a> {
    Observation(&'a ObservationSource),
    Period(&'a PeriodSource),
    Station(&'a StationSource),
}

impl SourceRef<'_> {
    fn column(&self) -> &str {
        match self {
            SourceRef::Observation(s) => &s.column,
            SourceRef::Period(s) => &s.column,
            SourceRef::Station(s) => &s.column,
        }
    }
}

/// Sources in a fixed order: observations, periods, stations, each in
/// file order. Merged columns follow the same order.
pub fn sources(config: &PipelineConfig) -> Vec<SourceRef<'_>> {
    config
        .observations
        .iter()
        .map(SourceRef::Observation)
        .chain(config.periods.iter().map(SourceRef::Period))
        .chain(config.stations.iter().map(SourceRef::Station))
        .collect()
}

/// Normalize and aggregate one source into a mergeable monthly column.
pub fn prepare_source(
    source: SourceRef<'_>,
    table: &RawTable,
    window: &Window,
) -> Result<(MergeSource, NormalizeReport)> {
    match source {
        SourceRef::Observation(s) => {
            let params = PointEventParams {
                timestamp_column: &s.timestamp_column,
                category_column: &s.category_column,
                category: s.category.as_deref(),
            };
            let (rows, report) = normalize_point_events(table, &params, window)?;
            let series = monthly_counts(&rows, &s.column);
            Ok((MergeSource::new(series, s.policy.unwrap_or(FillPolicy::Count)), report))
        }
        SourceRef::Period(s) => {
            let params = PeriodParams {
                label_column: &s.label_column,
                start_column: &s.start_column,
                value_column: &s.value_column,
            };
            let (rows, report) = normalize_periods(table, &params, window)?;
            let series = monthly_means(&rows, &s.column);
            let policy = s.policy.unwrap_or(FillPolicy::Measurement);
            Ok((MergeSource::new(series, policy), report))
        }
        SourceRef::Station(s) => {
            let params = StationParams {
                date_column: &s.date_column,
                station_column: &s.station_column,
                station: &s.station,
                value_column: &s.value_column,
            };
            let (rows, report) = normalize_station_monthly(table, &params, window)?;
            let series = monthly_means(&rows, &s.column);
            let policy = s.policy.unwrap_or(FillPolicy::Measurement);
            Ok((MergeSource::new(series, policy), report))
        }
    }
}

/// Normalize, aggregate and merge already-loaded tables.
///
/// `tables` pairs each configured source with its raw table; nothing here
/// touches the filesystem.
pub fn run_with_tables(
    window: Window,
    tables: &[(SourceRef<'_>, RawTable)],
) -> Result<PipelineOutput> {
    let grid = MonthGrid::build(&window);
    let mut merge_sources = Vec::with_capacity(tables.len());
    let mut reports = Vec::with_capacity(tables.len());
    for (source, table) in tables {
        let (merge_source, report) = prepare_source(*source, table, &window)?;
        info!(
            "{} -> '{}': {} of {} rows kept, {} month(s)",
            report.source,
            source.column(),
            report.kept_rows,
            report.total_rows,
            merge_source.series.rows.len()
        );
        merge_sources.push(merge_source);
        reports.push(report);
    }
    let merged = merge_monthly(&grid, merge_sources)?;
    Ok(PipelineOutput {
        window,
        grid,
        merged,
        reports,
    })
}

/// Load every configured file and run the whole pipeline.
pub fn run(config: &PipelineConfig) -> Result<PipelineOutput> {
    let window = config.window()?;
    info!(
        "running pipeline for {} to {}",
        window.start.date(),
        window.end.date()
    );
    let mut tables = Vec::new();
    for source in sources(config) {
        let (path, delimiter) = match source {
            SourceRef::Observation(s) => (&s.path, s.delimiter),
            SourceRef::Period(s) => (&s.path, s.delimiter),
            SourceRef::Station(s) => (&s.path, s.delimiter),
        };
        // Validated as ASCII when the config was parsed.
        let table = load_table(path, delimiter as u8)?;
        tables.push((source, table));
    }
    run_with_tables(window, &tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::loader::read_table;

    const CONFIG: &str = r#"
        [window]
        start = "2017-01-01"
        end = "2017-02-28"

        [[observations]]
        column = "spider_count"
        path = "spiders.csv"
        category = "Arachnida"

        [[periods]]
        column = "aqi_mean"
        path = "aq.csv"
    "#;

    fn table(text: &str, name: &str) -> RawTable {
        read_table(text.as_bytes(), name, b',').unwrap()
    }

    #[test]
    fn arachnida_scenario_end_to_end() {
        let config = PipelineConfig::from_str(CONFIG).unwrap();
        let srcs = sources(&config);
        let tables = vec![
            (
                srcs[0],
                table(
                    "observed_on,iconic_taxon_name\n2017-01-15,Arachnida\n2017-01-20,Arachnida\n2017-02-03,Arachnida\n",
                    "spiders.csv",
                ),
            ),
            (
                srcs[1],
                table("Time Period,Start_Date,Data Value\nWinter 2016-17,12/01/2016,9.0\n", "aq.csv"),
            ),
        ];
        let out = run_with_tables(config.window().unwrap(), &tables).unwrap();
        assert_eq!(out.grid.len(), 2);
        assert_eq!(out.merged.counts("spider_count").unwrap(), vec![2, 1]);
        assert_eq!(out.merged.values("aqi_mean").unwrap(), vec![Some(9.0), Some(9.0)]);
        assert!(out.empty_sources().is_empty());
    }

    #[test]
    fn empty_source_is_reported_not_fatal() {
        let config = PipelineConfig::from_str(CONFIG).unwrap();
        let srcs = sources(&config);
        let tables = vec![
            (srcs[0], table("observed_on,iconic_taxon_name\n", "spiders.csv")),
            (srcs[1], table("Time Period,Start_Date,Data Value\n", "aq.csv")),
        ];
        let out = run_with_tables(config.window().unwrap(), &tables).unwrap();
        assert_eq!(out.merged.counts("spider_count").unwrap(), vec![0, 0]);
        assert_eq!(out.merged.values("aqi_mean").unwrap(), vec![None, None]);
        assert_eq!(out.empty_sources(), vec!["spiders.csv", "aq.csv"]);
    }

    #[test]
    fn schema_error_aborts_the_run() {
        let config = PipelineConfig::from_str(CONFIG).unwrap();
        let srcs = sources(&config);
        let tables = vec![(srcs[0], table("observed_on\n2017-01-15\n", "spiders.csv"))];
        let err = run_with_tables(config.window().unwrap(), &tables).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { ref source_name, .. } if source_name == "spiders.csv"));
    }
}
