// Source normalizers: raw text tables in, month-keyed rows out.
//
// Three variants cover every source in the study:
// - point events (observations), counted later;
// - period readings (Winter/Summer/Annual air quality), expanded to months;
// - station-monthly readings (weather), filtered to one station.
//
// None of them aggregate. Row-level parse failures drop the row and are
// counted in the returned `NormalizeReport`.
use crate::error::Result;
use crate::grid::{add_months, month_start, MonthKey, Window};
use crate::loader::{field, RawTable};
use crate::types::{MonthlyReading, Observation, PeriodKind};
use crate::util::{parse_f64_safe, parse_timestamp_safe};
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub source: String,
    pub total_rows: usize,
    /// Rows dropped because a timestamp or number did not parse.
    pub parse_errors: usize,
    /// Rows (or expanded months) removed by a category, station or window filter.
    pub filtered_out: usize,
    /// Period rows whose label is not Winter, Summer or Annual.
    pub unknown_labels: usize,
    pub kept_rows: usize,
}

impl NormalizeReport {
    fn new(table: &RawTable) -> Self {
        NormalizeReport {
            source: table.source.clone(),
            total_rows: table.len(),
            ..Default::default()
        }
    }

    fn finish(mut self, kept: usize) -> Self {
        self.kept_rows = kept;
        if kept == 0 {
            warn!(
                "{}: no usable rows ({} read, {} unparsable, {} filtered)",
                self.source, self.total_rows, self.parse_errors, self.filtered_out
            );
        } else {
            debug!("{}: kept {} of {} rows", self.source, kept, self.total_rows);
        }
        self
    }
}

/// Column names and filter for an observation file.
#[derive(Debug, Clone, Copy)]
pub struct PointEventParams<'a> {
    pub timestamp_column: &'a str,
    pub category_column: &'a str,
    pub category: Option<&'a str>,
}

pub fn normalize_point_events(
    table: &RawTable,
    params: &PointEventParams<'_>,
    window: &Window,
) -> Result<(Vec<Observation>, NormalizeReport)> {
    let ts_idx = table.require_column(params.timestamp_column)?;
    // The category column is only required when a filter asks for it.
    let cat_idx = match params.category {
        Some(_) => Some(table.require_column(params.category_column)?),
        None => table.find_column(params.category_column),
    };

    let mut report = NormalizeReport::new(table);
    let mut out = Vec::new();
    for row in table.rows() {
        let category = cat_idx.and_then(|i| field(row, i)).map(str::to_string);
        if let Some(wanted) = params.category {
            if category.as_deref() != Some(wanted) {
                report.filtered_out += 1;
                continue;
            }
        }
        let Some(observed_at) = parse_timestamp_safe(field(row, ts_idx)) else {
            report.parse_errors += 1;
            continue;
        };
        if !window.contains(observed_at) {
            report.filtered_out += 1;
            continue;
        }
        out.push(Observation {
            observed_at,
            taxon_category: category,
            key: MonthKey::containing(observed_at.date()),
        });
    }
    let report = report.finish(out.len());
    Ok((out, report))
}

#[derive(Debug, Clone, Copy)]
pub struct PeriodParams<'a> {
    pub label_column: &'a str,
    pub start_column: &'a str,
    pub value_column: &'a str,
}

/// Month starts covered by one period record.
pub fn expand_period(kind: PeriodKind, period_start: NaiveDate) -> Vec<NaiveDate> {
    match kind {
        PeriodKind::Winter | PeriodKind::Summer => {
            (0..3).map(|n| add_months(period_start, n)).collect()
        }
        PeriodKind::Annual => {
            let january = month_start(period_start.with_month(1).unwrap_or(period_start));
            (0..12).map(|n| add_months(january, n)).collect()
        }
    }
}

pub fn normalize_periods(
    table: &RawTable,
    params: &PeriodParams<'_>,
    window: &Window,
) -> Result<(Vec<MonthlyReading>, NormalizeReport)> {
    let idx = table.require_columns(&[
        params.label_column,
        params.start_column,
        params.value_column,
    ])?;
    let (label_idx, start_idx, value_idx) = (idx[0], idx[1], idx[2]);

    let mut report = NormalizeReport::new(table);
    let mut out = Vec::new();
    for row in table.rows() {
        let Some(start) = parse_timestamp_safe(field(row, start_idx)) else {
            report.parse_errors += 1;
            continue;
        };
        let kind = match PeriodKind::from_label(field(row, label_idx).unwrap_or("")) {
            Some(kind) => kind,
            // Other report types (multi-year averages etc.) are expected in
            // the feed and are skipped, not treated as errors.
            None => {
                report.unknown_labels += 1;
                continue;
            }
        };
        let Some(value) = parse_f64_safe(field(row, value_idx)) else {
            report.parse_errors += 1;
            continue;
        };
        for covered in expand_period(kind, start.date()) {
            let key = MonthKey::containing(covered);
            if !window.contains_month(&key) {
                report.filtered_out += 1;
                continue;
            }
            out.push(MonthlyReading { key, value });
        }
    }
    let report = report.finish(out.len());
    Ok((out, report))
}

#[derive(Debug, Clone, Copy)]
pub struct StationParams<'a> {
    pub date_column: &'a str,
    pub station_column: &'a str,
    pub station: &'a str,
    pub value_column: &'a str,
}

pub fn normalize_station_monthly(
    table: &RawTable,
    params: &StationParams<'_>,
    window: &Window,
) -> Result<(Vec<MonthlyReading>, NormalizeReport)> {
    let idx = table.require_columns(&[
        params.date_column,
        params.station_column,
        params.value_column,
    ])?;
    let (date_idx, station_idx, value_idx) = (idx[0], idx[1], idx[2]);

    let mut report = NormalizeReport::new(table);
    let mut out = Vec::new();
    for row in table.rows() {
        let Some(date) = parse_timestamp_safe(field(row, date_idx)) else {
            report.parse_errors += 1;
            continue;
        };
        let Some(value) = parse_f64_safe(field(row, value_idx)) else {
            report.parse_errors += 1;
            continue;
        };
        if field(row, station_idx) != Some(params.station) {
            report.filtered_out += 1;
            continue;
        }
        let key = MonthKey::containing(date.date());
        if !window.contains_month(&key) {
            report.filtered_out += 1;
            continue;
        }
        out.push(MonthlyReading { key, value });
    }
    let report = report.finish(out.len());
    Ok((out, report))
}
