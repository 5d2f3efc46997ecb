// Left join of the monthly grid against every normalized source.
use crate::error::{PipelineError, Result};
use crate::grid::{MonthGrid, MonthKey};
use crate::types::{Cell, ColumnSpec, FillPolicy, MergedRow, MergedTable, MonthlySeries, Season};
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// A monthly series plus the fill policy for months it does not cover.
#[derive(Debug, Clone)]
pub struct MergeSource {
    pub series: MonthlySeries,
    pub policy: FillPolicy,
}

impl MergeSource {
    pub fn new(series: MonthlySeries, policy: FillPolicy) -> Self {
        MergeSource { series, policy }
    }

    pub fn count(series: MonthlySeries) -> Self {
        MergeSource::new(series, FillPolicy::Count)
    }

    pub fn measurement(series: MonthlySeries) -> Self {
        MergeSource::new(series, FillPolicy::Measurement)
    }
}

fn index_source(source: &MergeSource) -> Result<HashMap<MonthKey, f64>> {
    let column = &source.series.column;
    let mut index = HashMap::with_capacity(source.series.rows.len());
    for row in &source.series.rows {
        let key = row.key;
        if !key.is_consistent() {
            return Err(PipelineError::Consistency {
                column: column.clone(),
                year: key.year,
                month: key.month,
                month_start: key.month_start,
            });
        }
        if index.insert(key, row.value).is_some() {
            return Err(PipelineError::MergeIntegrity(format!(
                "column '{}' has more than one row for {}",
                column, key.month_start
            )));
        }
    }
    Ok(index)
}

fn fill(policy: FillPolicy, column: &str, key: &MonthKey, value: Option<f64>) -> Result<Cell> {
    match policy {
        FillPolicy::Measurement => Ok(Cell::Measurement(value)),
        FillPolicy::Count => {
            let v = value.unwrap_or(0.0);
            if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
                return Err(PipelineError::MergeIntegrity(format!(
                    "count column '{}' has non-integer value {} for {}",
                    column, v, key.month_start
                )));
            }
            Ok(Cell::Count(v as u64))
        }
    }
}

/// Join every source onto the grid on `(year, month, month_start)`.
///
/// The result has exactly one row per grid month, ascending. Count columns
/// are zero-filled; measurement columns stay absent where unmatched.
pub fn merge_monthly(grid: &MonthGrid, sources: Vec<MergeSource>) -> Result<MergedTable> {
    let mut seen = HashSet::new();
    let duplicates: Vec<String> = sources
        .iter()
        .filter(|s| !seen.insert(s.series.column.as_str()))
        .map(|s| s.series.column.clone())
        .collect();
    if !duplicates.is_empty() {
        return Err(PipelineError::schema("merge (duplicate column)", duplicates));
    }

    let indexes: Vec<HashMap<MonthKey, f64>> =
        sources.iter().map(index_source).collect::<Result<_>>()?;

    let grid_keys: HashSet<&MonthKey> = grid.months().iter().collect();
    for (source, index) in sources.iter().zip(&indexes) {
        let outside = index.keys().filter(|k| !grid_keys.contains(k)).count();
        if outside > 0 {
            debug!(
                "column '{}': {} month(s) outside the grid ignored",
                source.series.column, outside
            );
        }
    }

    let mut rows = Vec::with_capacity(grid.len());
    for key in grid.months() {
        let cells = sources
            .iter()
            .zip(&indexes)
            .map(|(source, index)| {
                fill(source.policy, &source.series.column, key, index.get(key).copied())
            })
            .collect::<Result<Vec<Cell>>>()?;
        rows.push(MergedRow {
            key: *key,
            season: Season::from_month(key.month),
            cells,
        });
    }
    rows.sort_by_key(|r| r.key.month_start);

    let table = MergedTable {
        columns: sources
            .iter()
            .map(|s| ColumnSpec {
                name: s.series.column.clone(),
                policy: s.policy,
            })
            .collect(),
        rows,
    };
    validate_against_grid(&table, grid)?;
    info!(
        "merged {} column(s) onto {} months",
        table.columns.len(),
        table.rows.len()
    );
    Ok(table)
}

/// One row per grid month, same order, no duplicates.
pub fn validate_against_grid(table: &MergedTable, grid: &MonthGrid) -> Result<()> {
    if table.rows.len() != grid.len() {
        return Err(PipelineError::MergeIntegrity(format!(
            "expected {} monthly rows, found {}",
            grid.len(),
            table.rows.len()
        )));
    }
    for (row, key) in table.rows.iter().zip(grid.months()) {
        if row.key != *key {
            return Err(PipelineError::MergeIntegrity(format!(
                "row for {} found where {} was expected",
                row.key.month_start, key.month_start
            )));
        }
        if row.cells.len() != table.columns.len() {
            return Err(PipelineError::MergeIntegrity(format!(
                "row for {} has {} cells for {} columns",
                row.key.month_start,
                row.cells.len(),
                table.columns.len()
            )));
        }
    }
    Ok(())
}
