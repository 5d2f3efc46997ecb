use crate::error::{PipelineError, Result};
use crate::grid::MonthKey;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One sighting after timestamp parsing and window filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub observed_at: NaiveDateTime,
    pub taxon_category: Option<String>,
    pub key: MonthKey,
}

/// A reading attached to a month: an expanded period row or a station row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyReading {
    pub key: MonthKey,
    pub value: f64,
}

/// Report type of an environmental period row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKind {
    Winter,
    Summer,
    Annual,
}

impl PeriodKind {
    /// Substring match in the order Winter, Summer, Annual; first hit wins.
    ///
    /// `"Non-Winter"` therefore counts as Winter. Labels matching nothing
    /// return `None` and are skipped by the caller.
    pub fn from_label(label: &str) -> Option<PeriodKind> {
        if label.contains("Winter") {
            Some(PeriodKind::Winter)
        } else if label.contains("Summer") {
            Some(PeriodKind::Summer)
        } else if label.contains("Annual") {
            Some(PeriodKind::Annual)
        } else {
            None
        }
    }
}

/// Ordered season category. `Fall` deliberately absorbs December.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Season {
    Winter,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 3] = [Season::Winter, Season::Summer, Season::Fall];

    pub fn from_month(month: u32) -> Option<Season> {
        match month {
            1..=3 => Some(Season::Winter),
            4..=8 => Some(Season::Summer),
            9..=12 => Some(Season::Fall),
            _ => None,
        }
    }

    pub fn months(self) -> &'static [u32] {
        match self {
            Season::Winter => &[1, 2, 3],
            Season::Summer => &[4, 5, 6, 7, 8],
            Season::Fall => &[9, 10, 11, 12],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a merged column is filled for months with no matching source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillPolicy {
    /// Observation-derived counts: zero-filled, integer.
    Count,
    /// Environmental averages: left absent.
    Measurement,
}

/// One aggregated value per observed month under a caller-chosen name.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySeries {
    pub column: String,
    pub rows: Vec<MonthlyReading>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Count(u64),
    Measurement(Option<f64>),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Count(n) => Some(*n as f64),
            Cell::Measurement(v) => *v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub policy: FillPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub key: MonthKey,
    pub season: Option<Season>,
    pub cells: Vec<Cell>,
}

/// The grid extended with one column per source; one row per month.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<MergedRow>,
}

impl MergedTable {
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| PipelineError::schema("merged table", [name]))
    }

    pub fn column_spec(&self, name: &str) -> Result<&ColumnSpec> {
        Ok(&self.columns[self.column_index(name)?])
    }

    /// Values of a count column; errors if the column is missing or is not
    /// a count column.
    pub fn counts(&self, name: &str) -> Result<Vec<u64>> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .map(|r| match r.cells[idx] {
                Cell::Count(n) => Ok(n),
                Cell::Measurement(_) => Err(PipelineError::schema(
                    "merged table",
                    [format!("{name} (count)")],
                )),
            })
            .collect()
    }

    pub fn values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r.cells[idx].as_f64()).collect())
    }

    /// Fill the season column from the month where it is not set yet.
    /// Rows that already carry a season keep it, so this is idempotent.
    pub fn with_seasons(mut self) -> Self {
        for row in &mut self.rows {
            if row.season.is_none() {
                row.season = Season::from_month(row.key.month);
            }
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SeasonKey {
    pub year: i32,
    pub season: Season,
}

/// Re-aggregation of monthly values by `(year, season)` or by year.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedTable<K> {
    pub columns: Vec<String>,
    pub rows: Vec<(K, Vec<Option<f64>>)>,
}

pub type SeasonalTable = GroupedTable<SeasonKey>;
pub type AnnualTable = GroupedTable<i32>;

impl<K> GroupedTable<K> {
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PipelineError::schema("grouped table", [name]))?;
        Ok(self.rows.iter().map(|(_, v)| v[idx]).collect())
    }

    pub fn keys(&self) -> Vec<&K> {
        self.rows.iter().map(|(k, _)| k).collect()
    }
}
