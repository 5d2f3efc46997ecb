// Views offered to the user: which table to build from a merged run.
use crate::aggregate::{annual_summary, seasonal_summary};
use crate::error::Result;
use crate::types::{Cell, MergedTable};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChoice {
    Monthly,
    Seasonal,
    Annual,
}

impl ViewChoice {
    pub const ALL: [ViewChoice; 3] = [ViewChoice::Monthly, ViewChoice::Seasonal, ViewChoice::Annual];

    /// Parse the mode string typed by the user. Case and surrounding
    /// whitespace are ignored.
    pub fn parse(choice: &str) -> Option<ViewChoice> {
        match choice.trim().to_lowercase().as_str() {
            "time_series" | "time series" | "monthly" | "scatter" | "scatter_season" | "1" => Some(ViewChoice::Monthly),
            "seasonal" | "seasonal_bar" | "2" => Some(ViewChoice::Seasonal),
            "annual" | "yearly" | "3" => Some(ViewChoice::Annual),
            _ => None,
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            ViewChoice::Monthly => "monthly",
            ViewChoice::Seasonal => "seasonal",
            ViewChoice::Annual => "annual",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ViewChoice::Monthly => "Monthly Abundance and Environment",
            ViewChoice::Seasonal => "Seasonal Totals and Means",
            ViewChoice::Annual => "Annual Totals and Means",
        }
    }
}

impl fmt::Display for ViewChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// A rendered table: header names plus text cells, empty for absent values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn fmt_value(v: Option<f64>) -> String {
    match v {
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{:.2}", v),
        None => String::new(),
    }
}

fn fmt_cell(cell: &Cell) -> String {
    match cell {
        Cell::Count(n) => n.to_string(),
        Cell::Measurement(v) => fmt_value(*v),
    }
}

pub fn build_view(choice: ViewChoice, table: &MergedTable) -> Result<ViewTable> {
    let names = table.columns.iter().map(|c| c.name.clone());
    match choice {
        ViewChoice::Monthly => {
            let headers: Vec<String> = ["year", "month", "month_start", "season"]
                .into_iter()
                .map(str::to_string)
                .chain(names)
                .collect();
            let rows: Vec<Vec<String>> = table
                .rows
                .iter()
                .map(|r| {
                    let season = r.season.map(|s| s.to_string()).unwrap_or_default();
                    [
                        r.key.year.to_string(),
                        r.key.month.to_string(),
                        r.key.month_start.to_string(),
                        season,
                    ]
                    .into_iter()
                    .chain(r.cells.iter().map(fmt_cell))
                    .collect()
                })
                .collect();
            Ok(ViewTable { headers, rows })
        }
        ViewChoice::Seasonal => {
            let seasonal = seasonal_summary(table)?;
            let headers: Vec<String> = ["year".to_string(), "season".to_string()]
                .into_iter()
                .chain(seasonal.columns.iter().cloned())
                .collect();
            let rows: Vec<Vec<String>> = seasonal
                .rows
                .iter()
                .map(|(k, values)| {
                    [k.year.to_string(), k.season.to_string()]
                        .into_iter()
                        .chain(values.iter().map(|v| fmt_value(*v)))
                        .collect()
                })
                .collect();
            Ok(ViewTable { headers, rows })
        }
        ViewChoice::Annual => {
            let annual = annual_summary(table)?;
            let headers: Vec<String> = std::iter::once("year".to_string())
                .chain(annual.columns.iter().cloned())
                .collect();
            let rows: Vec<Vec<String>> = annual
                .rows
                .iter()
                .map(|(year, values)| {
                    std::iter::once(year.to_string())
                        .chain(values.iter().map(|v| fmt_value(*v)))
                        .collect()
                })
                .collect();
            Ok(ViewTable { headers, rows })
        }
    }
}
