use crate::error::{PipelineError, Result};
use crate::normalize::NormalizeReport;
use crate::pipeline::PipelineOutput;
use crate::types::{FillPolicy, MergedTable};
use crate::util::{average, format_number};
use crate::view::ViewTable;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

pub fn write_csv(path: &Path, table: &ViewTable) -> Result<()> {
    let csv_err = |source: csv::Error| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
    wtr.write_record(&table.headers).map_err(csv_err)?;
    for row in &table.rows {
        wtr.write_record(row).map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Markdown rendering of the first `max_rows` rows.
pub fn render_preview(table: &ViewTable, max_rows: usize) -> Option<String> {
    if table.rows.is_empty() {
        return None;
    }
    let mut builder = Builder::default();
    builder.push_record(table.headers.iter().cloned());
    for row in table.rows.iter().take(max_rows) {
        builder.push_record(row.iter().cloned());
    }
    Some(builder.build().with(Style::markdown()).to_string())
}

pub fn preview_table_rows(table: &ViewTable, max_rows: usize) {
    match render_preview(table, max_rows) {
        Some(s) => println!("{}\n", s),
        None => println!("(no rows)\n"),
    }
}

#[derive(Debug, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub policy: FillPolicy,
    /// Sum over the window; only for count columns.
    pub total: Option<f64>,
    /// Mean over the months that have a value.
    pub mean: Option<f64>,
    pub months_missing: usize,
}

impl ColumnSummary {
    /// One-line "Summary Stats" entry for the console.
    pub fn describe(&self) -> String {
        let stat = |v: Option<f64>| v.map(|v| format_number(v, 2)).unwrap_or_else(|| "n/a".to_string());
        let mut line = format!("{}: mean {}", self.name, stat(self.mean));
        if self.policy == FillPolicy::Count {
            line.push_str(&format!(", total {}", stat(self.total)));
        }
        if self.months_missing > 0 {
            line.push_str(&format!(", {} month(s) missing", self.months_missing));
        }
        line
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub months: usize,
    pub sources: Vec<NormalizeReport>,
    pub columns: Vec<ColumnSummary>,
}

fn column_summaries(table: &MergedTable) -> Vec<ColumnSummary> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            let values: Vec<Option<f64>> = table.rows.iter().map(|r| r.cells[idx].as_f64()).collect();
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            ColumnSummary {
                name: spec.name.clone(),
                policy: spec.policy,
                total: match spec.policy {
                    FillPolicy::Count => Some(present.iter().sum()),
                    FillPolicy::Measurement => None,
                },
                mean: average(&present),
                months_missing: values.len() - present.len(),
            }
        })
        .collect()
}

pub fn generate_summary(output: &PipelineOutput) -> RunSummary {
    RunSummary {
        window_start: output.window.start.date(),
        window_end: output.window.end.date(),
        months: output.grid.len(),
        sources: output.reports.clone(),
        columns: column_summaries(&output.merged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewTable {
        ViewTable {
            headers: vec!["year".into(), "spider_count".into(), "aqi_mean".into()],
            rows: vec![
                vec!["2017".into(), "12".into(), "".into()],
                vec!["2018".into(), "30".into(), "8.10".into()],
            ],
        }
    }

    #[test]
    fn csv_keeps_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annual.csv");
        write_csv(&path, &view()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "year,spider_count,aqi_mean\n2017,12,\n2018,30,8.10\n");
    }

    #[test]
    fn preview_is_markdown_and_truncated() {
        let s = render_preview(&view(), 1).unwrap();
        assert!(s.contains("| year"));
        assert!(s.contains("2017"));
        assert!(!s.contains("2018"));
        let empty = ViewTable { headers: vec!["year".into()], rows: vec![] };
        assert!(render_preview(&empty, 3).is_none());
    }

    #[test]
    fn json_written_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&path, &serde_json::json!({"months": 78})).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["months"], 78);
    }

    #[test]
    fn column_summary_lines_use_thousands_separators() {
        let count = ColumnSummary {
            name: "spider_count".into(),
            policy: FillPolicy::Count,
            total: Some(12345.0),
            mean: Some(158.2692),
            months_missing: 0,
        };
        assert_eq!(count.describe(), "spider_count: mean 158.27, total 12,345.00");

        let measurement = ColumnSummary {
            name: "aqi_mean".into(),
            policy: FillPolicy::Measurement,
            total: None,
            mean: None,
            months_missing: 3,
        };
        assert_eq!(measurement.describe(), "aqi_mean: mean n/a, 3 month(s) missing");
    }
}
