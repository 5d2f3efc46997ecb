use crate::error::{PipelineError, Result};
use crate::grid::MonthKey;
use crate::types::{
    AnnualTable, FillPolicy, GroupedTable, MergedTable, MonthlyReading, MonthlySeries,
    Observation, Season, SeasonKey, SeasonalTable,
};
use crate::util::average;
use std::collections::BTreeMap;

/// Count observations per `(year, month, month_start)`.
///
/// Only months with at least one observation appear; the merge fills the
/// rest with zero.
pub fn monthly_counts(rows: &[Observation], column: &str) -> MonthlySeries {
    let mut map: BTreeMap<MonthKey, usize> = BTreeMap::new();
    for r in rows {
        *map.entry(r.key).or_default() += 1;
    }
    MonthlySeries {
        column: column.to_string(),
        rows: map
            .into_iter()
            .map(|(key, n)| MonthlyReading { key, value: n as f64 })
            .collect(),
    }
}

/// Mean reading per `(year, month, month_start)`.
pub fn monthly_means(rows: &[MonthlyReading], column: &str) -> MonthlySeries {
    let mut map: BTreeMap<MonthKey, Vec<f64>> = BTreeMap::new();
    for r in rows {
        map.entry(r.key).or_default().push(r.value);
    }
    MonthlySeries {
        column: column.to_string(),
        rows: map
            .into_iter()
            .filter_map(|(key, values)| average(&values).map(|value| MonthlyReading { key, value }))
            .collect(),
    }
}

/// Reduce a group of monthly cells the way the column's policy implies:
/// counts are summed, measurements averaged over the months that have one.
fn reduce(policy: FillPolicy, values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    match policy {
        FillPolicy::Count => Some(present.iter().sum()),
        FillPolicy::Measurement => average(&present),
    }
}

fn group_by<K, F>(
    table: &MergedTable,
    columns: &[&str],
    out_names: Vec<String>,
    key_of: F,
) -> Result<GroupedTable<K>>
where
    K: Ord + Copy,
    F: Fn(&MonthKey, Season) -> K,
{
    // Resolve every column before touching any row.
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|c| table.column_index(c).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::schema("merged table", missing));
    }
    let resolved: Vec<(usize, FillPolicy)> = columns
        .iter()
        .map(|c| {
            let idx = table.column_index(c)?;
            Ok((idx, table.columns[idx].policy))
        })
        .collect::<Result<_>>()?;

    let mut groups: BTreeMap<K, Vec<Vec<Option<f64>>>> = BTreeMap::new();
    for row in &table.rows {
        let season = match row.season.or_else(|| Season::from_month(row.key.month)) {
            Some(s) => s,
            None => {
                return Err(PipelineError::Consistency {
                    column: "month".to_string(),
                    year: row.key.year,
                    month: row.key.month,
                    month_start: row.key.month_start,
                })
            }
        };
        let cells = groups
            .entry(key_of(&row.key, season))
            .or_insert_with(|| vec![Vec::new(); resolved.len()]);
        for (slot, (idx, _)) in cells.iter_mut().zip(&resolved) {
            slot.push(row.cells[*idx].as_f64());
        }
    }

    let rows = groups
        .into_iter()
        .map(|(key, cells)| {
            let values = cells
                .iter()
                .zip(&resolved)
                .map(|(vals, (_, policy))| reduce(*policy, vals))
                .collect();
            (key, values)
        })
        .collect();
    Ok(GroupedTable {
        columns: out_names,
        rows,
    })
}

/// Re-aggregate one merged column by `(year, season)`, sorted by year then
/// season order. The output column defaults to `<column>_season`.
pub fn seasonal_aggregate(
    table: &MergedTable,
    column: &str,
    out_column: Option<&str>,
) -> Result<SeasonalTable> {
    let out = out_column
        .map(str::to_string)
        .unwrap_or_else(|| format!("{column}_season"));
    group_by(table, &[column], vec![out], |key, season| SeasonKey {
        year: key.year,
        season,
    })
}

/// Every merged column re-aggregated by `(year, season)` under its own name.
pub fn seasonal_summary(table: &MergedTable) -> Result<SeasonalTable> {
    let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    let out = names.iter().map(|n| n.to_string()).collect();
    group_by(table, &names, out, |key, season| SeasonKey {
        year: key.year,
        season,
    })
}

/// Every merged column re-aggregated by calendar year.
pub fn annual_summary(table: &MergedTable) -> Result<AnnualTable> {
    let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    let out = names.iter().map(|n| n.to_string()).collect();
    group_by(table, &names, out, |key, _| key.year)
}
