// Month arithmetic and the canonical monthly grid.
//
// Every other module goes through the helpers here when it needs to know
// which month a date belongs to, so there is exactly one definition of
// "first day of the month" in the crate.
use crate::error::{PipelineError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Truncate a date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    // Day 1 exists for every valid (year, month), so this cannot fail.
    date.with_day(1).unwrap_or(date)
}

/// Month start `n` months after the month containing `date`.
pub fn add_months(date: NaiveDate, n: u32) -> NaiveDate {
    let idx = month_index(date.year(), date.month()) + n as i64;
    from_month_index(idx)
}

/// Months since year 0, so consecutive months differ by exactly one.
pub fn month_index(year: i32, month: u32) -> i64 {
    year as i64 * 12 + (month as i64 - 1)
}

fn from_month_index(idx: i64) -> NaiveDate {
    let year = idx.div_euclid(12) as i32;
    let month = idx.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// The `(year, month, month_start)` join key shared by every monthly table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
    pub month_start: NaiveDate,
}

impl MonthKey {
    /// Key of the month that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
            month_start: month_start(date),
        }
    }

    /// Whether `month_start` really is the first day of `year`/`month`.
    pub fn is_consistent(&self) -> bool {
        self.month_start.day() == 1
            && self.month_start.year() == self.year
            && self.month_start.month() == self.month
    }
}

/// Inclusive analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(PipelineError::InvalidWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Window { start, end })
    }

    /// Window spanning midnight of `start` to midnight of `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Window::new(start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// First and last month touched by the window.
    pub fn month_bounds(&self) -> (MonthKey, MonthKey) {
        (
            MonthKey::containing(self.start.date()),
            MonthKey::containing(self.end.date()),
        )
    }

    /// Whether `key` is one of the months the grid for this window spans.
    pub fn contains_month(&self, key: &MonthKey) -> bool {
        let (first, last) = self.month_bounds();
        (first.month_start..=last.month_start).contains(&key.month_start)
    }
}

/// Gap-free ascending sequence of months spanning a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    months: Vec<MonthKey>,
}

impl MonthGrid {
    pub fn build(window: &Window) -> Self {
        let (first, last) = window.month_bounds();
        let span = month_index(last.year, last.month) - month_index(first.year, first.month);
        let months = (0..=span)
            .map(|n| MonthKey::containing(add_months(first.month_start, n as u32)))
            .collect();
        MonthGrid { months }
    }

    pub fn months(&self) -> &[MonthKey] {
        &self.months
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }
}
