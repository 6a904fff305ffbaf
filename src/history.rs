//! Reads day logs back into status records for the chart endpoint.
//!
//! A day's log is small (one line per tick), so it is read and parsed in
//! full. Parsing is strict: one malformed line fails the whole read.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::domain::StatusRecord;
use crate::error::{FridgeError, Result};
use crate::recorder::day_log_path;

#[derive(Debug, Clone)]
pub struct HistoryReader {
    dir: PathBuf,
}

impl HistoryReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `YYYY-MM-DD` into a day, rejecting anything else before it can reach the filesystem
    pub fn parse_day(raw: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .filter(|day| day.format("%Y-%m-%d").to_string() == raw)
            .ok_or_else(|| FridgeError::Validation(format!("{raw:?} is not a YYYY-MM-DD day")))
    }

    /// all records logged for `day`, in file order
    ///
    /// `NotFound` when the day has no log.
    pub fn read_day(&self, day: NaiveDate) -> Result<Vec<StatusRecord>> {
        let path = day_log_path(&self.dir, day);
        let contents = std::fs::read_to_string(&path).map_err(|e| FridgeError::from_io(&path, e))?;

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                StatusRecord::from_csv_line(line.trim_end())
                    .map_err(|reason| FridgeError::corrupt(&path, format!("line {}: {reason}", index + 1)))
            })
            .collect()
    }

    /// like `read_day`, but a day without a log is just an empty day
    pub fn read_day_or_empty(&self, day: NaiveDate) -> Result<Vec<StatusRecord>> {
        match self.read_day(day) {
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }
}
