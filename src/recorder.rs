//! ==============================================================================
//! recorder.rs - daily status logs and retention
//! ==============================================================================
//!
//! purpose:
//!     appends one line per tick to the log for the record's calendar day
//!     and prunes logs that have aged out of the retention window.
//!
//! layout:
//!     <log_dir>/2020-04-19.log
//!     <log_dir>/2020-04-20.log
//!     ...
//!
//! ```text
//!     a day log is only ever appended to or deleted whole. no line is
//!     rewritten or removed on its own.
//! ```
//!
//! appends:
//!     each record is one write_all of a complete line on a fresh O_APPEND
//!     handle, taken under the recorder's append lock. the handle is dropped
//!     before record() returns, so no descriptor outlives a tick and a reader
//!     never sees half a line.
//!
//! relationships:
//!     - used by: sampler.rs (record every tick)
//!     - used by: main.rs (retention task)
//!     - read back by: history.rs (same day_log_path)
//!
//! ==============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::{CalendarZone, RetentionConfig, RetentionStrategy};
use crate::domain::StatusRecord;
use crate::error::{FridgeError, Result};

const DAY_FORMAT: &str = "%Y-%m-%d";
const LOG_EXTENSION: &str = "log";

// ==============================================================================
// calendar
// ==============================================================================

impl CalendarZone {
    /// the calendar day `timestamp` falls on
    pub fn day_of(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        match self {
            CalendarZone::Local => timestamp.with_timezone(&Local).date_naive(),
            CalendarZone::Utc => timestamp.date_naive(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.day_of(Utc::now())
    }
}

/// `<dir>/<YYYY-MM-DD>.log`
pub fn day_log_path(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join(format!("{}.{LOG_EXTENSION}", day.format(DAY_FORMAT)))
}

/// the day a log file belongs to, or None for anything that is not a day log
pub fn day_of_log_file(path: &Path) -> Option<NaiveDate> {
    if path.extension()? != LOG_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let day = NaiveDate::parse_from_str(stem, DAY_FORMAT).ok()?;
    // parse_from_str accepts unpadded fields; only claim canonical names
    (day.format(DAY_FORMAT).to_string() == stem).then_some(day)
}

// ==============================================================================
// recorder
// ==============================================================================

#[derive(Debug)]
pub struct Recorder {
    dir: PathBuf,
    calendar: CalendarZone,
    append_lock: Mutex<()>,
}

/// outcome of one retention sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// logs dated on or before this day are out of the window
    pub cutoff: NaiveDate,
    pub deleted: Vec<NaiveDate>,
    pub failures: usize,
}

impl Recorder {
    /// make sure the log directory exists; the recorder is ready afterwards
    pub fn open(dir: impl Into<PathBuf>, calendar: CalendarZone) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| FridgeError::from_io(&dir, e))?;
        info!(dir = %dir.display(), ?calendar, "recorder ready");
        Ok(Self {
            dir,
            calendar,
            append_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self, day: NaiveDate) -> PathBuf {
        day_log_path(&self.dir, day)
    }

    /// append `record` to the log for its calendar day
    ///
    /// returns the path written to.
    pub fn record(&self, record: &StatusRecord) -> Result<PathBuf> {
        let path = self.log_path(self.calendar.day_of(record.timestamp));
        let mut line = record.to_csv_line();
        line.push('\n');

        let _guard = self.append_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| FridgeError::from_io(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| FridgeError::from_io(&path, e))?;

        Ok(path)
    }

    /// delete logs that are `retention.days` or more days older than `today`
    ///
    /// never fails: problems are logged and counted in the report.
    pub fn sweep(&self, today: NaiveDate, retention: &RetentionConfig) -> SweepReport {
        let days = u64::from(retention.days.max(1));
        let cutoff = today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
        let mut report = SweepReport {
            cutoff,
            deleted: Vec::new(),
            failures: 0,
        };

        let candidates = match retention.strategy {
            RetentionStrategy::ExactDay => vec![(cutoff, self.log_path(cutoff))],
            RetentionStrategy::Scan => match self.expired_logs(cutoff) {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "retention sweep could not list logs");
                    report.failures += 1;
                    return report;
                }
            },
        };

        for (day, path) in candidates {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(%day, path = %path.display(), "removed expired log");
                    report.deleted.push(day);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(%day, "no log to remove, maybe it did not exist");
                }
                Err(e) => {
                    warn!(%day, path = %path.display(), error = %e, "could not remove expired log");
                    report.failures += 1;
                }
            }
        }

        report.deleted.sort();
        report
    }

    fn expired_logs(&self, cutoff: NaiveDate) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| FridgeError::from_io(&self.dir, e))?;
        let mut expired = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| FridgeError::from_io(&self.dir, e))?.path();
            if let Some(day) = day_of_log_file(&path) {
                if day <= cutoff {
                    expired.push((day, path));
                }
            }
        }
        Ok(expired)
    }

    /// sweep now and then every `sweep_interval`, for the life of the process
    pub async fn run_retention(self: Arc<Self>, retention: RetentionConfig) {
        let mut ticker = tokio::time::interval(retention.sweep_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let recorder = Arc::clone(&self);
            let retention = retention.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                let today = recorder.calendar.today();
                recorder.sweep(today, &retention)
            })
            .await;

            match outcome {
                Ok(report) => debug!(
                    cutoff = %report.cutoff,
                    deleted = report.deleted.len(),
                    failures = report.failures,
                    "retention sweep done"
                ),
                Err(e) => warn!(error = %e, "retention sweep task failed"),
            }
        }
    }
}
