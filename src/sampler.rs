//! ==============================================================================
//! sampler.rs - the periodic sample / record / broadcast loop
//! ==============================================================================
//!
//! purpose:
//!     once per tick:
//!     1. read the current settings
//!     2. read the sensors
//!     3. build a StatusRecord from both plus the tick time
//!     4. append it to the day log AND publish it on the live channel
//!
//! failure semantics:
//!     - settings or sensor failure: the tick is abandoned, nothing is
//!       recorded or published, the next tick starts from scratch
//!     - record and publish are independent: a failed append still
//!       publishes, and publishing never blocks the append
//!     - no failure ever stops the loop
//!
//! ordering:
//!     ticks run one after another in a single task, so two samples never
//!     overlap and log order is tick order. a tick that runs long makes the
//!     timer skip, not queue.
//!
//! ==============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::StatusRecord;
use crate::error::{FridgeError, Result};
use crate::live::LiveChannel;
use crate::recorder::Recorder;
use crate::sensors::SensorReader;
use crate::settings::ConfigStore;

#[derive(Clone)]
pub struct Sampler {
    settings: ConfigStore,
    sensors: Arc<dyn SensorReader>,
    recorder: Arc<Recorder>,
    live: LiveChannel,
    inside_channel: String,
    outside_channel: String,
}

/// what one completed tick did
#[derive(Debug)]
pub struct TickOutcome {
    pub record: StatusRecord,
    /// log the record was appended to, None if the append failed
    pub logged_to: Option<PathBuf>,
    /// live subscribers that received the record
    pub delivered: usize,
}

impl Sampler {
    pub fn new(
        settings: ConfigStore,
        sensors: Arc<dyn SensorReader>,
        recorder: Arc<Recorder>,
        live: LiveChannel,
    ) -> Self {
        Self {
            settings,
            sensors,
            recorder,
            live,
            inside_channel: "inside".to_string(),
            outside_channel: "outside".to_string(),
        }
    }

    /// which sensor channels feed inside_temp and outside_temp
    pub fn with_channels(mut self, inside: impl Into<String>, outside: impl Into<String>) -> Self {
        self.inside_channel = inside.into();
        self.outside_channel = outside.into();
        self
    }

    /// steps 1-3: settings + sensors -> record (blocking)
    pub fn sample(&self, now: DateTime<Utc>) -> Result<StatusRecord> {
        let config = self.settings.read()?;
        let readings = self.sensors.read()?;

        Ok(StatusRecord {
            timestamp: now,
            status: readings.status.or(config.status).unwrap_or_default(),
            inside_temp: readings.channel(&self.inside_channel)?,
            outside_temp: readings.channel(&self.outside_channel)?,
            target_temp: config.target_temp,
            p: config.p,
            i: config.i,
            d: config.d,
            correction: readings.correction,
        })
    }

    /// one full tick at time `now`
    ///
    /// an Err means the tick was abandoned before a record existed.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let sampler = self.clone();
        let record = tokio::task::spawn_blocking(move || sampler.sample(now))
            .await
            .map_err(|e| FridgeError::Task(e.to_string()))??;

        let recorder = Arc::clone(&self.recorder);
        let to_log = record.clone();
        let appended = tokio::task::spawn_blocking(move || recorder.record(&to_log));

        // publish while the append runs; neither waits on the other's result
        let delivered = self.live.publish(record.clone());

        let logged_to = match appended.await {
            Ok(Ok(path)) => Some(path),
            Ok(Err(e)) => {
                warn!(error = %e, timestamp = %record.timestamp_string(), "could not record status");
                None
            }
            Err(e) => {
                warn!(error = %e, "record task failed");
                None
            }
        };

        Ok(TickOutcome {
            record,
            logged_to,
            delivered,
        })
    }

    /// tick every `period` for the life of the process
    pub async fn run(self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(?period, "sampler started");

        loop {
            ticker.tick().await;
            match self.tick(Utc::now()).await {
                Ok(outcome) => debug!(
                    line = %outcome.record.to_csv_line(),
                    delivered = outcome.delivered,
                    "tick"
                ),
                Err(e) => warn!(error = %e, "tick abandoned"),
            }
        }
    }
}
