//! ==============================================================================
//! sensors.rs - sensor capability provider
//! ==============================================================================
//!
//! purpose:
//!     the sampler only sees the SensorReader trait. behind it sit three
//!     sources, picked by `[sensors] source` in host.toml:
//!     - W1Probes: ds18b20-style 1-wire probes read through sysfs
//!     - ContextFileReader: the status json the controller process writes
//!     - MockSensors: fixed values for development machines
//!
//! channels:
//!     readings are keyed by channel name. the sampler asks for the inside
//!     and outside channel names from host.toml, so probes are not tied to
//!     two hard-coded device ids.
//!
//! failure model:
//!     every read failure is a SensorFault. the sampler skips that tick and
//!     tries again on the next one.
//!
//! ==============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::config::{SensorSource, SensorsConfig};
use crate::domain::Status;
use crate::error::{FridgeError, Result};

/// one instantaneous reading from the sensor source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Readings {
    /// temperature in celsius, by channel name
    pub channels: BTreeMap<String, f64>,
    /// operating status, when the source knows it
    pub status: Option<Status>,
    /// pid controller output, when the source knows it
    pub correction: Option<f64>,
}

impl Readings {
    pub fn channel(&self, name: &str) -> Result<f64> {
        self.channels
            .get(name)
            .copied()
            .ok_or_else(|| FridgeError::SensorFault(format!("no reading for channel {name:?}")))
    }
}

/// anything that can produce a reading; blocking, call from spawn_blocking
pub trait SensorReader: Send + Sync {
    fn read(&self) -> Result<Readings>;
}

/// build the reader host.toml asks for
pub fn from_config(config: &SensorsConfig) -> Result<Arc<dyn SensorReader>> {
    let reader: Arc<dyn SensorReader> = match config.source {
        SensorSource::W1 => {
            let probes = W1Probes::from_config(config)?;
            for required in [&config.inside_channel, &config.outside_channel] {
                if !probes.has_channel(required) {
                    return Err(FridgeError::Validation(format!(
                        "sensor channel {required:?} is not configured"
                    )));
                }
            }
            Arc::new(probes)
        }
        SensorSource::Context => Arc::new(ContextFileReader::new(
            &config.context_path,
            &config.inside_channel,
            &config.outside_channel,
        )),
        SensorSource::Mock => Arc::new(MockSensors::new([
            (config.inside_channel.as_str(), 4.0),
            (config.outside_channel.as_str(), 21.0),
        ])),
    };
    info!(source = ?config.source, "sensor reader ready");
    Ok(reader)
}

// ==============================================================================
// 1-wire probes
// ==============================================================================
//
// a w1_slave file looks like:
//
//     72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//     72 01 4b 46 7f ff 0e 10 57 t=23125
//
// line 1 ends in YES when the crc matched, line 2 carries millidegrees.

pub struct W1Probes {
    channels: Vec<(String, PathBuf)>,
}

impl W1Probes {
    pub fn new(channels: Vec<(String, PathBuf)>) -> Self {
        Self { channels }
    }

    /// device ids resolve to `<w1_root>/<id>/w1_slave`, absolute paths are used as-is
    pub fn from_config(config: &SensorsConfig) -> Result<Self> {
        if config.channels.is_empty() {
            return Err(FridgeError::Validation(
                "w1 sensor source needs at least one [[sensors.channels]] entry".to_string(),
            ));
        }
        let channels = config
            .channels
            .iter()
            .map(|channel| {
                let device = Path::new(&channel.device);
                let path = if device.is_absolute() {
                    device.to_path_buf()
                } else {
                    config.w1_root.join(device).join("w1_slave")
                };
                (channel.name.clone(), path)
            })
            .collect();
        Ok(Self::new(channels))
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.iter().any(|(n, _)| n == name)
    }
}

impl SensorReader for W1Probes {
    fn read(&self) -> Result<Readings> {
        let mut readings = Readings::default();
        for (name, path) in &self.channels {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                FridgeError::SensorFault(format!("{name}: cannot read {}: {e}", path.display()))
            })?;
            let celsius = parse_w1_slave(&contents)
                .map_err(|reason| FridgeError::SensorFault(format!("{name}: {reason}")))?;
            readings.channels.insert(name.clone(), celsius);
        }
        Ok(readings)
    }
}

/// decode a w1_slave file to celsius, rounded to two decimals
pub fn parse_w1_slave(contents: &str) -> std::result::Result<f64, String> {
    let mut lines = contents.lines();
    let (crc_line, data_line) = match (lines.next(), lines.next()) {
        (Some(crc), Some(data)) => (crc.trim_end(), data),
        _ => return Err("cannot read temperature sensor".to_string()),
    };

    if !crc_line.ends_with("YES") {
        return Err(format!("crc does not match: {crc_line}"));
    }

    let raw = data_line
        .split_once("t=")
        .map(|(_, value)| value.trim())
        .ok_or_else(|| "no temperature reading found".to_string())?;
    let millis: f64 = raw
        .parse()
        .map_err(|_| format!("bad temperature value {raw:?}"))?;
    if !millis.is_finite() {
        return Err(format!("bad temperature value {raw:?}"));
    }

    // half-steps round up, so -1.065 is -1.06 like 23.125 is 23.13
    Ok((millis / 10.0 + 0.5).floor() / 100.0)
}

// ==============================================================================
// controller context file
// ==============================================================================

/// the status document the controller writes every cycle
#[derive(Debug, Deserialize)]
struct ControllerContext {
    inside_temp: f64,
    outside_temp: f64,
    #[serde(default)]
    correction: Option<f64>,
    #[serde(default)]
    status: Option<Status>,
}

pub struct ContextFileReader {
    path: PathBuf,
    inside_channel: String,
    outside_channel: String,
}

impl ContextFileReader {
    pub fn new(path: impl Into<PathBuf>, inside_channel: &str, outside_channel: &str) -> Self {
        Self {
            path: path.into(),
            inside_channel: inside_channel.to_string(),
            outside_channel: outside_channel.to_string(),
        }
    }
}

impl SensorReader for ContextFileReader {
    fn read(&self) -> Result<Readings> {
        let raw = std::fs::read(&self.path).map_err(|e| {
            FridgeError::SensorFault(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let context: ControllerContext = serde_json::from_slice(&raw).map_err(|e| {
            FridgeError::SensorFault(format!("bad controller context {}: {e}", self.path.display()))
        })?;

        let mut channels = BTreeMap::new();
        channels.insert(self.inside_channel.clone(), context.inside_temp);
        channels.insert(self.outside_channel.clone(), context.outside_temp);
        Ok(Readings {
            channels,
            status: context.status,
            correction: context.correction,
        })
    }
}

// ==============================================================================
// mock
// ==============================================================================

pub struct MockSensors {
    readings: Readings,
}

impl MockSensors {
    pub fn new<'a>(channels: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            readings: Readings {
                channels: channels
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
                status: None,
                correction: None,
            },
        }
    }
}

impl SensorReader for MockSensors {
    fn read(&self) -> Result<Readings> {
        Ok(self.readings.clone())
    }
}
