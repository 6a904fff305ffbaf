//! ==============================================================================
//! domain.rs - settings and status record types
//! ==============================================================================
//!
//! purpose:
//!     the two shapes everything else passes around:
//!     - Configuration: the persisted controller settings (target + pid gains)
//!     - StatusRecord: one immutable sample, produced once per tick
//!
//! ```text
//!     also owns the daily-log line codec, since the column order is part
//!     of the record's contract rather than of the recorder.
//! ```
//!
//! line format:
//!     timestamp,status,inside_temp,outside_temp,target_temp,p,i,d[,correction]
//!
//! ```text
//!     the 9th column is only written when the sensor source reports a
//!     correction, so plain records stay identical to 8-column logs.
//! ```
//!
//! ==============================================================================

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// operating status of the compressor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Idle,
    Cooling,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => f.write_str("Idle"),
            Status::Cooling => f.write_str("Cooling"),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Idle" => Ok(Status::Idle),
            "Cooling" => Ok(Status::Cooling),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

// ==============================================================================
// configuration
// ==============================================================================

/// persisted controller settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// target inside temperature in celsius
    pub target_temp: f64,
    pub p: f64,
    pub i: f64,
    pub d: f64,
    /// only present in deployments where the controller stores its status here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            target_temp: 20.0,
            p: 8.0,
            i: 0.0,
            d: 0.0,
            status: None,
        }
    }
}

impl Configuration {
    /// overlay every field present in `partial`, keep the rest
    ///
    /// presence is the test, not truthiness: an explicit `0` replaces the
    /// stored value.
    pub fn merge(&self, partial: &PartialConfiguration) -> Configuration {
        Configuration {
            target_temp: partial.target_temp.unwrap_or(self.target_temp),
            p: partial.p.unwrap_or(self.p),
            i: partial.i.unwrap_or(self.i),
            d: partial.d.unwrap_or(self.d),
            status: self.status,
        }
    }
}

/// a control request: any subset of the settings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialConfiguration {
    pub target_temp: Option<f64>,
    pub p: Option<f64>,
    pub i: Option<f64>,
    pub d: Option<f64>,
}

impl PartialConfiguration {
    /// names of the fields this request leaves out
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("target_temp", self.target_temp),
            ("p", self.p),
            ("i", self.i),
            ("d", self.d),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.is_none().then_some(name))
        .collect()
    }

    /// names of supplied fields that are NaN or infinite
    pub fn non_finite_fields(&self) -> Vec<&'static str> {
        [
            ("target_temp", self.target_temp),
            ("p", self.p),
            ("i", self.i),
            ("d", self.d),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.filter(|v| !v.is_finite()).map(|_| name))
        .collect()
    }
}

// ==============================================================================
// status record
// ==============================================================================

/// one sample, built once per tick and never mutated afterwards
///
/// settings are copied in at tick time, so later control updates do not
/// rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub inside_temp: f64,
    pub outside_temp: f64,
    pub target_temp: f64,
    pub p: f64,
    pub i: f64,
    pub d: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<f64>,
}

const BASE_COLUMNS: usize = 8;
const MAX_COLUMNS: usize = 9;

impl StatusRecord {
    /// rfc 3339 in utc, fractional seconds only when non-zero
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// render as one daily-log line, without the terminator
    pub fn to_csv_line(&self) -> String {
        let mut line = format!(
            "{},{},{},{},{},{},{},{}",
            self.timestamp_string(),
            self.status,
            self.inside_temp,
            self.outside_temp,
            self.target_temp,
            self.p,
            self.i,
            self.d,
        );
        if let Some(correction) = self.correction {
            line.push(',');
            line.push_str(&correction.to_string());
        }
        line
    }

    /// parse one daily-log line
    ///
    /// the error is a human-readable reason; the caller knows the file
    /// and line number.
    pub fn from_csv_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != BASE_COLUMNS && fields.len() != MAX_COLUMNS {
            return Err(format!(
                "expected {BASE_COLUMNS} or {MAX_COLUMNS} fields, found {}",
                fields.len()
            ));
        }

        let timestamp = DateTime::parse_from_rfc3339(fields[0])
            .map_err(|e| format!("bad timestamp {:?}: {e}", fields[0]))?
            .with_timezone(&Utc);
        let status = fields[1].parse::<Status>()?;

        Ok(StatusRecord {
            timestamp,
            status,
            inside_temp: number(fields[2], "inside_temp")?,
            outside_temp: number(fields[3], "outside_temp")?,
            target_temp: number(fields[4], "target_temp")?,
            p: number(fields[5], "p")?,
            i: number(fields[6], "i")?,
            d: number(fields[7], "d")?,
            correction: fields
                .get(8)
                .map(|raw| number(raw, "correction"))
                .transpose()?,
        })
    }
}

fn number(raw: &str, field: &str) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("{field} is not a finite number: {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn sample() -> StatusRecord {
        StatusRecord {
            timestamp: Utc.with_ymd_and_hms(2020, 4, 19, 10, 0, 0).unwrap(),
            status: Status::Idle,
            inside_temp: 3.8,
            outside_temp: 22.1,
            target_temp: 4.0,
            p: 1.0,
            i: 0.0,
            d: 0.0,
            correction: None,
        }
    }

    #[test]
    fn renders_the_eight_column_line() {
        assert_eq!(
            sample().to_csv_line(),
            "2020-04-19T10:00:00Z,Idle,3.8,22.1,4,1,0,0"
        );
    }

    #[test]
    fn correction_goes_in_the_ninth_column() {
        let record = StatusRecord {
            status: Status::Cooling,
            correction: Some(-12.5),
            ..sample()
        };
        assert_eq!(
            record.to_csv_line(),
            "2020-04-19T10:00:00Z,Cooling,3.8,22.1,4,1,0,0,-12.5"
        );
        assert_eq!(StatusRecord::from_csv_line(&record.to_csv_line()), Ok(record));
    }

    #[test]
    fn parses_millisecond_timestamps() {
        let record =
            StatusRecord::from_csv_line("2020-04-19T10:00:00.250Z,Idle,3.8,22.1,4,1,0,0").unwrap();
        assert_eq!(record.timestamp.timestamp_subsec_millis(), 250);
        assert_eq!(record.timestamp_string(), "2020-04-19T10:00:00.250Z");
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = StatusRecord::from_csv_line("2020-04-19T10:00:00Z,Idle,3.8").unwrap_err();
        assert!(err.contains("found 3"), "{err}");
    }

    #[test]
    fn rejects_non_numeric_fields() {
        assert!(StatusRecord::from_csv_line("2020-04-19T10:00:00Z,Idle,warm,22.1,4,1,0,0").is_err());
        assert!(StatusRecord::from_csv_line("2020-04-19T10:00:00Z,Idle,NaN,22.1,4,1,0,0").is_err());
        assert!(StatusRecord::from_csv_line("2020-04-19T10:00:00Z,Heating,3.8,22.1,4,1,0,0").is_err());
    }

    #[test]
    fn explicit_zero_overwrites() {
        let stored = Configuration {
            target_temp: 4.0,
            p: 1.0,
            i: 0.5,
            d: 0.2,
            status: None,
        };
        let merged = stored.merge(&PartialConfiguration {
            i: Some(0.0),
            ..Default::default()
        });
        assert_eq!(merged.i, 0.0);
        assert_eq!(merged.d, 0.2);
    }

    #[test]
    fn partial_deserializes_absent_and_null_as_none() {
        let partial: PartialConfiguration =
            serde_json::from_str(r#"{"target_temp": 5, "p": null}"#).unwrap();
        assert_eq!(partial.target_temp, Some(5.0));
        assert_eq!(partial.missing_fields(), vec!["p", "i", "d"]);
    }

    #[test]
    fn configuration_status_is_optional_on_disk() {
        let cfg: Configuration =
            serde_json::from_str(r#"{"target_temp":4,"p":1,"i":0,"d":0}"#).unwrap();
        assert_eq!(cfg.status, None);
        let cfg: Configuration =
            serde_json::from_str(r#"{"target_temp":4,"p":1,"i":0,"d":0,"status":"Cooling"}"#)
                .unwrap();
        assert_eq!(cfg.status, Some(Status::Cooling));
    }

    fn finite() -> impl Strategy<Value = f64> {
        -1.0e6f64..1.0e6f64
    }

    proptest! {
        #[test]
        fn merge_takes_supplied_fields_and_keeps_the_rest(
            base in (finite(), finite(), finite(), finite()),
            update in (
                proptest::option::of(finite()),
                proptest::option::of(finite()),
                proptest::option::of(finite()),
                proptest::option::of(finite()),
            ),
        ) {
            let stored = Configuration { target_temp: base.0, p: base.1, i: base.2, d: base.3, status: None };
            let partial = PartialConfiguration { target_temp: update.0, p: update.1, i: update.2, d: update.3 };
            let merged = stored.merge(&partial);
            prop_assert_eq!(merged.target_temp, update.0.unwrap_or(base.0));
            prop_assert_eq!(merged.p, update.1.unwrap_or(base.1));
            prop_assert_eq!(merged.i, update.2.unwrap_or(base.2));
            prop_assert_eq!(merged.d, update.3.unwrap_or(base.3));
        }

        #[test]
        fn csv_line_round_trips(
            secs in 0i64..4_000_000_000i64,
            millis in 0u32..1000,
            cooling in any::<bool>(),
            temps in (finite(), finite(), finite()),
            gains in (finite(), finite(), finite()),
            correction in proptest::option::of(finite()),
        ) {
            let record = StatusRecord {
                timestamp: Utc.timestamp_opt(secs, millis * 1_000_000).unwrap(),
                status: if cooling { Status::Cooling } else { Status::Idle },
                inside_temp: temps.0,
                outside_temp: temps.1,
                target_temp: temps.2,
                p: gains.0,
                i: gains.1,
                d: gains.2,
                correction,
            };
            prop_assert_eq!(StatusRecord::from_csv_line(&record.to_csv_line()), Ok(record));
        }
    }
}
