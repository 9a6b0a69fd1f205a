//! orb.sensor_reading.v1 schema definition
//!
//! A sparse key/value sensor reading. Every signal is optional; missing keys
//! and JSON `null` are absent, never zero. Unknown keys are ignored.
//!
//! Legacy key names (`hr`, `emg_primary`, `power_output`, `acceleration`) are
//! accepted alongside the canonical ones; when both are sent the canonical
//! key wins.
//!
//! Ingestion never rejects a reading: non-finite and implausible (negative
//! heart rate, GSR or impedance) values are dropped as absent. Use
//! [`SensorReading::validate`] to report such readings instead.

use crate::error::ComputeError;
use crate::types::SensorSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Current schema version
pub const SCHEMA_VERSION: &str = "orb.sensor_reading.v1";

/// Signals that cannot physically be negative
const NON_NEGATIVE_SIGNALS: [&str; 3] = ["heart_rate", "gsr", "impedance"];

/// Nested triaxial acceleration, accepted as an alternative to `accel_*` keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccelReading {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

/// One reading as it arrives on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,

    /// Assigned by the engine when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(default, skip_serializing)]
    pub hr: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel_z: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accel: Option<AccelReading>,
    #[serde(default, skip_serializing)]
    pub acceleration: Option<AccelReading>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emg: Option<f64>,
    #[serde(default, skip_serializing)]
    pub emg_primary: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(default, skip_serializing)]
    pub power_output: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gsr: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impedance: Option<f64>,
}

/// Validation errors for readings
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Reading carries no sensor signal")]
    NoSignals,

    #[error("Signal {signal} is negative: {value}")]
    NegativeSignal { signal: &'static str, value: f64 },
}

impl SensorReading {
    /// Report schema and plausibility problems.
    ///
    /// Used for offline checking; ingestion accepts every reading and drops
    /// implausible values instead.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(version) = &self.schema_version {
            if version != SCHEMA_VERSION {
                return Err(ValidationError::InvalidSchemaVersion {
                    expected: SCHEMA_VERSION.to_string(),
                    actual: version.clone(),
                });
            }
        }

        let signals = self.signals();
        if signals.iter().all(|(_, v)| v.is_none()) {
            return Err(ValidationError::NoSignals);
        }

        for (signal, value) in self.signals() {
            if let Some(v) = value.filter(|v| *v < 0.0 && NON_NEGATIVE_SIGNALS.contains(&signal)) {
                return Err(ValidationError::NegativeSignal { signal, value: v });
            }
        }
        Ok(())
    }

    /// Named signals after merging legacy keys and the nested acceleration form
    fn signals(&self) -> [(&'static str, Option<f64>); 8] {
        let nested = self.accel.or(self.acceleration).unwrap_or_default();
        [
            ("heart_rate", self.heart_rate.or(self.hr)),
            ("accel_x", self.accel_x.or(nested.x)),
            ("accel_y", self.accel_y.or(nested.y)),
            ("accel_z", self.accel_z.or(nested.z)),
            ("emg", self.emg.or(self.emg_primary)),
            ("power", self.power.or(self.power_output)),
            ("gsr", self.gsr),
            ("impedance", self.impedance),
        ]
    }

    /// Convert to an engine sample, stamping `now` when no timestamp was sent.
    ///
    /// Non-finite and implausible values are dropped (logged) rather than
    /// ingested; the reading itself is always accepted.
    pub fn to_sample_at(&self, now: DateTime<Utc>) -> SensorSample {
        let mut sample = SensorSample::at(self.timestamp.unwrap_or(now));
        for (signal, value) in self.signals() {
            let value = match value {
                Some(v) if !v.is_finite() => {
                    warn!(signal, "dropping non-finite sensor value");
                    None
                }
                Some(v) if v < 0.0 && NON_NEGATIVE_SIGNALS.contains(&signal) => {
                    warn!(signal, value = v, "dropping negative sensor value");
                    None
                }
                other => other,
            };
            match signal {
                "heart_rate" => sample.heart_rate = value,
                "accel_x" => sample.accel_x = value,
                "accel_y" => sample.accel_y = value,
                "accel_z" => sample.accel_z = value,
                "emg" => sample.emg = value,
                "power" => sample.power = value,
                "gsr" => sample.gsr = value,
                _ => sample.impedance = value,
            }
        }
        sample
    }

    pub fn to_sample(&self) -> SensorSample {
        self.to_sample_at(Utc::now())
    }
}

impl From<&SensorSample> for SensorReading {
    fn from(sample: &SensorSample) -> Self {
        Self {
            schema_version: Some(SCHEMA_VERSION.to_string()),
            timestamp: Some(sample.timestamp),
            heart_rate: sample.heart_rate,
            accel_x: sample.accel_x,
            accel_y: sample.accel_y,
            accel_z: sample.accel_z,
            emg: sample.emg,
            power: sample.power,
            gsr: sample.gsr,
            impedance: sample.impedance,
            ..Default::default()
        }
    }
}

/// Parsing and batch validation of readings
pub struct ReadingParser;

impl ReadingParser {
    /// Parse a JSON string containing an array of readings
    pub fn parse_array(json: &str) -> Result<Vec<SensorReading>, ComputeError> {
        let readings: Vec<SensorReading> = serde_json::from_str(json)?;
        Ok(readings)
    }

    /// Parse one NDJSON line; blank lines yield `None`
    pub fn parse_line(line: &str, line_num: usize) -> Result<Option<SensorReading>, ComputeError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<SensorReading>(trimmed)
            .map(Some)
            .map_err(|e| ComputeError::ParseError(format!("Failed to parse line {}: {}", line_num, e)))
    }

    /// Parse NDJSON (newline-delimited JSON) containing readings
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<SensorReading>, ComputeError> {
        let mut readings = Vec::new();
        for (idx, line) in ndjson.lines().enumerate() {
            if let Some(reading) = Self::parse_line(line, idx + 1)? {
                readings.push(reading);
            }
        }
        Ok(readings)
    }

    /// Parse either a JSON array or NDJSON, detected from the first character
    pub fn parse_auto(input: &str) -> Result<Vec<SensorReading>, ComputeError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Validate a batch of readings, returning only the failures
    pub fn validate_readings(readings: &[SensorReading]) -> Vec<ValidationResult> {
        readings
            .iter()
            .enumerate()
            .filter_map(|(index, reading)| {
                reading
                    .validate()
                    .err()
                    .map(|error| ValidationResult { index, error })
            })
            .collect()
    }
}

/// A reading that failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub error: ValidationError,
}
