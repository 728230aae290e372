//! Measurement data models and their stored record shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Stored field holding the per-session sequence number.
pub const MEASUREMENT_NUMBER_FIELD: &str = "measurementNumber";

/// One recorded observation, numbered within its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub measurement_number: u64,
    /// Centimeters.
    pub distance: f64,
    /// Degrees.
    pub angle: f64,
    pub session: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Caller-supplied fields prior to sequence-number assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementDraft {
    pub distance: f64,
    pub angle: f64,
    pub timestamp: i64,
}

/// A stored child that could not be read back as a [`Measurement`].
#[derive(Debug, Clone, Error, PartialEq)]
#[error("malformed measurement record {key}: {reason}")]
pub struct MalformedRecord {
    pub key: String,
    pub reason: String,
}

/// A numeric field JSON cannot carry.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
#[error("{field} must be a finite number, got {value}")]
pub struct NonFiniteField {
    pub field: &'static str,
    pub value: f64,
}

fn ensure_finite(distance: f64, angle: f64) -> Result<(), NonFiniteField> {
    for (field, value) in [("distance", distance), ("angle", angle)] {
        if !value.is_finite() {
            return Err(NonFiniteField { field, value });
        }
    }
    Ok(())
}

impl MeasurementDraft {
    pub fn new(distance: f64, angle: f64, timestamp: i64) -> Self {
        Self {
            distance,
            angle,
            timestamp,
        }
    }

    /// Draft stamped with the current wall clock.
    pub fn now(distance: f64, angle: f64) -> Self {
        Self::new(distance, angle, Utc::now().timestamp_millis())
    }

    /// NaN and infinities would be written as `null` and never read back.
    pub fn ensure_finite(&self) -> Result<(), NonFiniteField> {
        ensure_finite(self.distance, self.angle)
    }

    pub fn into_measurement(self, session: &str, measurement_number: u64) -> Measurement {
        Measurement {
            measurement_number,
            distance: self.distance,
            angle: self.angle,
            session: session.to_string(),
            timestamp: self.timestamp,
        }
    }
}

impl Measurement {
    /// Parse a stored child value. All five fields must be present with scalar
    /// types and the sequence number must be positive.
    pub fn from_record(key: &str, value: &Value) -> Result<Self, MalformedRecord> {
        let measurement = Measurement::deserialize(value).map_err(|err| MalformedRecord {
            key: key.to_string(),
            reason: err.to_string(),
        })?;

        if measurement.measurement_number == 0 {
            return Err(MalformedRecord {
                key: key.to_string(),
                reason: format!("{MEASUREMENT_NUMBER_FIELD} must be at least 1"),
            });
        }

        Ok(measurement)
    }

    pub fn to_record(&self) -> anyhow::Result<Value> {
        ensure_finite(self.distance, self.angle)?;
        Ok(serde_json::to_value(self)?)
    }

    /// Creation time, if the stored timestamp is within chrono's range.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Sequence number of a raw child, looking at nothing but that one field.
pub fn sequence_number_of(value: &Value) -> Option<u64> {
    value
        .get(MEASUREMENT_NUMBER_FIELD)
        .and_then(Value::as_u64)
        .filter(|number| *number >= 1)
}
