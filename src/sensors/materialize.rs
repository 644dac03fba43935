//! Sensor materializer.
//!
//! Turns one device sample into typed readings: one per declared field of the
//! resolved model (two for wind direction), plus battery status and last seen,
//! which every device reports.

use super::category::{SensorCategory, ValueKind, default_category};
use crate::inference::legacy::KEY_PRESS_FIELD;
use crate::inference::{Measurement, ModelCatalog, ModelDefinition};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use strum::{AsRefStr, Display};

/// Compass points for the raw 0..=15 wind direction index.
pub const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Degrees per step of the wind direction index.
const WIND_DIRECTION_STEP: f64 = 22.5;

/// Source field name used for the battery status reading.
pub const BATTERY_FIELD: &str = "battery";
/// Source field name used for the last seen reading.
pub const LAST_SEEN_FIELD: &str = "last_seen";
/// Source field name used for the derived wind direction degrees reading.
pub const WIND_DEGREES_FIELD: &str = "wd_degrees";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
pub enum BatteryStatus {
    Ok,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Flag(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
    Battery(BatteryStatus),
    /// Value of a field without a known meaning, passed through.
    Raw(Value),
    /// Missing, unparseable or implausible.
    Unavailable,
}

impl SensorValue {
    pub fn is_available(&self) -> bool {
        !matches!(self, SensorValue::Unavailable)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SensorValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            SensorValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub device_id: String,
    /// `None` for flat entries bound to a measurement key instead of a model.
    pub model_id: Option<String>,
    /// Measurement field the value comes from (or a derived name like `battery`).
    pub field: String,
    pub category: SensorCategory,
    pub value: SensorValue,
}

impl SensorReading {
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.device_id, self.field)
    }
}

/// One device's latest data as seen by the materializer.
#[derive(Debug, Clone, Copy)]
pub struct DeviceSample<'a> {
    pub device_id: &'a str,
    pub measurement: &'a Measurement,
    /// Device-level `lowbattery` flag, when the API reports it outside the measurement.
    pub low_battery: Option<&'a Value>,
}

impl<'a> DeviceSample<'a> {
    pub fn new(device_id: &'a str, measurement: &'a Measurement) -> Self {
        Self {
            device_id,
            measurement,
            low_battery: None,
        }
    }

    pub fn with_low_battery(mut self, low_battery: Option<&'a Value>) -> Self {
        self.low_battery = low_battery;
        self
    }
}

/// Readings for `model`, applying the catalog's field overrides.
pub fn materialize(
    catalog: &ModelCatalog,
    model: &ModelDefinition,
    sample: &DeviceSample<'_>,
) -> Vec<SensorReading> {
    let mut readings = Vec::with_capacity(model.declared_fields.len() + 3);
    let model_id = Some(model.model_id.as_str());

    for field in &model.declared_fields {
        let category = catalog.category_for(&model.model_id, field);
        if category != default_category(field) {
            debug!(
                "Field {} of {} is read as {} for device {}",
                field, model.model_id, category, sample.device_id
            );
        }
        push_field_readings(&mut readings, sample, model_id, field, category);
    }

    push_status_readings(&mut readings, sample, model_id);
    readings
}

/// Readings for a flat entry bound to a single measurement key.
///
/// A key-press switch entry yields one reading per key press field present.
pub fn materialize_field(field: &str, sample: &DeviceSample<'_>) -> Vec<SensorReading> {
    let mut readings = Vec::with_capacity(4);
    if field == KEY_PRESS_FIELD {
        let mut keys: Vec<&str> = sample
            .measurement
            .keys()
            .map(String::as_str)
            .filter(|key| {
                matches!(
                    default_category(key),
                    SensorCategory::KeyPressType | SensorCategory::KeyPressCounter
                )
            })
            .collect();
        keys.sort_unstable();
        for key in keys {
            push_field_readings(&mut readings, sample, None, key, default_category(key));
        }
    } else {
        push_field_readings(&mut readings, sample, None, field, default_category(field));
    }
    push_status_readings(&mut readings, sample, None);
    readings
}

fn push_field_readings(
    readings: &mut Vec<SensorReading>,
    sample: &DeviceSample<'_>,
    model_id: Option<&str>,
    field: &str,
    category: SensorCategory,
) {
    let raw = sample.measurement.get(field);
    let reading = |field: &str, category: SensorCategory, value: SensorValue| SensorReading {
        device_id: sample.device_id.to_string(),
        model_id: model_id.map(String::from),
        field: field.to_string(),
        category,
        value,
    };

    if category == SensorCategory::WindDirection {
        let index = raw.and_then(wind_direction_index);
        let compass = index
            .map(|i| SensorValue::Text(COMPASS_POINTS[i].to_string()))
            .unwrap_or(SensorValue::Unavailable);
        let degrees = index
            .map(|i| SensorValue::Number(i as f64 * WIND_DIRECTION_STEP))
            .unwrap_or(SensorValue::Unavailable);
        readings.push(reading(field, category, compass));
        readings.push(reading(
            WIND_DEGREES_FIELD,
            SensorCategory::WindDirectionDegrees,
            degrees,
        ));
        return;
    }

    let value = match raw {
        None => SensorValue::Unavailable,
        Some(raw) => convert(sample.device_id, field, category, raw),
    };
    readings.push(reading(field, category, value));
}

fn push_status_readings(
    readings: &mut Vec<SensorReading>,
    sample: &DeviceSample<'_>,
    model_id: Option<&str>,
) {
    readings.push(SensorReading {
        device_id: sample.device_id.to_string(),
        model_id: model_id.map(String::from),
        field: BATTERY_FIELD.to_string(),
        category: SensorCategory::BatteryStatus,
        value: SensorValue::Battery(battery_status(sample)),
    });

    let last_seen = match sample.measurement.get("c") {
        Some(raw) => parse_timestamp(raw)
            .map(SensorValue::Timestamp)
            .unwrap_or_else(|| {
                warn!(
                    "Could not parse last seen timestamp {} of device {}",
                    raw, sample.device_id
                );
                SensorValue::Unavailable
            }),
        None => SensorValue::Unavailable,
    };
    readings.push(SensorReading {
        device_id: sample.device_id.to_string(),
        model_id: model_id.map(String::from),
        field: LAST_SEEN_FIELD.to_string(),
        category: SensorCategory::LastSeen,
        value: last_seen,
    });
}

fn convert(device_id: &str, field: &str, category: SensorCategory, raw: &Value) -> SensorValue {
    match category.value_kind() {
        ValueKind::Number => match as_number(raw) {
            Some(n) if category.in_bounds(n) => SensorValue::Number(n),
            Some(n) => {
                debug!(
                    "Dropping implausible {} value {} for {}/{}",
                    category, n, device_id, field
                );
                SensorValue::Unavailable
            }
            None => {
                warn!("Invalid value for {}/{}: {}", device_id, field, raw);
                SensorValue::Unavailable
            }
        },
        ValueKind::Flag => as_flag(raw)
            .map(SensorValue::Flag)
            .unwrap_or(SensorValue::Unavailable),
        ValueKind::Timestamp => parse_timestamp(raw)
            .map(SensorValue::Timestamp)
            .unwrap_or(SensorValue::Unavailable),
        ValueKind::Text => match raw {
            Value::String(s) => SensorValue::Text(s.clone()),
            Value::Null => SensorValue::Unavailable,
            other => SensorValue::Text(other.to_string()),
        },
        ValueKind::Passthrough => match raw {
            Value::Null => SensorValue::Unavailable,
            other => SensorValue::Raw(other.clone()),
        },
    }
}

fn as_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_flag(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v as i64 == 1),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn wind_direction_index(raw: &Value) -> Option<usize> {
    let value = as_number(raw)?;
    let index = value.trunc();
    (0.0..=15.0).contains(&index).then_some(index as usize)
}

fn battery_status(sample: &DeviceSample<'_>) -> BatteryStatus {
    let flag = sample
        .low_battery
        .or_else(|| sample.measurement.get("lowbattery"))
        .or_else(|| sample.measurement.get("lb"));

    let low = match flag {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        }
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(_) => false,
    };

    if low { BatteryStatus::Low } else { BatteryStatus::Ok }
}

/// Unix seconds (number or numeric string) or ISO-8601; naive times are UTC.
pub fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => from_unix(n.as_f64()?),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(naive.and_utc());
                }
            }
            from_unix(s.parse().ok()?)
        }
        _ => None,
    }
}

fn from_unix(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}
