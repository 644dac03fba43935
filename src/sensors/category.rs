//! Sensor categories and the default field-name → category table.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Physical quantity (or device state) a measurement field represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SensorCategory {
    /// °C
    Temperature,
    /// %
    Humidity,
    /// Rolling humidity average (3h, 24h, 7d, 30d), %
    HumidityAverage,
    /// mm
    Rain,
    /// Rain gauge flip counter
    RainFlips,
    /// m/s
    WindSpeed,
    /// m/s
    WindGust,
    /// 16-point compass text derived from the raw 0..=15 index
    WindDirection,
    /// Degrees derived from the raw 0..=15 index
    WindDirectionDegrees,
    /// hPa
    AirPressure,
    /// ppm
    Co2,
    /// Window/door contact, true when open
    Contact,
    /// Water presence flag
    Water,
    /// Smoke detector alarm flag
    SmokeAlarm,
    KeyPressType,
    KeyPressCounter,
    /// %
    BatteryPercentage,
    /// Low/ok flag
    BatteryStatus,
    LastSeen,
    /// Field without a known meaning; value passed through.
    Generic,
}

/// Kind of value a category carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Flag,
    Text,
    Timestamp,
    Passthrough,
}

impl SensorCategory {
    pub fn value_kind(self) -> ValueKind {
        match self {
            SensorCategory::Contact | SensorCategory::Water | SensorCategory::SmokeAlarm => {
                ValueKind::Flag
            }
            SensorCategory::WindDirection | SensorCategory::BatteryStatus => ValueKind::Text,
            SensorCategory::LastSeen => ValueKind::Timestamp,
            SensorCategory::Generic => ValueKind::Passthrough,
            _ => ValueKind::Number,
        }
    }

    /// Plausibility range for numeric categories. Values outside are reported
    /// as unavailable.
    pub fn bounds(self) -> Option<(f64, f64)> {
        match self {
            SensorCategory::Temperature => Some((-100.0, 100.0)),
            SensorCategory::Humidity
            | SensorCategory::HumidityAverage
            | SensorCategory::BatteryPercentage => Some((0.0, 100.0)),
            _ => None,
        }
    }

    pub fn in_bounds(self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self.bounds() {
            Some((min, max)) => (min..=max).contains(&value),
            None => true,
        }
    }
}

/// Category a field has when no model-specific override applies.
pub fn default_category(field: &str) -> SensorCategory {
    match field {
        "h" => return SensorCategory::Humidity,
        "r" => return SensorCategory::Rain,
        "rf" => return SensorCategory::RainFlips,
        "ws" => return SensorCategory::WindSpeed,
        "wg" => return SensorCategory::WindGust,
        "wd" => return SensorCategory::WindDirection,
        "ap" => return SensorCategory::AirPressure,
        "ppm" => return SensorCategory::Co2,
        "w" => return SensorCategory::Contact,
        "b" => return SensorCategory::BatteryPercentage,
        "lb" | "lowbattery" => return SensorCategory::BatteryStatus,
        "c" => return SensorCategory::LastSeen,
        _ => {}
    }

    if let Some(channel) = field.strip_prefix('t')
        && is_channel(channel)
    {
        return SensorCategory::Temperature;
    }
    if let Some(rest) = field.strip_prefix('h') {
        if is_channel(rest) {
            return SensorCategory::Humidity;
        }
        if rest.ends_with("avg") {
            return SensorCategory::HumidityAverage;
        }
    }
    if let Some(channel) = field.strip_prefix('a')
        && is_channel(channel)
    {
        return SensorCategory::SmokeAlarm;
    }
    if let Some(rest) = field.strip_prefix("kp") {
        if let Some(channel) = rest.strip_suffix('t')
            && is_channel(channel)
        {
            return SensorCategory::KeyPressType;
        }
        if let Some(channel) = rest.strip_suffix('c')
            && is_channel(channel)
        {
            return SensorCategory::KeyPressCounter;
        }
    }

    SensorCategory::Generic
}

fn is_channel(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_categories() {
        assert_eq!(default_category("t1"), SensorCategory::Temperature);
        assert_eq!(default_category("t4"), SensorCategory::Temperature);
        assert_eq!(default_category("h"), SensorCategory::Humidity);
        assert_eq!(default_category("h3"), SensorCategory::Humidity);
        assert_eq!(default_category("h24havg"), SensorCategory::HumidityAverage);
        assert_eq!(default_category("ws"), SensorCategory::WindSpeed);
        assert_eq!(default_category("wd"), SensorCategory::WindDirection);
        assert_eq!(default_category("w"), SensorCategory::Contact);
        assert_eq!(default_category("b"), SensorCategory::BatteryPercentage);
        assert_eq!(default_category("c"), SensorCategory::LastSeen);
        assert_eq!(default_category("a2"), SensorCategory::SmokeAlarm);
        assert_eq!(default_category("kp3t"), SensorCategory::KeyPressType);
        assert_eq!(default_category("kp3c"), SensorCategory::KeyPressCounter);
    }

    #[test]
    fn test_unknown_fields_are_generic() {
        assert_eq!(default_category("xyz"), SensorCategory::Generic);
        assert_eq!(default_category("t"), SensorCategory::Generic);
        assert_eq!(default_category("kpxt"), SensorCategory::Generic);
        assert_eq!(default_category("wsct"), SensorCategory::Generic);
    }

    #[test]
    fn test_bounds() {
        assert!(SensorCategory::Temperature.in_bounds(-100.0));
        assert!(SensorCategory::Temperature.in_bounds(100.0));
        assert!(!SensorCategory::Temperature.in_bounds(100.1));
        assert!(!SensorCategory::Humidity.in_bounds(-0.5));
        assert!(!SensorCategory::BatteryPercentage.in_bounds(101.0));
        assert!(SensorCategory::AirPressure.in_bounds(1013.25));
        assert!(!SensorCategory::Rain.in_bounds(f64::NAN));
    }

    #[test]
    fn test_string_round_trip() {
        assert_eq!(SensorCategory::WindDirectionDegrees.to_string(), "wind_direction_degrees");
        assert_eq!(SensorCategory::from_str("water").unwrap(), SensorCategory::Water);
    }
}
