//! Sensor categories and reading materialization.
//!
//! A resolved model (or a flat measurement key) is turned into typed
//! [`SensorReading`]s here. Categories decide how a raw field is read,
//! the catalog's overrides decide which category a field gets.

pub mod category;
pub mod materialize;

pub use category::{SensorCategory, ValueKind, default_category};
pub use materialize::{
    BatteryStatus, DeviceSample, SensorReading, SensorValue, materialize, materialize_field,
};
