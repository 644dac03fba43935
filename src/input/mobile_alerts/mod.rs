//! Mobile Alerts cloud API input.
//!
//! Fetches the latest measurement of registered devices from the vendor's
//! `lastmeasurement` endpoint. All devices are fetched in one batched request.

mod client;
mod types;

pub use client::{Fetched, MeasurementSource, MobileAlertsClient};
pub use types::{
    DeviceRecord, LastMeasurementRequest, LastMeasurementResponse, interpret, parse_records,
};
