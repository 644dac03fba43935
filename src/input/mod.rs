//! Input sources for the bridge.
//!
//! Current input sources:
//! - `mobile_alerts`: the Mobile Alerts cloud API (latest measurement per device)

pub mod mobile_alerts;

pub use mobile_alerts::{MeasurementSource, MobileAlertsClient};
