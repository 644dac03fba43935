//! Tracked Mobile Alerts devices.

pub mod registry;

pub use registry::{DeviceBinding, DeviceRegistry, TrackedDevice};
