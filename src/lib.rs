//! Mobile Alerts bridge library.
//!
//! Infers the device model of Mobile Alerts sensors from the shape of their
//! measurements and turns the measurements into typed sensor readings.

pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod inference;
pub mod input;
pub mod sensors;
