//! Registry of tracked devices.
//!
//! Shared between the CLI and the coordinator; readers never block each
//! other. Devices keep the order in which they were added.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// How a tracked device is turned into sensors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum DeviceBinding {
    /// Infer the model from every measurement.
    Detect,
    /// Fixed model id from the catalog.
    Model(String),
    /// Flat entry bound to a single measurement key.
    MeasurementKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDevice {
    pub device_id: String,
    pub name: String,
    pub binding: DeviceBinding,
}

impl TrackedDevice {
    pub fn new(device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        Self {
            name: format!("Mobile Alerts {}", device_id),
            device_id,
            binding: DeviceBinding::Detect,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_binding(mut self, binding: DeviceBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn unique_id(&self) -> String {
        format!("mobile_alerts_{}", self.device_id)
    }

    pub fn model_id(&self) -> Option<&str> {
        match &self.binding {
            DeviceBinding::Model(model_id) => Some(model_id),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<TrackedDevice>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device, or replace the entry with the same id in place.
    /// Returns `true` if the device was new.
    pub fn upsert(&self, device: TrackedDevice) -> bool {
        let mut devices = self.devices.write();
        match devices.iter_mut().find(|d| d.device_id == device.device_id) {
            Some(existing) => {
                *existing = device;
                false
            }
            None => {
                devices.push(device);
                true
            }
        }
    }

    pub fn get(&self, device_id: &str) -> Option<TrackedDevice> {
        self.devices
            .read()
            .iter()
            .find(|d| d.device_id == device_id)
            .cloned()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.read().iter().any(|d| d.device_id == device_id)
    }

    pub fn list(&self) -> Vec<TrackedDevice> {
        self.devices.read().clone()
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.devices
            .read()
            .iter()
            .map(|d| d.device_id.clone())
            .collect()
    }

    pub fn remove(&self, device_id: &str) -> Option<TrackedDevice> {
        let mut devices = self.devices.write();
        let index = devices.iter().position(|d| d.device_id == device_id)?;
        Some(devices.remove(index))
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_upsert_keeps_order() {
        let registry = DeviceRegistry::new();
        assert!(registry.upsert(TrackedDevice::new("B")));
        assert!(registry.upsert(TrackedDevice::new("A")));
        assert!(!registry.upsert(
            TrackedDevice::new("B").with_binding(DeviceBinding::Model("MA10100".to_string()))
        ));

        assert_eq!(registry.device_ids(), vec!["B", "A"]);
        assert_eq!(registry.get("B").unwrap().model_id(), Some("MA10100"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove() {
        let registry = DeviceRegistry::new();
        registry.upsert(TrackedDevice::new("A"));
        assert_eq!(registry.remove("A").unwrap().device_id, "A");
        assert!(registry.remove("A").is_none());
        assert!(registry.is_empty());
        assert!(!registry.contains("A"));
    }

    #[test]
    fn test_names_and_unique_id() {
        let device = TrackedDevice::new("0E7EA4A71203");
        assert_eq!(device.name, "Mobile Alerts 0E7EA4A71203");
        assert_eq!(device.unique_id(), "mobile_alerts_0E7EA4A71203");
        assert_eq!(device.with_name("Garden").name, "Garden");
    }

    #[test]
    fn test_concurrent_upserts() {
        let registry = Arc::new(DeviceRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.upsert(TrackedDevice::new(format!("dev{}", i)));
                    registry.upsert(TrackedDevice::new("shared"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn test_binding_serialization() {
        let json = serde_json::to_value(DeviceBinding::MeasurementKey("t1".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "measurement_key", "value": "t1"}));
    }
}
