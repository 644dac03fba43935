//! Refresh coordinator.
//!
//! One refresh fetches every tracked device in a single request, then runs
//! each record through classify → match → resolve → materialize and reports
//! the outcome per device.

use crate::config::Config;
use crate::device::{DeviceBinding, DeviceRegistry, TrackedDevice};
use crate::error::{BridgeError, Result};
use crate::inference::{
    ModelCatalog, ModelMatcher, Resolution, ResolutionBasis, Signature, classify, resolve,
};
use crate::input::mobile_alerts::{DeviceRecord, MeasurementSource};
use crate::sensors::{DeviceSample, SensorReading, materialize, materialize_field};
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of one device in one refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeviceReport {
    /// Tracked but absent from the API response.
    Missing { device_id: String },
    /// No catalog model explains the measurement.
    Unsupported {
        device_id: String,
        signature: Vec<String>,
    },
    /// Several models fit and none was chosen.
    Ambiguous {
        device_id: String,
        signature: Vec<String>,
        candidates: Vec<String>,
    },
    Resolved {
        device_id: String,
        model_id: String,
        basis: ResolutionBasis,
        readings: Vec<SensorReading>,
    },
    /// Flat entry bound to one measurement key.
    Legacy {
        device_id: String,
        field: String,
        readings: Vec<SensorReading>,
    },
}

impl DeviceReport {
    pub fn device_id(&self) -> &str {
        match self {
            DeviceReport::Missing { device_id }
            | DeviceReport::Unsupported { device_id, .. }
            | DeviceReport::Ambiguous { device_id, .. }
            | DeviceReport::Resolved { device_id, .. }
            | DeviceReport::Legacy { device_id, .. } => device_id,
        }
    }

    pub fn readings(&self) -> &[SensorReading] {
        match self {
            DeviceReport::Resolved { readings, .. } | DeviceReport::Legacy { readings, .. } => {
                readings
            }
            _ => &[],
        }
    }
}

fn signature_fields(signature: &Signature) -> Vec<String> {
    signature.iter().map(String::from).collect()
}

/// Evaluate one device record.
///
/// `choice` only disambiguates; a choice that is not a candidate is ignored
/// with a warning.
pub fn evaluate(
    catalog: &ModelCatalog,
    record: &DeviceRecord,
    binding: &DeviceBinding,
    choice: Option<&str>,
) -> DeviceReport {
    let device_id = record.device_id.clone();
    let sample = DeviceSample::new(&record.device_id, &record.measurement)
        .with_low_battery(record.lowbattery.as_ref());

    match binding {
        DeviceBinding::MeasurementKey(field) => {
            return DeviceReport::Legacy {
                device_id,
                field: field.clone(),
                readings: materialize_field(field, &sample),
            };
        }
        DeviceBinding::Model(model_id) => {
            if let Some(model) = catalog.get(model_id) {
                return DeviceReport::Resolved {
                    device_id,
                    model_id: model.model_id.clone(),
                    basis: ResolutionBasis::ExplicitChoice,
                    readings: materialize(catalog, model, &sample),
                };
            }
            warn!(
                "Device {} is bound to unknown model {}, detecting instead",
                record.device_id, model_id
            );
        }
        DeviceBinding::Detect => {}
    }

    let signature = classify(&record.measurement);
    let result = ModelMatcher::new(catalog).find_matches(&signature);

    let resolution = match resolve(catalog, &record.device_id, &result, choice) {
        Ok(resolution) => resolution,
        Err(e) => {
            warn!("{}, ignoring the choice", e);
            // Without a choice resolution cannot fail.
            match resolve(catalog, &record.device_id, &result, None) {
                Ok(resolution) => resolution,
                Err(_) => Resolution::Unsupported { signature },
            }
        }
    };

    match resolution {
        Resolution::Unsupported { signature } => DeviceReport::Unsupported {
            device_id,
            signature: signature_fields(&signature),
        },
        Resolution::Ambiguous {
            signature,
            candidates,
        } => {
            info!(
                "Device {} matches several models {:?}, choose one to create sensors",
                record.device_id,
                candidates.iter().map(|m| m.model_id.as_str()).collect::<Vec<_>>()
            );
            DeviceReport::Ambiguous {
                device_id,
                signature: signature_fields(&signature),
                candidates: candidates.iter().map(|m| m.model_id.clone()).collect(),
            }
        }
        Resolution::Resolved { model, basis } => DeviceReport::Resolved {
            device_id,
            model_id: model.model_id.clone(),
            basis,
            readings: materialize(catalog, model, &sample),
        },
    }
}

pub struct Coordinator<S> {
    source: S,
    catalog: Arc<ModelCatalog>,
    registry: Arc<DeviceRegistry>,
    choices: RwLock<BTreeMap<String, String>>,
    raw_dump_every: u64,
    refreshes: AtomicU64,
}

impl<S: MeasurementSource> Coordinator<S> {
    pub fn new(source: S, catalog: Arc<ModelCatalog>, registry: Arc<DeviceRegistry>) -> Self {
        Self {
            source,
            catalog,
            registry,
            choices: RwLock::new(BTreeMap::new()),
            raw_dump_every: 12,
            refreshes: AtomicU64::new(0),
        }
    }

    /// Coordinator tracking the configured devices with their configured choices.
    pub fn from_config(source: S, catalog: Arc<ModelCatalog>, config: &Config) -> Result<Self> {
        let mut coordinator = Self::new(source, catalog, Arc::new(DeviceRegistry::new()));
        coordinator.raw_dump_every = config.polling.raw_dump_every.max(1);

        for device_id in &config.devices.ids {
            coordinator.track(TrackedDevice::new(device_id.clone()))?;
        }
        for (device_id, model_id) in &config.devices.model_choices {
            coordinator.set_choice(device_id, model_id)?;
        }
        Ok(coordinator)
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Number of refreshes run so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Track a device. Fails if it is bound to a model the catalog does not know.
    pub fn track(&self, device: TrackedDevice) -> Result<bool> {
        if let Some(model_id) = device.model_id()
            && !self.catalog.contains(model_id)
        {
            return Err(BridgeError::UnknownModel(model_id.to_string()));
        }
        debug!("Device {} registered", device.device_id);
        Ok(self.registry.upsert(device))
    }

    /// Remember which model to use when `device_id` turns out ambiguous.
    pub fn set_choice(&self, device_id: &str, model_id: &str) -> Result<()> {
        if !self.catalog.contains(model_id) {
            return Err(BridgeError::UnknownModel(model_id.to_string()));
        }
        self.choices
            .write()
            .insert(device_id.to_string(), model_id.to_string());
        Ok(())
    }

    pub fn choice(&self, device_id: &str) -> Option<String> {
        self.choices.read().get(device_id).cloned()
    }

    /// Fetch and evaluate every tracked device, in registry order.
    pub async fn refresh(&self) -> Result<Vec<DeviceReport>> {
        let devices = self.registry.list();
        let ids: Vec<String> = devices.iter().map(|d| d.device_id.clone()).collect();

        let count = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Refresh #{} for {} devices", count, ids.len());

        let fetched = self.source.fetch(&ids).await?;
        self.dump_raw(count, &fetched.raw);

        let reports = devices
            .iter()
            .map(|device| match fetched.record(&device.device_id) {
                Some(record) => evaluate(
                    &self.catalog,
                    record,
                    &device.binding,
                    self.choice(&device.device_id).as_deref(),
                ),
                None => {
                    warn!("Device {} not found in API response", device.device_id);
                    DeviceReport::Missing {
                        device_id: device.device_id.clone(),
                    }
                }
            })
            .collect();
        Ok(reports)
    }

    /// Evaluate every device of the account, tracked or not.
    pub async fn discover(&self) -> Result<Vec<DeviceReport>> {
        let fetched = self.source.discover().await?;
        info!("Discovered {} devices", fetched.records.len());

        Ok(fetched
            .records
            .iter()
            .map(|record| {
                let binding = self
                    .registry
                    .get(&record.device_id)
                    .map(|d| d.binding)
                    .unwrap_or(DeviceBinding::Detect);
                evaluate(
                    &self.catalog,
                    record,
                    &binding,
                    self.choice(&record.device_id).as_deref(),
                )
            })
            .collect())
    }

    fn dump_raw(&self, count: u64, raw: &Value) {
        if !should_dump(count, self.raw_dump_every) {
            return;
        }
        let kind = if count == 1 { "initial" } else { "periodic" };
        match serde_json::to_string_pretty(raw) {
            Ok(pretty) => info!("Raw API response ({} dump):\n{}", kind, pretty),
            Err(e) => warn!("Could not format raw API response: {}", e),
        }
    }
}

/// The first refresh and every `every`-th after it dump the raw response.
pub fn should_dump(count: u64, every: u64) -> bool {
    count == 1 || (every > 0 && count % every == 0)
}
