//! Model catalog.
//!
//! The Mobile Alerts API does not say which product a device is. The catalog
//! lists every known model with the measurement fields it reports, and the
//! per-model exceptions where a field means something other than its usual
//! category (the MA 10350 reports water presence under `t2`).

use super::signature::{is_alert_field, is_metadata_field};
use crate::error::{BridgeError, Result};
use crate::sensors::SensorCategory;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

/// Manufacturer used when a definition does not name one.
pub const DEFAULT_MANUFACTURER: &str = "Mobile Alerts";

/// Immutable description of one device model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDefinition {
    pub model_id: String,
    /// Product name as printed by the vendor, e.g. "MA 10300 / MA 10320".
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub manufacturer: String,
    pub declared_fields: BTreeSet<String>,
}

impl ModelDefinition {
    pub fn new<I, S>(
        model_id: impl Into<String>,
        display_name: impl Into<String>,
        fields: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model_id = model_id.into();
        Self {
            name: model_id.clone(),
            model_id,
            display_name: display_name.into(),
            description: String::new(),
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            declared_fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    pub fn declares(&self, field: &str) -> bool {
        self.declared_fields.contains(field)
    }
}

/// A field that means something else for one specific model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOverride {
    pub model_id: String,
    pub field: String,
    pub category: SensorCategory,
}

impl FieldOverride {
    pub fn new(
        model_id: impl Into<String>,
        field: impl Into<String>,
        category: SensorCategory,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            field: field.into(),
            category,
        }
    }
}

/// Read-only table of known models, in declaration order.
///
/// Declaration order is significant: it is the order in which tied match
/// candidates are reported.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelDefinition>,
    overrides: Vec<FieldOverride>,
}

impl ModelCatalog {
    /// Build a catalog, rejecting empty field sets, metadata or alert fields,
    /// duplicate model ids and overrides that do not refer to a declared field
    /// of a known model.
    pub fn new(models: Vec<ModelDefinition>, overrides: Vec<FieldOverride>) -> Result<Self> {
        let mut ids = HashSet::new();
        for model in &models {
            if model.declared_fields.is_empty() {
                return Err(BridgeError::InvalidCatalog(format!(
                    "model {} declares no fields",
                    model.model_id
                )));
            }
            if let Some(field) = model
                .declared_fields
                .iter()
                .find(|f| is_metadata_field(f) || is_alert_field(f))
            {
                return Err(BridgeError::InvalidCatalog(format!(
                    "model {} declares field {} which is never part of a signature",
                    model.model_id, field
                )));
            }
            if !ids.insert(model.model_id.as_str()) {
                return Err(BridgeError::InvalidCatalog(format!(
                    "duplicate model id {}",
                    model.model_id
                )));
            }
        }

        let mut keys = HashSet::new();
        for o in &overrides {
            let Some(model) = models.iter().find(|m| m.model_id == o.model_id) else {
                return Err(BridgeError::InvalidCatalog(format!(
                    "override for unknown model {}",
                    o.model_id
                )));
            };
            if !model.declares(&o.field) {
                return Err(BridgeError::InvalidCatalog(format!(
                    "override for field {} not declared by {}",
                    o.field, o.model_id
                )));
            }
            if !keys.insert((o.model_id.as_str(), o.field.as_str())) {
                return Err(BridgeError::InvalidCatalog(format!(
                    "duplicate override for {}/{}",
                    o.model_id, o.field
                )));
            }
        }

        Ok(Self { models, overrides })
    }

    /// Catalog of all supported Mobile Alerts and TFA models.
    pub fn builtin() -> Self {
        Self {
            models: MODELS.iter().map(ModelSpec::to_definition).collect(),
            overrides: OVERRIDES
                .iter()
                .map(|(model_id, field, category)| FieldOverride::new(*model_id, *field, *category))
                .collect(),
        }
    }

    /// Process-wide instance of [`ModelCatalog::builtin`], built on first use.
    pub fn shared() -> &'static ModelCatalog {
        static CATALOG: OnceLock<ModelCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::builtin)
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.model_id == model_id)
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.get(model_id).is_some()
    }

    /// Models in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model-specific category for `field`, or `None` if the default applies.
    pub fn override_for(&self, model_id: &str, field: &str) -> Option<SensorCategory> {
        self.overrides
            .iter()
            .find(|o| o.model_id == model_id && o.field == field)
            .map(|o| o.category)
    }

    /// Category of `field` when reported by `model_id`, overrides applied.
    pub fn category_for(&self, model_id: &str, field: &str) -> SensorCategory {
        self.override_for(model_id, field)
            .unwrap_or_else(|| crate::sensors::default_category(field))
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

struct ModelSpec {
    model_id: &'static str,
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    manufacturer: &'static str,
    fields: &'static [&'static str],
}

impl ModelSpec {
    fn to_definition(&self) -> ModelDefinition {
        ModelDefinition::new(self.model_id, self.display_name, self.fields.iter().copied())
            .with_name(self.name)
            .with_description(self.description)
            .with_manufacturer(self.manufacturer)
    }
}

// Measurement keys: t1 internal temperature, t2..t4 cable/external temperature,
// h/h1..h4 humidity, ap air pressure, r rainfall, rf rain flip counter,
// ws/wg/wd wind speed/gust/direction, w window contact, ppm CO2,
// kpNt/kpNc key press type/counter.
//
// MA 10870 (voltage monitor) is left out: its measurement keys are unknown.
const MODELS: &[ModelSpec] = &[
    ModelSpec {
        model_id: "MA10100",
        name: "MA 10100",
        display_name: "Wireless Thermometer",
        description: "Temperature sensor",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1"],
    },
    ModelSpec {
        model_id: "MA10101",
        name: "MA 10101",
        display_name: "Wireless Thermometer with Cable Sensor",
        description: "Internal and external temperature",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "t2"],
    },
    ModelSpec {
        model_id: "MA10200",
        name: "MA 10200",
        display_name: "Wireless Thermo-Hygrometer",
        description: "Temperature and humidity",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "h"],
    },
    ModelSpec {
        model_id: "MA10241",
        name: "MA 10241",
        display_name: "Wireless Thermo-Hygrometer",
        description: "Temperature and humidity",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "h"],
    },
    ModelSpec {
        model_id: "MA10230",
        name: "MA 10230",
        display_name: "Wireless Room Climate Station",
        description: "Temperature, humidity and humidity averages (3h, 24h, 7d, 30d)",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "h", "h3havg", "h24havg", "h7davg", "h30davg"],
    },
    ModelSpec {
        model_id: "MA10238",
        name: "MA 10238",
        display_name: "Wireless Air Pressure Monitor",
        description: "Temperature, humidity and air pressure",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "h", "ap"],
    },
    ModelSpec {
        model_id: "MA10300",
        name: "MA 10300 / MA 10320",
        display_name: "Wireless Thermo-Hygrometer with Cable Sensor",
        description: "Temperature (internal/cable) and humidity",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "t2", "h"],
    },
    ModelSpec {
        model_id: "MA10350",
        name: "MA 10350",
        display_name: "Wireless Thermo-Hygrometer with Water Detector",
        description: "Temperature, humidity and water detection (t2 indicates water presence)",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "t2", "h"],
    },
    ModelSpec {
        model_id: "MA10402",
        name: "MA 10402",
        display_name: "Wireless CO2 Monitor",
        description: "Temperature, humidity and CO2 concentration",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "t2", "h", "ppm"],
    },
    ModelSpec {
        model_id: "MA10450",
        name: "MA 10450",
        display_name: "Wireless Temperature Station",
        description: "Humidity sensor",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["h1"],
    },
    ModelSpec {
        model_id: "MA10650",
        name: "MA 10650",
        display_name: "Wireless Rain Gauge",
        description: "Temperature, rainfall and flip counter",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "r", "rf"],
    },
    ModelSpec {
        model_id: "MA10660",
        name: "MA 10660",
        display_name: "Wireless Anemometer",
        description: "Wind speed, gust and direction",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["ws", "wg", "wd"],
    },
    ModelSpec {
        model_id: "MA10700",
        name: "MA 10700",
        display_name: "Wireless Thermo-Hygrometer with Pool Sensor",
        description: "Temperature, humidity and pool temperature",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["t1", "t2", "h1"],
    },
    ModelSpec {
        model_id: "MA10800",
        name: "MA 10800",
        display_name: "Wireless Contact Sensor",
        description: "Window/door contact detection",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &["w"],
    },
    ModelSpec {
        model_id: "MA10880",
        name: "MA 10880",
        display_name: "Wireless Switch",
        description: "4-channel wireless switch with key press monitoring",
        manufacturer: DEFAULT_MANUFACTURER,
        fields: &[
            "kp1t", "kp1c", "kp2t", "kp2c", "kp3t", "kp3c", "kp4t", "kp4c",
        ],
    },
    ModelSpec {
        model_id: "TFA_30.3060.01:IT",
        name: "TFA 30.3060.01.IT KLIMA@HOME",
        display_name: "Wireless Thermo-Hygrometer with 3 sensors",
        description: "Base station plus three remote thermo-hygro sensors",
        manufacturer: "TFA Dostmann",
        fields: &["t1", "t2", "t3", "t4", "h1", "h2", "h3", "h4"],
    },
];

const OVERRIDES: &[(&str, &str, SensorCategory)] = &[("MA10350", "t2", SensorCategory::Water)];
