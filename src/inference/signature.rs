//! Field classifier.
//!
//! Reduces a raw measurement object to its signature: the set of field names
//! that say something about what the device can measure. Metadata fields and
//! alert/threshold flags are dropped.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// One device's decoded `measurement` object.
pub type Measurement = Map<String, Value>;

/// Fields every device reports regardless of model.
pub const METADATA_FIELDS: [&str; 4] = ["idx", "ts", "c", "lb"];

/// Suffixes of alert and threshold flag fields (e.g. `t1hi`, `hlo`, `t1hise`).
pub const ALERT_SUFFIXES: [&str; 12] = [
    "hi", "lo", "hise", "lose", "hiee", "loee", "his", "los", "aactive", "as", "active", "st",
];

pub fn is_metadata_field(field: &str) -> bool {
    METADATA_FIELDS.contains(&field)
}

pub fn is_alert_field(field: &str) -> bool {
    ALERT_SUFFIXES.iter().any(|suffix| field.ends_with(suffix))
}

/// Cleaned set of capability fields of one reading.
///
/// Backed by an ordered set so that logging and iteration are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    fields: BTreeSet<String>,
}

impl Signature {
    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// True when every one of `fields` is present in this signature.
    pub fn contains_all(&self, fields: &BTreeSet<String>) -> bool {
        fields.is_subset(&self.fields)
    }
}

impl<S: AsRef<str>> FromIterator<S> for Signature {
    /// Builds a signature from field names, applying the same filtering as [`classify`].
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        classify_fields(iter)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, "}}")
    }
}

/// Extract the signature of a raw measurement. Never fails; an empty or
/// metadata-only measurement gives an empty signature.
pub fn classify(measurement: &Measurement) -> Signature {
    classify_fields(measurement.keys())
}

/// Same as [`classify`] for a bare list of field names.
pub fn classify_fields<I, S>(fields: I) -> Signature
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let fields = fields
        .into_iter()
        .map(|field| field.as_ref().to_string())
        .filter(|field| !is_metadata_field(field) && !is_alert_field(field))
        .collect();
    Signature { fields }
}
