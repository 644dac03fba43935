//! Primary measurement key detection for flat (pre-model) device entries.
//!
//! Older configurations bind a device to a single measurement key ("t1",
//! "h", "ws", ...) instead of a model. This picks that key from a signature,
//! most specific device family first.

use super::signature::Signature;
use log::warn;

const MULTI_SENSOR: [&str; 8] = ["t1", "t2", "t3", "t4", "h1", "h2", "h3", "h4"];
const KEY_PRESS_TYPES: [&str; 4] = ["kp1t", "kp2t", "kp3t", "kp4t"];
const SMOKE_DETECTORS: [&str; 4] = ["a1", "a2", "a3", "a4"];

/// Key of a flat key-press switch entry. It stands for every `kpNt`/`kpNc`
/// pair in the measurement, not for a field of its own.
pub const KEY_PRESS_FIELD: &str = "sc";

/// Primary key of a signature, or `None` if the device family is unknown.
pub fn primary_field(signature: &Signature) -> Option<&'static str> {
    let has = |field: &str| signature.contains(field);
    let has_all = |fields: &[&str]| fields.iter().all(|f| signature.contains(f));
    let has_any = |fields: &[&str]| fields.iter().any(|f| signature.contains(f));

    let field = if has_all(&MULTI_SENSOR) {
        "t1"
    } else if has_any(&KEY_PRESS_TYPES) {
        KEY_PRESS_FIELD
    } else if has_all(&["t1", "h"]) && has_any(&["h3havg", "h24havg"]) {
        "h"
    } else if has_all(&["t1", "t2", "h", "h2"]) {
        "h2"
    } else if has_all(&["t1", "t2", "h", "ppm"]) {
        "ppm"
    } else if has("r") || has("rf") {
        "r"
    } else if has_any(&["ws", "wg", "wd"]) {
        "ws"
    } else if has("w") && signature.len() == 1 {
        "w"
    } else if has_all(&["t1", "h", "ap"]) {
        "ap"
    } else if has("t1") && has_any(&SMOKE_DETECTORS) {
        "t1"
    } else if has_all(&["t1", "t2"]) {
        "t2"
    } else if has_all(&["t1", "h"]) {
        "h"
    } else if has("t1") && signature.len() == 1 {
        "t1"
    } else {
        warn!(
            "Could not detect Mobile Alerts device type. Raw measurement keys: {}. \
             This might be a new device type, please report it.",
            signature
        );
        return None;
    };

    Some(field)
}
