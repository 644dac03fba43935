//! Wire types of the Mobile Alerts `lastmeasurement` endpoint.

use crate::error::{BridgeError, Result};
use crate::inference::Measurement;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body. `deviceids` is a comma separated list; empty with a phone id
/// lists every device of the account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastMeasurementRequest {
    pub deviceids: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phoneid: Option<String>,
}

impl LastMeasurementRequest {
    pub fn new(device_ids: &[String], phone_id: &str) -> Self {
        Self {
            deviceids: device_ids.join(","),
            phoneid: (!phone_id.is_empty()).then(|| phone_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LastMeasurementResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errorcode: Option<Value>,
    #[serde(default)]
    pub errormessage: Option<String>,
    #[serde(default)]
    pub devices: Option<Vec<DeviceRecord>>,
}

/// One device as reported by the API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceRecord {
    #[serde(rename = "deviceid")]
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastseen: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowbattery: Option<Value>,
    #[serde(default)]
    pub measurement: Measurement,
    /// Anything else the API sends along (device type codes, settings, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceRecord {
    pub fn new(device_id: impl Into<String>, measurement: Measurement) -> Self {
        Self {
            device_id: device_id.into(),
            lastseen: None,
            lowbattery: None,
            measurement,
            extra: Map::new(),
        }
    }
}

/// Device records of a successful response.
///
/// A failed response becomes [`BridgeError::Api`]; a successful one without
/// a `devices` list yields no records.
pub fn interpret(response: LastMeasurementResponse) -> Result<Vec<DeviceRecord>> {
    if !response.success {
        let code = match response.errorcode {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        };
        return Err(BridgeError::Api {
            code,
            message: response
                .errormessage
                .unwrap_or_else(|| "no error message".to_string()),
        });
    }

    match response.devices {
        Some(devices) => Ok(devices),
        None => {
            warn!("API response missing 'devices' key");
            Ok(Vec::new())
        }
    }
}

/// Parse a JSON document into device records.
///
/// Accepts a full API response, a single device record, a list of records,
/// or a bare measurement object (recorded under `device_id`).
pub fn parse_records(value: Value, device_id: &str) -> Result<Vec<DeviceRecord>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| Ok(serde_json::from_value(item)?))
            .collect(),
        Value::Object(map) if map.contains_key("success") || map.contains_key("devices") => {
            interpret(serde_json::from_value(Value::Object(map))?)
        }
        Value::Object(map) if map.contains_key("deviceid") => {
            Ok(vec![serde_json::from_value(Value::Object(map))?])
        }
        Value::Object(map) => Ok(vec![DeviceRecord::new(device_id, map)]),
        other => Err(BridgeError::InvalidConfig(format!(
            "expected a JSON object or array, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body() {
        let ids = vec!["0E7EA4A71203".to_string(), "107EEEB46F02".to_string()];
        let body = serde_json::to_value(LastMeasurementRequest::new(&ids, "123456789")).unwrap();
        assert_eq!(
            body,
            json!({"deviceids": "0E7EA4A71203,107EEEB46F02", "phoneid": "123456789"})
        );

        let body = serde_json::to_value(LastMeasurementRequest::new(&ids[..1], "")).unwrap();
        assert_eq!(body, json!({"deviceids": "0E7EA4A71203"}));

        let body = serde_json::to_value(LastMeasurementRequest::new(&[], "123456789")).unwrap();
        assert_eq!(body, json!({"deviceids": "", "phoneid": "123456789"}));
    }

    #[test]
    fn test_successful_response() {
        let response: LastMeasurementResponse = serde_json::from_value(json!({
            "success": true,
            "devices": [{
                "deviceid": "0E7EA4A71203",
                "lastseen": 1704067205,
                "lowbattery": false,
                "devicetypeid": 14,
                "measurement": {"idx": 1, "ts": 1704067200, "c": 1704067205, "t1": 22.5}
            }]
        }))
        .unwrap();
        let records = interpret(response).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device_id, "0E7EA4A71203");
        assert_eq!(records[0].lowbattery, Some(json!(false)));
        assert_eq!(records[0].measurement.get("t1"), Some(&json!(22.5)));
        assert_eq!(records[0].extra.get("devicetypeid"), Some(&json!(14)));
    }

    #[test]
    fn test_failed_response() {
        let response: LastMeasurementResponse = serde_json::from_value(json!({
            "success": false, "errorcode": 1003, "errormessage": "invalid phone id"
        }))
        .unwrap();
        match interpret(response).unwrap_err() {
            BridgeError::Api { code, message } => {
                assert_eq!(code, "1003");
                assert_eq!(message, "invalid phone id");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_devices_is_empty() {
        let response: LastMeasurementResponse =
            serde_json::from_value(json!({"success": true})).unwrap();
        assert!(interpret(response).unwrap().is_empty());
    }

    #[test]
    fn test_parse_records_shapes() {
        let bare = parse_records(json!({"t1": 22.5, "h": 40}), "dev").unwrap();
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0].device_id, "dev");

        let single = parse_records(
            json!({"deviceid": "ABC", "measurement": {"w": false}}),
            "dev",
        )
        .unwrap();
        assert_eq!(single[0].device_id, "ABC");

        let list = parse_records(
            json!([{"deviceid": "A"}, {"deviceid": "B", "measurement": {"t1": 1}}]),
            "dev",
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].measurement.is_empty());

        let full = parse_records(
            json!({"success": true, "devices": [{"deviceid": "C", "measurement": {}}]}),
            "dev",
        )
        .unwrap();
        assert_eq!(full[0].device_id, "C");

        assert!(parse_records(json!(42), "dev").is_err());
    }
}
