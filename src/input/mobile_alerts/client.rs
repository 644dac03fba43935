//! HTTP client for the Mobile Alerts cloud API.

use super::types::{DeviceRecord, LastMeasurementRequest, LastMeasurementResponse, interpret};
use crate::config::ApiConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Devices returned by one request, with the untouched response body.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub raw: Value,
    pub records: Vec<DeviceRecord>,
}

impl Fetched {
    /// Interpret a raw response body.
    pub fn from_raw(raw: Value) -> Result<Self> {
        let response: LastMeasurementResponse = serde_json::from_value(raw.clone())?;
        let records = interpret(response)?;
        Ok(Self { raw, records })
    }

    pub fn record(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.device_id == device_id)
    }
}

/// Anything that can deliver the latest measurement of a set of devices.
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Latest measurement of every device in `device_ids`, in one request.
    async fn fetch(&self, device_ids: &[String]) -> Result<Fetched>;

    /// Every device known to the account.
    async fn discover(&self) -> Result<Fetched>;
}

pub struct MobileAlertsClient {
    client: Client,
    url: String,
    phone_id: String,
    timeout_secs: u64,
}

impl MobileAlertsClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            phone_id: config.phone_id.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, request: &LastMeasurementRequest) -> Result<Value> {
        debug!("API request: {}", serde_json::to_string(request)?);

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            error!("API error: HTTP {}, URL: {}", status.as_u16(), self.url);
            return Err(BridgeError::HttpStatus(status.as_u16()));
        }

        response.json().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            warn!("Timeout connecting to Mobile Alerts API");
            BridgeError::Timeout(self.timeout_secs)
        } else {
            warn!("Connection error to Mobile Alerts API: {}", e);
            BridgeError::Http(e)
        }
    }
}

#[async_trait]
impl MeasurementSource for MobileAlertsClient {
    async fn fetch(&self, device_ids: &[String]) -> Result<Fetched> {
        if device_ids.is_empty() {
            debug!("No devices registered for data fetching");
            return Ok(Fetched {
                raw: Value::Null,
                records: Vec::new(),
            });
        }

        let raw = self
            .post(&LastMeasurementRequest::new(device_ids, &self.phone_id))
            .await?;
        let fetched = Fetched::from_raw(raw)?;
        debug!("Fetched data for {} devices", fetched.records.len());
        Ok(fetched)
    }

    async fn discover(&self) -> Result<Fetched> {
        if self.phone_id.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "device discovery needs a phone id".to_string(),
            ));
        }

        let raw = self
            .post(&LastMeasurementRequest::new(&[], &self.phone_id))
            .await?;
        Fetched::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(phone_id: &str) -> ApiConfig {
        ApiConfig {
            url: "http://127.0.0.1:9/api/pv1/device/lastmeasurement".to_string(),
            phone_id: phone_id.to_string(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_fetched_from_raw() {
        let fetched = Fetched::from_raw(json!({
            "success": true,
            "devices": [
                {"deviceid": "A", "measurement": {"t1": 1.0}},
                {"deviceid": "B", "measurement": {"w": true}}
            ]
        }))
        .unwrap();
        assert_eq!(fetched.records.len(), 2);
        assert!(fetched.record("B").is_some());
        assert!(fetched.record("C").is_none());
        assert_eq!(fetched.raw["success"], json!(true));
    }

    #[test]
    fn test_fetched_from_failed_raw() {
        let err = Fetched::from_raw(json!({"success": false, "errorcode": "E1"})).unwrap_err();
        assert!(matches!(err, BridgeError::Api { .. }));
    }

    #[tokio::test]
    async fn test_fetch_without_devices_skips_request() {
        let client = MobileAlertsClient::new(&config("")).unwrap();
        let fetched = client.fetch(&[]).await.unwrap();
        assert!(fetched.records.is_empty());
        assert_eq!(fetched.raw, Value::Null);
    }

    #[tokio::test]
    async fn test_discover_needs_phone_id() {
        let client = MobileAlertsClient::new(&config("")).unwrap();
        assert!(matches!(
            client.discover().await.unwrap_err(),
            BridgeError::InvalidConfig(_)
        ));
    }
}
