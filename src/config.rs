use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{BridgeError, Result};

/// Default endpoint of the Mobile Alerts "last measurement" API.
pub const DEFAULT_API_URL: &str = "https://www.data199.com/api/pv1/device/lastmeasurement";

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub devices: DevicesConfig,
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub url: String,
    /// Phone id of the Mobile Alerts app account. Empty for id-only lookups.
    pub phone_id: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// Device ids polled in one batched request.
    pub ids: Vec<String>,
    /// Explicit model choices for devices whose signature is ambiguous.
    pub model_choices: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval used by an external scheduler; the bridge itself polls on demand.
    pub scan_interval_minutes: u64,
    /// Dump the raw API response every N refreshes (the first refresh always dumps).
    pub raw_dump_every: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                url: DEFAULT_API_URL.to_string(),
                phone_id: String::new(),
                timeout_secs: 30,
            },
            devices: DevicesConfig::default(),
            polling: PollingConfig {
                scan_interval_minutes: 10,
                raw_dump_every: 12,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("MOBILE_ALERTS_API_URL") {
            config.api.url = url;
        }
        if let Ok(phone_id) = std::env::var("MOBILE_ALERTS_PHONE_ID") {
            config.api.phone_id = phone_id.trim().to_string();
        }
        if let Ok(timeout) = std::env::var("MOBILE_ALERTS_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(t) => config.api.timeout_secs = t,
                Err(_) => warn!("Ignoring invalid MOBILE_ALERTS_TIMEOUT_SECS: {}", timeout),
            }
        }

        if let Ok(devices) = std::env::var("MOBILE_ALERTS_DEVICES") {
            config.devices.ids = parse_device_list(&devices);
        }
        if let Ok(choices) = std::env::var("MOBILE_ALERTS_MODELS") {
            match parse_model_choices(&choices) {
                Ok(parsed) => config.devices.model_choices = parsed,
                Err(e) => warn!("Ignoring MOBILE_ALERTS_MODELS: {}", e),
            }
        }

        if let Ok(minutes) = std::env::var("MOBILE_ALERTS_SCAN_MINUTES") {
            match minutes.parse() {
                Ok(m) => config.polling.scan_interval_minutes = m,
                Err(_) => warn!("Ignoring invalid MOBILE_ALERTS_SCAN_MINUTES: {}", minutes),
            }
        }
        if let Ok(every) = std::env::var("MOBILE_ALERTS_RAW_DUMP_EVERY") {
            match every.parse::<u64>() {
                Ok(n) if n > 0 => config.polling.raw_dump_every = n,
                _ => warn!("Ignoring invalid MOBILE_ALERTS_RAW_DUMP_EVERY: {}", every),
            }
        }

        config
    }
}

/// Split a comma separated device id list, dropping blanks and duplicates.
pub fn parse_device_list(value: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in value.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Parse `DEVICEID=MODELID` pairs separated by commas.
pub fn parse_model_choices(value: &str) -> Result<BTreeMap<String, String>> {
    let mut choices = BTreeMap::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((device_id, model_id)) = pair.split_once('=') else {
            return Err(BridgeError::InvalidConfig(format!(
                "expected DEVICEID=MODELID, got '{}'",
                pair
            )));
        };
        let (device_id, model_id) = (device_id.trim(), model_id.trim());
        if device_id.is_empty() || model_id.is_empty() {
            return Err(BridgeError::InvalidConfig(format!(
                "empty device or model id in '{}'",
                pair
            )));
        }
        choices.insert(device_id.to_string(), model_id.to_string());
    }
    Ok(choices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.url, DEFAULT_API_URL);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.polling.scan_interval_minutes, 10);
        assert_eq!(config.polling.raw_dump_every, 12);
        assert!(config.devices.ids.is_empty());
    }

    #[test]
    fn test_parse_dotenv() {
        let content = "# comment\n\nPHONE = 123 456\nQUOTED=\"a b\"\nSINGLE='x'\nnoequals\n";
        let pairs = parse_dotenv(content);
        assert_eq!(
            pairs,
            vec![("PHONE", "123 456"), ("QUOTED", "a b"), ("SINGLE", "x")]
        );
    }

    #[test]
    fn test_parse_device_list() {
        let ids = parse_device_list(" 090005AC99E1, ,107EEEB46F00,090005AC99E1 ");
        assert_eq!(ids, vec!["090005AC99E1", "107EEEB46F00"]);
        assert!(parse_device_list("").is_empty());
    }

    #[test]
    fn test_parse_model_choices() {
        let choices = parse_model_choices("107EEEB46F00=MA10300, 107EEEB46F02 = MA10350").unwrap();
        assert_eq!(choices.len(), 2);
        assert_eq!(choices["107EEEB46F02"], "MA10350");

        assert!(parse_model_choices("107EEEB46F00").is_err());
        assert!(parse_model_choices("=MA10300").is_err());
        assert!(parse_model_choices("").unwrap().is_empty());
    }
}
