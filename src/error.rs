use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Mobile Alerts API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mobile Alerts API returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Mobile Alerts API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Mobile Alerts API request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid model catalog: {0}")]
    InvalidCatalog(String),

    #[error("Unknown device model: {0}")]
    UnknownModel(String),

    #[error("Model {model_id} is not a candidate for device {device_id}")]
    InvalidModelChoice { device_id: String, model_id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
