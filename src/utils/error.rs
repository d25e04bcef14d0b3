use thiserror::Error;

use crate::config::Model;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connectivity(String),

    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("End of stream: expected {expected} bytes from device, received {received}")]
    EndOfStream { expected: usize, received: usize },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

impl BridgeError {
    /// Whether the poll loop has to stop on this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            BridgeError::Publish(e) => e.is_fatal(),
            _ => true,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid baud rate {0}")]
    UnsupportedBaudRate(u32),

    #[error("invalid Geiger counter model '{0}'")]
    UnknownModel(String),

    #[error("no serial ports found")]
    NoSerialPorts,

    #[error("serial port '{0}' not found")]
    PortNotFound(String),

    #[error("max. baud rate for model {model} is 57600, but using {baud_rate}")]
    BaudRateTooHigh { model: Model, baud_rate: u32 },

    #[error("poll interval must be at least one second")]
    InvalidInterval,

    #[error("invalid broker URL '{0}'")]
    InvalidBrokerUrl(String),

    #[error("invalid topic '{0}'")]
    InvalidTopic(String),

    #[error("invalid reconnect policy '{0}'")]
    UnknownReconnectPolicy(String),

    #[error("config file {path}: {message}")]
    File { path: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid byte length {0}, expected 2 or 4")]
    InvalidWidth(usize),

    #[error("response has {actual} bytes but the configured model answers with {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("{0} unexpected bytes pending before query; device model does not match configuration")]
    StaleBytes(u32),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("broker connection lost")]
    Disconnected,

    #[error("reconnect to broker failed: {0}")]
    ReconnectFailed(String),

    #[error("MQTT client error: {0}")]
    Client(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PublishError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PublishError::Disconnected | PublishError::Serialization(_))
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<rumqttc::ClientError> for PublishError {
    fn from(err: rumqttc::ClientError) -> Self {
        PublishError::Client(err.to_string())
    }
}

impl From<serialport::Error> for BridgeError {
    fn from(err: serialport::Error) -> Self {
        BridgeError::Connectivity(format!("Serial port error: {}", err))
    }
}
