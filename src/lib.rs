//! GQ GMC Geiger counter to MQTT bridge
//!
//! Polls the counter over its serial link with `<GETCPM>>`, decodes the
//! big-endian counts-per-minute answer and republishes it to an MQTT topic
//! at a fixed cadence.

pub mod cli;
pub mod config;
pub mod output;
pub mod protocol;
pub mod serial;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::{validate, DeviceConfig, Model, OutputFormat, ReconnectPolicy, Settings};
pub use output::{BrokerLink, ConnectionState, MqttLink, PublishMessage, Publisher};
pub use protocol::{decode, Reading};
pub use serial::{CounterLink, SerialTransport};
pub use services::PollLoop;
pub use utils::error::{BridgeError, ConfigError, DecodeError, PublishError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
