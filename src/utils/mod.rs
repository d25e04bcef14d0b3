pub mod error;

pub use error::{BridgeError, ConfigError, DecodeError, PublishError};
