pub mod settings;
pub mod validator;

pub use settings::{
    BrokerUrl,
    Credentials,
    DeviceConfig,
    Model,
    OutputFormat,
    ReconnectPolicy,
    Settings,
    SUPPORTED_BAUD_RATES,
};
pub use validator::validate;
