pub mod formatters;
pub mod mqtt;
pub mod publisher;

pub use formatters::{CpmDocument, JsonFormatter, PayloadFormatter, PlainFormatter};
pub use mqtt::MqttLink;
pub use publisher::{BrokerLink, ConnectionState, PublishMessage, Publisher};
