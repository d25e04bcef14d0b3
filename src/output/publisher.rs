use async_trait::async_trait;
use log::{debug, info, warn};
use rumqttc::QoS;

use super::formatters::{formatter_for, PayloadFormatter};
use crate::config::{DeviceConfig, ReconnectPolicy};
use crate::protocol::Reading;
use crate::utils::error::PublishError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// One outgoing broker message. Built per reading, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl PublishMessage {
    /// At-most-once, not retained.
    pub fn new(topic: &str, payload: String) -> Self {
        Self {
            topic: topic.to_string(),
            payload: payload.into_bytes(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }
}

/// Broker side of the bridge.
#[async_trait]
pub trait BrokerLink: Send {
    fn state(&self) -> ConnectionState;
    async fn reconnect(&mut self) -> Result<(), PublishError>;
    async fn send(&mut self, message: PublishMessage) -> Result<(), PublishError>;
}

pub struct Publisher {
    link: Box<dyn BrokerLink>,
    formatter: Box<dyn PayloadFormatter>,
    topic: String,
    policy: ReconnectPolicy,
    published: u64,
}

impl Publisher {
    pub fn new(link: Box<dyn BrokerLink>, config: &DeviceConfig) -> Self {
        let formatter = formatter_for(config.output_format, config.interval_seconds);
        info!(
            "📤 Publishing {} payloads to '{}' (reconnect policy: {:?})",
            formatter.name(),
            config.topic,
            config.reconnect_policy
        );

        Self {
            link,
            formatter,
            topic: config.topic.clone(),
            policy: config.reconnect_policy,
            published: 0,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn published_count(&self) -> u64 {
        self.published
    }

    pub async fn publish(&mut self, reading: &Reading) -> Result<(), PublishError> {
        self.ensure_connected().await?;

        let payload = self.formatter.format(reading)?;
        debug!("📻 Payload for '{}': {}", self.topic, payload);

        self.link.send(PublishMessage::new(&self.topic, payload)).await?;
        self.published += 1;
        Ok(())
    }

    async fn ensure_connected(&mut self) -> Result<(), PublishError> {
        if self.link.state() == ConnectionState::Connected {
            return Ok(());
        }

        match self.policy {
            ReconnectPolicy::Strict => Err(PublishError::Disconnected),
            ReconnectPolicy::Reconnect => {
                warn!("⚠️ Broker connection lost, reconnecting...");
                self.link.reconnect().await?;
                info!("✅ Reconnected to broker");
                Ok(())
            }
        }
    }
}
