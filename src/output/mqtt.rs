use async_trait::async_trait;
use log::{debug, error, info, trace, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::publisher::{BrokerLink, ConnectionState, PublishMessage};
use crate::config::DeviceConfig;
use crate::utils::error::{BridgeError, PublishError};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CHANNEL_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkStatus {
    state: ConnectionState,
    last_error: Option<String>,
}

impl LinkStatus {
    fn connected() -> Self {
        Self {
            state: ConnectionState::Connected,
            last_error: None,
        }
    }

    fn disconnected(reason: Option<String>) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_error: reason,
        }
    }
}

/// MQTT connection backed by rumqttc.
///
/// A background task drives the event loop (keep-alive, acks, outgoing
/// packets) and reports connection state through a watch channel. After a
/// connection error the task parks until the publisher asks for a new
/// attempt, so reconnects only happen when the publisher decides to.
pub struct MqttLink {
    client: AsyncClient,
    status: watch::Receiver<LinkStatus>,
    connect_requests: Arc<Notify>,
    connect_timeout: Duration,
    driver: JoinHandle<()>,
}

impl MqttLink {
    /// Creates the client and waits for the first CONNACK.
    pub async fn connect(config: &DeviceConfig) -> Result<Self, BridgeError> {
        info!("📻 Connecting to MQTT broker {} as '{}'", config.broker, config.client_id);

        let mut options = MqttOptions::new(&config.client_id, &config.broker.host, config.broker.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        if let Some(credentials) = &config.credentials {
            options.set_credentials(&credentials.username, &credentials.password);
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(LinkStatus::disconnected(None));
        let connect_requests = Arc::new(Notify::new());
        let driver = tokio::spawn(drive_event_loop(event_loop, status_tx, connect_requests.clone()));

        let mut link = Self {
            client,
            status: status_rx,
            connect_requests,
            connect_timeout: config.connect_timeout,
            driver,
        };

        link.attempt_connect().await.map_err(|e| {
            error!("❌ Failed to connect to MQTT broker {}: {}", config.broker, e);
            BridgeError::Connectivity(format!("MQTT broker {}: {}", config.broker, e))
        })?;

        info!("✅ MQTT client connected");
        Ok(link)
    }

    async fn attempt_connect(&mut self) -> Result<(), PublishError> {
        self.status.borrow_and_update();
        self.connect_requests.notify_one();

        let outcome = tokio::time::timeout(self.connect_timeout, self.status.changed()).await;
        match outcome {
            Err(_) => Err(PublishError::ReconnectFailed(format!(
                "no CONNACK within {}s",
                self.connect_timeout.as_secs()
            ))),
            Ok(Err(_)) => Err(PublishError::ReconnectFailed("MQTT event loop stopped".to_string())),
            Ok(Ok(())) => {
                let status = self.status.borrow().clone();
                match status.state {
                    ConnectionState::Connected => Ok(()),
                    ConnectionState::Disconnected => Err(PublishError::ReconnectFailed(
                        status.last_error.unwrap_or_else(|| "broker closed the connection".to_string()),
                    )),
                }
            }
        }
    }
}

#[async_trait]
impl BrokerLink for MqttLink {
    fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    async fn reconnect(&mut self) -> Result<(), PublishError> {
        self.attempt_connect().await
    }

    async fn send(&mut self, message: PublishMessage) -> Result<(), PublishError> {
        // Never wait on a full request queue; readings are not buffered.
        self.client
            .try_publish(message.topic, message.qos, message.retain, message.payload)?;
        Ok(())
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    status_tx: watch::Sender<LinkStatus>,
    connect_requests: Arc<Notify>,
) {
    loop {
        connect_requests.notified().await;
        debug!("MQTT connection attempt");

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("MQTT connection established");
                    status_tx.send_replace(LinkStatus::connected());
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("MQTT server sent disconnect");
                    status_tx.send_replace(LinkStatus::disconnected(Some(
                        "MQTT server sent disconnect".to_string(),
                    )));
                    break;
                }
                Ok(Event::Incoming(Packet::PingResp)) => {
                    trace!("MQTT ping response received");
                }
                Ok(event) => {
                    trace!("MQTT event: {:?}", event);
                }
                Err(e) => {
                    warn!("⚠️ MQTT event loop error: {}", e);
                    status_tx.send_replace(LinkStatus::disconnected(Some(e.to_string())));
                    break;
                }
            }
        }

        if status_tx.is_closed() {
            debug!("MQTT link dropped, stopping event loop");
            return;
        }
    }
}
