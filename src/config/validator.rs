use log::debug;
use std::time::Duration;

use super::settings::{
    BrokerUrl, Credentials, DeviceConfig, Model, OutputFormat, ReconnectPolicy, Settings,
    DEFAULT_CLIENT_ID, DEFAULT_CONNECT_TIMEOUT_SECONDS, MAX_LEGACY_BAUD_RATE,
    SUPPORTED_BAUD_RATES,
};
use crate::utils::error::ConfigError;

/// Checks operator input against the supported device matrix and the ports
/// present on this host. Runs before any serial or broker I/O.
pub fn validate(settings: &Settings, available_ports: &[String]) -> Result<DeviceConfig, ConfigError> {
    let baud_rate = settings.baud_rate();
    if !SUPPORTED_BAUD_RATES.contains(&baud_rate) {
        return Err(ConfigError::UnsupportedBaudRate(baud_rate));
    }

    let model = Model::from_name(settings.model())
        .ok_or_else(|| ConfigError::UnknownModel(settings.model().to_string()))?;

    let serial_port = settings.serial_port();
    if available_ports.is_empty() {
        return Err(ConfigError::NoSerialPorts);
    }
    if !available_ports.iter().any(|p| p == serial_port) {
        return Err(ConfigError::PortNotFound(serial_port.to_string()));
    }
    debug!("found port: {}", serial_port);

    if !model.is_flagship() && baud_rate > MAX_LEGACY_BAUD_RATE {
        return Err(ConfigError::BaudRateTooHigh { model, baud_rate });
    }

    let interval_seconds = settings.interval();
    if interval_seconds == 0 {
        return Err(ConfigError::InvalidInterval);
    }

    let broker = BrokerUrl::parse(settings.host())?;

    let topic = settings.topic();
    if topic.is_empty() || topic.contains(['+', '#']) {
        return Err(ConfigError::InvalidTopic(topic.to_string()));
    }

    let reconnect_policy = match settings.reconnect_policy.as_deref() {
        Some(name) => ReconnectPolicy::from_name(name)
            .ok_or_else(|| ConfigError::UnknownReconnectPolicy(name.to_string()))?,
        None => ReconnectPolicy::default(),
    };

    // Empty strings count as unset, the same way the broker sees them.
    let user = settings.user.clone().filter(|u| !u.is_empty());
    let password = settings.password.clone().filter(|p| !p.is_empty());
    let credentials = match (user, password) {
        (None, None) => None,
        (user, password) => Some(Credentials {
            username: user.unwrap_or_default(),
            password: password.unwrap_or_default(),
        }),
    };

    let output_format = if settings.json.unwrap_or(false) {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };

    Ok(DeviceConfig {
        serial_port: serial_port.to_string(),
        baud_rate,
        model,
        interval_seconds,
        output_format,
        broker,
        credentials,
        topic: topic.to_string(),
        client_id: settings
            .client_id
            .clone()
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
        reconnect_policy,
        connect_timeout: Duration::from_secs(
            settings
                .connect_timeout
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS)
                .max(1),
        ),
        verbose: settings.verbose(),
    })
}
