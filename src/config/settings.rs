use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::utils::error::ConfigError;

pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_TOPIC: &str = "tele/geiger/cpm";
pub const DEFAULT_BROKER_URL: &str = "tcp://localhost:1883";
pub const DEFAULT_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_CLIENT_ID: &str = "Geiger Counter";
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Baud rates the GMC firmware can be switched to.
pub const SUPPORTED_BAUD_RATES: [u32; 9] = [
    2400, 4800, 9600, 14400, 19200, 28800, 38400, 57600, 115_200,
];

/// Highest baud rate accepted by the 2-byte models.
pub const MAX_LEGACY_BAUD_RATE: u32 = 57_600;

/// Supported GQ GMC counter models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    Gmc500Plus,
    Gmc320,
    Gmc280,
}

impl Model {
    pub const ALL: [Model; 3] = [Model::Gmc500Plus, Model::Gmc320, Model::Gmc280];
    pub const FLAGSHIP: Model = Model::Gmc500Plus;

    pub fn name(&self) -> &'static str {
        match self {
            Model::Gmc500Plus => "GMC-500+",
            Model::Gmc320 => "GMC-320",
            Model::Gmc280 => "GMC-280",
        }
    }

    pub fn from_name(name: &str) -> Option<Model> {
        Model::ALL.iter().copied().find(|m| m.name() == name)
    }

    pub fn is_flagship(&self) -> bool {
        *self == Model::FLAGSHIP
    }

    /// Size in bytes of the `<GETCPM>>` answer.
    pub fn response_width(&self) -> usize {
        if self.is_flagship() {
            4
        } else {
            2
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Bare decimal CPM value.
    #[default]
    Plain,
    /// `{"Time", "Cpm", "Sleep"}` document.
    Json,
}

/// What the publisher does when it finds the broker link down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Try one synchronous reconnect, drop the reading if it fails.
    #[default]
    Reconnect,
    /// Treat a lost connection as fatal.
    Strict,
}

impl ReconnectPolicy {
    pub fn from_name(name: &str) -> Option<ReconnectPolicy> {
        match name.to_ascii_lowercase().as_str() {
            "reconnect" => Some(ReconnectPolicy::Reconnect),
            "strict" => Some(ReconnectPolicy::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerUrl {
    pub scheme: &'static str,
    pub host: String,
    pub port: u16,
}

impl BrokerUrl {
    /// Accepts `tcp://host[:port]` and `mqtt://host[:port]`.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidBrokerUrl(url.to_string());

        let (scheme, rest) = ["tcp", "mqtt"]
            .into_iter()
            .find_map(|scheme| {
                url.strip_prefix(scheme)
                    .and_then(|r| r.strip_prefix("://"))
                    .map(|rest| (scheme, rest))
            })
            .ok_or_else(invalid)?;
        let authority = rest.trim_end_matches('/');
        if authority.is_empty() || authority.contains('/') || authority.contains('@') {
            return Err(invalid());
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (authority, DEFAULT_MQTT_PORT),
        };
        if host.is_empty() || port == 0 {
            return Err(invalid());
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Validated, immutable runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    pub model: Model,
    pub interval_seconds: u64,
    pub output_format: OutputFormat,
    pub broker: BrokerUrl,
    pub credentials: Option<Credentials>,
    pub topic: String,
    pub client_id: String,
    pub reconnect_policy: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub verbose: bool,
}

impl DeviceConfig {
    pub fn response_width(&self) -> usize {
        self.model.response_width()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Raw operator input, either from the command line or a TOML file.
/// Every field is optional so layers can be merged before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub serial_port: Option<String>,
    pub baud_rate: Option<u32>,
    pub model: Option<String>,
    pub topic: Option<String>,
    pub host: Option<String>,
    pub interval: Option<u64>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub json: Option<bool>,
    pub verbose: Option<bool>,
    pub reconnect_policy: Option<String>,
    pub client_id: Option<String>,
    pub connect_timeout: Option<u64>,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file_error = |message: String| ConfigError::File {
            path: path.display().to_string(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        Self::from_toml_str(&content).map_err(|e| file_error(e.to_string()))
    }

    /// Values set in `overrides` win over values in `self`.
    pub fn merge(self, overrides: Settings) -> Settings {
        Settings {
            serial_port: overrides.serial_port.or(self.serial_port),
            baud_rate: overrides.baud_rate.or(self.baud_rate),
            model: overrides.model.or(self.model),
            topic: overrides.topic.or(self.topic),
            host: overrides.host.or(self.host),
            interval: overrides.interval.or(self.interval),
            user: overrides.user.or(self.user),
            password: overrides.password.or(self.password),
            json: overrides.json.or(self.json),
            verbose: overrides.verbose.or(self.verbose),
            reconnect_policy: overrides.reconnect_policy.or(self.reconnect_policy),
            client_id: overrides.client_id.or(self.client_id),
            connect_timeout: overrides.connect_timeout.or(self.connect_timeout),
        }
    }

    pub fn serial_port(&self) -> &str {
        self.serial_port.as_deref().unwrap_or(DEFAULT_SERIAL_PORT)
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(Model::FLAGSHIP.name())
    }

    pub fn topic(&self) -> &str {
        self.topic.as_deref().unwrap_or(DEFAULT_TOPIC)
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_BROKER_URL)
    }

    pub fn interval(&self) -> u64 {
        self.interval.unwrap_or(DEFAULT_INTERVAL_SECONDS)
    }

    pub fn verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_width_follows_model() {
        assert_eq!(Model::Gmc500Plus.response_width(), 4);
        assert_eq!(Model::Gmc320.response_width(), 2);
        assert_eq!(Model::Gmc280.response_width(), 2);
    }

    #[test]
    fn model_lookup_is_exact() {
        assert_eq!(Model::from_name("GMC-320"), Some(Model::Gmc320));
        assert_eq!(Model::from_name("gmc-320"), None);
        assert_eq!(Model::from_name("GMC-600"), None);
    }

    #[test]
    fn broker_url_parsing() {
        assert_eq!(
            BrokerUrl::parse("tcp://localhost:1883").unwrap(),
            BrokerUrl { scheme: "tcp", host: "localhost".to_string(), port: 1883 }
        );
        assert_eq!(BrokerUrl::parse("mqtt://broker.lan").unwrap().port, 1883);
        assert!(BrokerUrl::parse("localhost:1883").is_err());
        assert!(BrokerUrl::parse("tcp://:1883").is_err());
        assert!(BrokerUrl::parse("tcp://host:notaport").is_err());
        assert!(BrokerUrl::parse("ssl://host:8883").is_err());
    }

    #[test]
    fn broker_url_keeps_its_scheme_when_displayed() {
        assert_eq!(BrokerUrl::parse("mqtt://broker.lan").unwrap().to_string(), "mqtt://broker.lan:1883");
        assert_eq!(BrokerUrl::parse("tcp://10.0.0.2:1884/").unwrap().to_string(), "tcp://10.0.0.2:1884");
    }

    #[test]
    fn cli_values_override_file_values() {
        let file = Settings::from_toml_str(
            r#"
            serial_port = "/dev/ttyACM0"
            baud_rate = 57600
            model = "GMC-320"
            interval = 30
            "#,
        )
        .unwrap();
        let cli = Settings {
            baud_rate: Some(9600),
            ..Settings::default()
        };

        let merged = file.merge(cli);
        assert_eq!(merged.serial_port(), "/dev/ttyACM0");
        assert_eq!(merged.baud_rate(), 9600);
        assert_eq!(merged.model(), "GMC-320");
        assert_eq!(merged.interval(), 30);
        assert_eq!(merged.topic(), DEFAULT_TOPIC);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(Settings::from_toml_str("baudrate = 9600").is_err());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "geiger".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
