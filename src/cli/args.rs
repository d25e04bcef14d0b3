use clap::Parser;
use std::path::PathBuf;

use crate::config::Settings;
use crate::utils::error::ConfigError;

/// What a command line asks for.
#[derive(Debug, PartialEq)]
pub enum Action {
    ListPorts,
    Bridge(Settings),
}

/// Polls a GQ GMC Geiger counter and publishes its CPM value to MQTT.
///
/// Options left unset fall back to the config file, then to built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "geiger-mqtt-bridge")]
#[command(version)]
pub struct Cli {
    /// TOML file with the same keys as the long options (snake_case)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print available serial ports and exit
    #[arg(long)]
    pub list_ports: bool,

    /// Serial port name [default: /dev/ttyUSB0]
    #[arg(short = 's', long)]
    pub serial_port: Option<String>,

    /// Verbose mode
    #[arg(short, long, overrides_with = "no_verbose")]
    pub verbose: bool,

    /// Turn off verbose mode set in the config file
    #[arg(long, overrides_with = "verbose")]
    pub no_verbose: bool,

    /// Baud rate [default: 115200]
    #[arg(short, long)]
    pub baud_rate: Option<u32>,

    /// GQ Geiger counter model: GMC-500+, GMC-320 or GMC-280 [default: GMC-500+]
    #[arg(short, long)]
    pub model: Option<String>,

    /// MQTT topic [default: tele/geiger/cpm]
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Broker URL [default: tcp://localhost:1883]
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Update interval for the MQTT topic in seconds [default: 60]
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// MQTT user
    #[arg(short, long)]
    pub user: Option<String>,

    /// MQTT password
    #[arg(short, long)]
    pub password: Option<String>,

    /// Output data in JSON format
    #[arg(short, long, overrides_with = "no_json")]
    pub json: bool,

    /// Publish plain CPM values even if the config file asks for JSON
    #[arg(long, overrides_with = "json")]
    pub no_json: bool,

    /// What to do when the broker connection is lost [default: reconnect]
    #[arg(long, value_parser = ["reconnect", "strict"])]
    pub reconnect_policy: Option<String>,

    /// MQTT client id [default: "Geiger Counter"]
    #[arg(long)]
    pub client_id: Option<String>,

    /// Seconds to wait for the broker to accept a connection [default: 10]
    #[arg(long)]
    pub connect_timeout: Option<u64>,
}

impl Cli {
    /// Command-line layer of the settings. Flags given neither way stay unset
    /// so the config file decides.
    pub fn to_settings(&self) -> Settings {
        Settings {
            serial_port: self.serial_port.clone(),
            baud_rate: self.baud_rate,
            model: self.model.clone(),
            topic: self.topic.clone(),
            host: self.host.clone(),
            interval: self.interval,
            user: self.user.clone(),
            password: self.password.clone(),
            json: switch(self.json, self.no_json),
            verbose: switch(self.verbose, self.no_verbose),
            reconnect_policy: self.reconnect_policy.clone(),
            client_id: self.client_id.clone(),
            connect_timeout: self.connect_timeout,
        }
    }

    /// Port listing does not read the config file, so a broken file cannot
    /// get in its way.
    pub fn action(&self) -> Result<Action, ConfigError> {
        if self.list_ports {
            return Ok(Action::ListPorts);
        }
        self.load_settings().map(Action::Bridge)
    }

    /// File layer (if any) overridden by the command line.
    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let file = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };
        Ok(file.merge(self.to_settings()))
    }
}

fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_short_options() {
        let cli = Cli::try_parse_from([
            "geiger-mqtt-bridge",
            "-s", "/dev/ttyACM0",
            "-b", "57600",
            "-m", "GMC-320",
            "-H", "tcp://broker:1883",
            "-i", "30",
            "-u", "geiger",
            "-p", "secret",
            "-j",
            "-v",
        ])
        .unwrap();

        let settings = cli.to_settings();
        assert_eq!(settings.serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(settings.baud_rate, Some(57_600));
        assert_eq!(settings.model.as_deref(), Some("GMC-320"));
        assert_eq!(settings.host.as_deref(), Some("tcp://broker:1883"));
        assert_eq!(settings.interval, Some(30));
        assert_eq!(settings.user.as_deref(), Some("geiger"));
        assert_eq!(settings.password.as_deref(), Some("secret"));
        assert_eq!(settings.json, Some(true));
        assert_eq!(settings.verbose, Some(true));
    }

    #[test]
    fn unset_flags_leave_settings_empty() {
        let cli = Cli::try_parse_from(["geiger-mqtt-bridge"]).unwrap();
        assert_eq!(cli.to_settings(), Settings::default());
    }

    #[test]
    fn rejects_unknown_reconnect_policy() {
        assert!(Cli::try_parse_from(["geiger-mqtt-bridge", "--reconnect-policy", "retry"]).is_err());
    }

    #[test]
    fn negated_flags_override_the_config_file() {
        let file = Settings::from_toml_str("json = true\nverbose = true").unwrap();
        let cli = Cli::try_parse_from(["geiger-mqtt-bridge", "--no-json", "--no-verbose"]).unwrap();

        let merged = file.merge(cli.to_settings());
        assert_eq!(merged.json, Some(false));
        assert_eq!(merged.verbose, Some(false));
    }

    #[test]
    fn last_of_a_flag_and_its_negation_wins() {
        let cli = Cli::try_parse_from(["geiger-mqtt-bridge", "--no-json", "-j"]).unwrap();
        assert_eq!(cli.to_settings().json, Some(true));

        let cli = Cli::try_parse_from(["geiger-mqtt-bridge", "-j", "--no-json"]).unwrap();
        assert_eq!(cli.to_settings().json, Some(false));
    }

    #[test]
    fn listing_ports_ignores_a_broken_config_file() {
        let cli = Cli::try_parse_from([
            "geiger-mqtt-bridge",
            "--list-ports",
            "--config",
            "/nonexistent/geiger.toml",
        ])
        .unwrap();

        assert_eq!(cli.action().unwrap(), Action::ListPorts);
        assert!(cli.load_settings().is_err());
    }
}
