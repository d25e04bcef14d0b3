use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use geiger_mqtt_bridge::cli::{Action, Cli};
use geiger_mqtt_bridge::config::{validate, DeviceConfig};
use geiger_mqtt_bridge::output::{MqttLink, Publisher};
use geiger_mqtt_bridge::serial::{available_port_names, print_available_ports, SerialTransport};
use geiger_mqtt_bridge::services::PollLoop;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ {:#}", e);
        eprintln!("geiger-mqtt-bridge: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = match cli.action()? {
        Action::ListPorts => {
            init_logging(cli.verbose);
            print_available_ports()?;
            return Ok(());
        }
        Action::Bridge(settings) => settings,
    };
    init_logging(settings.verbose());

    info!("🖥️  Geiger counter MQTT bridge v{}", geiger_mqtt_bridge::VERSION);

    let ports = available_port_names().context("Failed to enumerate serial ports")?;
    let config = validate(&settings, &ports)?;
    log_config(&config);

    let transport = SerialTransport::open(&config)?;
    let link = MqttLink::connect(&config).await?;
    let publisher = Publisher::new(Box::new(link), &config);

    let mut poll_loop = PollLoop::new(Box::new(transport), publisher, &config);
    poll_loop.run().await?;
    Ok(())
}

fn log_config(config: &DeviceConfig) {
    info!("📡 Device: {} on {} @ {} baud", config.model, config.serial_port, config.baud_rate);
    info!("🌐 Broker: {} topic '{}'", config.broker, config.topic);
    info!("⏱️  Sleep time: {}s", config.interval_seconds);
    if let Some(credentials) = &config.credentials {
        info!("👤 MQTT user: '{}'", credentials.username);
    }
}
