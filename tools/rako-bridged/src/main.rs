//! Rako to MQTT Bridge Daemon
//!
//! Connects a Rako lighting controller to an MQTT broker: inbound set and
//! command topics drive the controller, controller status broadcasts become
//! retained state topics, and a retained availability marker tracks the
//! daemon's lifecycle.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rako_bridge::{translate, BridgeConfig, BridgeEngine, EngineConfig, MqttBus, MqttBusConfig};
use rako_core::RAKO_PORT;
use rako_transport::{
    discovery, CacheClient, CommandDispatcher, StatusSocket, TelnetLink, UdpCommandLink,
};

#[derive(Parser)]
#[command(name = "rako-bridged")]
#[command(about = "Rako to MQTT bridge")]
#[command(version)]
struct Cli {
    /// Controller host; discovered by broadcast when omitted
    #[arg(long)]
    rako_host: Option<String>,

    /// Controller port
    #[arg(long, default_value_t = RAKO_PORT)]
    rako_port: u16,

    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    mqtt_host: String,

    /// MQTT broker port
    #[arg(long, default_value_t = 1883)]
    mqtt_port: u16,

    /// MQTT username
    #[arg(long)]
    mqtt_user: Option<String>,

    /// MQTT password
    #[arg(long)]
    mqtt_password: Option<String>,

    /// Fade rate applied when a payload has no transition
    #[arg(long, default_value = "medium", value_parser = ["instant", "fast", "medium", "slow", "very_slow", "extra_slow"])]
    default_fade_rate: String,

    /// Prefix for every MQTT topic
    #[arg(long, default_value = "rako")]
    topic_prefix: String,

    /// Scene-cache poll interval in seconds; off when omitted
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Config file path (JSON); keys present in the file override flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Result<BridgeConfig> {
        let Cli {
            rako_host,
            rako_port,
            mqtt_host,
            mqtt_port,
            mqtt_user,
            mqtt_password,
            default_fade_rate,
            topic_prefix,
            poll_interval,
            config: file,
            debug,
        } = self;

        let mut config = BridgeConfig {
            rako_host,
            rako_port,
            mqtt_host,
            mqtt_port,
            mqtt_user,
            mqtt_password,
            default_fade_rate,
            topic_prefix,
            poll_interval_secs: poll_interval,
            debug,
        };
        if let Some(path) = file {
            config
                .apply_file(&path)
                .with_context(|| format!("loading {}", path.display()))?;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.into_config()?;

    // Setup logging
    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Rako bridge");

    let controller = resolve_controller(&config).await?;
    tracing::info!("Using controller at {}:{}", controller, config.rako_port);
    let controller_addr = SocketAddr::from((controller, config.rako_port));

    // Controller-facing plumbing
    let status_socket = StatusSocket::bind_port(config.rako_port)
        .await
        .context("binding status socket")?;
    let status_rx = status_socket.start_receiver();

    let datagram = UdpCommandLink::new(controller_addr)
        .await
        .context("opening command socket")?;
    let stream = TelnetLink::new(controller_addr);
    let dispatcher = CommandDispatcher::new(Box::new(datagram), Box::new(stream));

    // Broker connection
    let bus = MqttBus::connect(MqttBusConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        client_id: "rako-bridge".to_string(),
        username: config.mqtt_user.clone(),
        password: config.mqtt_password.clone(),
        keep_alive_secs: 60,
        availability_topic: translate::availability_topic(&config.topic_prefix),
    });

    let engine_config = EngineConfig {
        topic_prefix: config.topic_prefix.clone(),
        default_fade_rate: config.fade_rate(),
        poll_interval: config.poll_interval(),
        ..Default::default()
    };

    let mut engine = BridgeEngine::new(engine_config, Arc::new(bus), dispatcher, status_rx);
    if config.poll_interval().is_some() {
        engine = engine.with_cache_client(CacheClient::new(controller));
    }

    tracing::info!("Bridge ready");

    // Run until interrupted
    engine
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

/// Resolve the controller address from config, falling back to discovery
async fn resolve_controller(config: &BridgeConfig) -> Result<IpAddr> {
    match &config.rako_host {
        Some(host) => {
            if let Ok(ip) = host.parse::<IpAddr>() {
                return Ok(ip);
            }
            let mut addrs = tokio::net::lookup_host((host.as_str(), config.rako_port))
                .await
                .with_context(|| format!("resolving {}", host))?;
            addrs
                .next()
                .map(|addr| addr.ip())
                .with_context(|| format!("no address for {}", host))
        }
        None => {
            tracing::info!("No controller configured, discovering by broadcast");
            discovery::discover(config.rako_port, discovery::DISCOVERY_TIMEOUT)
                .await
                .context("controller discovery failed")
        }
    }
}
