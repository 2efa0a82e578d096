//! Bridge engine
//!
//! Supervises the long-lived activities that make up the bridge: status
//! ingestion, command processing, status publication and the availability
//! heartbeat, plus the optional scene-cache poller. The first activity to
//! finish, for any reason, brings the whole engine down; after a bounded
//! grace period the engine publishes the offline marker, tears down the
//! stream link and disconnects from the bus.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use rako_core::{FadeRate, StatusEvent};
use rako_transport::{CacheClient, CommandDispatcher};

use crate::bus::Bus;
use crate::error::{BridgeError, Result};
use crate::translate;

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Prefix for every bus topic
    pub topic_prefix: String,
    /// Fade rate applied when a payload has no transition
    pub default_fade_rate: FadeRate,
    /// Cadence of the online availability marker
    pub heartbeat_interval: Duration,
    /// Scene-cache poll cadence; `None` leaves the poller off
    pub poll_interval: Option<Duration>,
    /// How long to wait for activities to stop during shutdown
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            topic_prefix: "rako".to_string(),
            default_fade_rate: FadeRate::Medium,
            heartbeat_interval: Duration::from_secs(60),
            poll_interval: None,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// The supervised bridge
pub struct BridgeEngine {
    config: EngineConfig,
    bus: Arc<dyn Bus>,
    dispatcher: Arc<CommandDispatcher>,
    status_rx: mpsc::UnboundedReceiver<StatusEvent>,
    cache: Option<CacheClient>,
}

impl BridgeEngine {
    pub fn new(
        config: EngineConfig,
        bus: Arc<dyn Bus>,
        dispatcher: CommandDispatcher,
        status_rx: mpsc::UnboundedReceiver<StatusEvent>,
    ) -> Self {
        Self {
            config,
            bus,
            dispatcher: Arc::new(dispatcher),
            status_rx,
            cache: None,
        }
    }

    /// Attach the auxiliary cache client that feeds the scene poller
    ///
    /// The poller only runs when a poll interval is configured as well.
    pub fn with_cache_client(mut self, cache: CacheClient) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run until the first activity stops
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until the first activity stops or `shutdown` resolves
    ///
    /// Either way the engine cancels the remaining activities, waits out the
    /// grace period, publishes the offline marker and disconnects. The error
    /// of a failed activity is returned after cleanup.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let BridgeEngine {
            config,
            bus,
            dispatcher,
            status_rx,
            cache,
        } = self;

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let mut activities: JoinSet<(&'static str, Result<()>)> = JoinSet::new();

        {
            let prefix = config.topic_prefix.clone();
            activities.spawn(async move { ("ingest", ingest(prefix, status_rx, queue_tx).await) });
        }
        {
            let prefix = config.topic_prefix.clone();
            let fade = config.default_fade_rate;
            let bus = bus.clone();
            let dispatcher = dispatcher.clone();
            activities.spawn(async move {
                ("commands", process_commands(prefix, fade, bus, dispatcher).await)
            });
        }
        {
            let bus = bus.clone();
            activities.spawn(async move { ("publish", publish_statuses(bus, queue_rx).await) });
        }
        {
            let bus = bus.clone();
            let topic = translate::availability_topic(&config.topic_prefix);
            let interval = config.heartbeat_interval;
            activities.spawn(async move { ("heartbeat", heartbeat(bus, topic, interval).await) });
        }
        if let (Some(cache), Some(interval)) = (cache, config.poll_interval) {
            let prefix = config.topic_prefix.clone();
            let bus = bus.clone();
            activities.spawn(async move {
                ("scene_cache", poll_scene_cache(prefix, bus, cache, interval).await)
            });
        }
        activities.spawn(async move {
            shutdown.await;
            ("signal", Ok(()))
        });

        info!("bridge running");

        let failure = match activities.join_next().await {
            Some(Ok(("signal", _))) => {
                info!("shutdown requested");
                None
            }
            Some(Ok((name, Ok(())))) => {
                warn!("activity {} ended unexpectedly", name);
                None
            }
            Some(Ok((name, Err(e)))) => {
                error!("activity {} failed: {}", name, e);
                Some(e)
            }
            Some(Err(e)) => {
                error!("activity panicked: {}", e);
                Some(BridgeError::Other(e.to_string()))
            }
            None => None,
        };

        activities.abort_all();
        let drained = tokio::time::timeout(config.shutdown_grace, async {
            while activities.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("some activities did not stop within the grace period");
        }

        let availability = translate::availability_topic(&config.topic_prefix);
        if let Err(e) = bus.publish(&availability, b"offline".to_vec(), 1, true).await {
            error!("failed to publish offline marker: {}", e);
        }
        dispatcher.reset().await;
        bus.disconnect().await;
        info!("bridge stopped");

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Turn decoded status events into queued `(topic, payload)` publications
async fn ingest(
    prefix: String,
    mut status_rx: mpsc::UnboundedReceiver<StatusEvent>,
    queue: mpsc::UnboundedSender<(String, Vec<u8>)>,
) -> Result<()> {
    info!("status ingest started");
    while let Some(event) = status_rx.recv().await {
        debug!("status event: {:?}", event);
        let topic = translate::status_topic(&prefix, &event);
        let body = translate::status_payload(&event).to_string().into_bytes();
        if queue.send((topic, body)).is_err() {
            break;
        }
    }
    Err(BridgeError::StatusClosed)
}

/// Subscribe to the command topics and dispatch everything that arrives
///
/// Translation and dispatch failures are logged per message and never stop
/// the loop; only the bus going away does.
async fn process_commands(
    prefix: String,
    default_fade: FadeRate,
    bus: Arc<dyn Bus>,
    dispatcher: Arc<CommandDispatcher>,
) -> Result<()> {
    info!("command processor started");

    for pattern in [
        format!("{}/room/+/set", prefix),
        format!("{}/room/+/channel/+/set", prefix),
        format!("{}/room/+/channel/+/command", prefix),
    ] {
        info!("subscribing to {}", pattern);
        bus.subscribe(&pattern, 1).await?;
    }

    loop {
        let message = match bus.next_message().await {
            Some(message) => message,
            None => return Err(BridgeError::BusClosed),
        };
        debug!("bus message on {}", message.topic);

        let command = match translate::command_for_message(
            &prefix,
            &message.topic,
            &message.payload,
            default_fade,
        ) {
            Ok(command) => command,
            Err(e) => {
                warn!("dropping message on {}: {}", message.topic, e);
                continue;
            }
        };

        info!(
            "dispatching command to room {} channel {}",
            command.room, command.channel
        );
        if let Err(e) = dispatcher.dispatch(&command).await {
            error!("command dropped: {}", e);
        }
    }
}

/// Drain the status queue onto the bus, retained at-least-once
async fn publish_statuses(
    bus: Arc<dyn Bus>,
    mut queue: mpsc::UnboundedReceiver<(String, Vec<u8>)>,
) -> Result<()> {
    info!("status publisher started");
    while let Some((topic, payload)) = queue.recv().await {
        debug!("publishing {} bytes to {}", payload.len(), topic);
        if let Err(e) = bus.publish(&topic, payload, 1, true).await {
            error!("status publish failed: {}", e);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
    Err(BridgeError::StatusClosed)
}

/// Publish the retained online marker on a fixed cadence
///
/// A failed publish attempts a best-effort offline marker and takes the
/// engine down.
async fn heartbeat(bus: Arc<dyn Bus>, topic: String, interval: Duration) -> Result<()> {
    info!("availability heartbeat started");
    loop {
        if let Err(e) = bus.publish(&topic, b"online".to_vec(), 1, true).await {
            error!("availability publish failed: {}", e);
            let _ = bus.publish(&topic, b"offline".to_vec(), 1, true).await;
            return Err(e);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Republish the controller's scene cache as retained room state
///
/// Fetch and publish failures are logged per cycle, never fatal.
async fn poll_scene_cache(
    prefix: String,
    bus: Arc<dyn Bus>,
    cache: CacheClient,
    interval: Duration,
) -> Result<()> {
    info!("scene-cache poller started");
    loop {
        match cache.fetch_scenes().await {
            Ok(entries) => {
                for entry in entries {
                    let topic = format!("{}/room/{}/state", prefix, entry.room);
                    let payload = json!({
                        "state": if entry.scene > 0 { "ON" } else { "OFF" },
                        "scene": entry.scene,
                        "source": "scene_cache",
                    });
                    if let Err(e) = bus
                        .publish(&topic, payload.to_string().into_bytes(), 1, true)
                        .await
                    {
                        error!("scene-cache publish failed: {}", e);
                    }
                }
            }
            Err(e) => error!("scene-cache fetch failed: {}", e),
        }
        tokio::time::sleep(interval).await;
    }
}
