//! MQTT bus adapter
//!
//! Wraps rumqttc's client/event-loop pair behind the [`Bus`] trait. A spawned
//! task pumps the event loop and forwards inbound publishes over a channel;
//! the registered last will flips the availability topic to `offline` if the
//! connection dies without a clean disconnect.

use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::{Bus, BusMessage};
use crate::error::{BridgeError, Result};

/// MQTT connection configuration
#[derive(Debug, Clone)]
pub struct MqttBusConfig {
    /// Broker hostname
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client identifier
    pub client_id: String,
    /// Optional username
    pub username: Option<String>,
    /// Optional password
    pub password: Option<String>,
    /// Keep alive interval in seconds
    pub keep_alive_secs: u64,
    /// Topic the last will marks offline
    pub availability_topic: String,
}

impl Default for MqttBusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "rako-bridge".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 60,
            availability_topic: "rako/bridge/status".to_string(),
        }
    }
}

/// Bus implementation backed by an MQTT broker
pub struct MqttBus {
    client: AsyncClient,
    inbound: tokio::sync::Mutex<mpsc::Receiver<BusMessage>>,
    running: Arc<Mutex<bool>>,
}

impl MqttBus {
    /// Connect to the broker and start the event-loop pump
    ///
    /// Must be called from within a tokio runtime; the event loop handles
    /// reconnection on its own, pausing after errors.
    pub fn connect(config: MqttBusConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_last_will(LastWill::new(
            &config.availability_topic,
            "offline",
            QoS::AtLeastOnce,
            true,
        ));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 100);
        let (tx, rx) = mpsc::channel(100);
        let running = Arc::new(Mutex::new(true));

        info!("connecting to broker at {}:{}", config.host, config.port);

        let pump_running = running.clone();
        tokio::spawn(async move {
            loop {
                if !*pump_running.lock() {
                    break;
                }

                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        debug!(
                            "received {} ({} bytes)",
                            publish.topic,
                            publish.payload.len()
                        );
                        let message = BusMessage {
                            topic: publish.topic.clone(),
                            payload: publish.payload.clone(),
                        };
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to broker");
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!("broker closed the connection");
                    }
                    Err(e) => {
                        error!("mqtt error: {:?}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    _ => {}
                }
            }
        });

        Self {
            client,
            inbound: tokio::sync::Mutex::new(rx),
            running,
        }
    }

    fn parse_qos(qos: u8) -> QoS {
        match qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }
}

#[async_trait]
impl Bus for MqttBus {
    async fn subscribe(&self, pattern: &str, qos: u8) -> Result<()> {
        self.client
            .subscribe(pattern, Self::parse_qos(qos))
            .await
            .map_err(|e| BridgeError::Subscribe(e.to_string()))?;
        debug!("subscribed to {}", pattern);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: u8, retain: bool) -> Result<()> {
        self.client
            .publish(topic, Self::parse_qos(qos), retain, payload)
            .await
            .map_err(|e| BridgeError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn next_message(&self) -> Option<BusMessage> {
        self.inbound.lock().await.recv().await
    }

    async fn disconnect(&self) {
        *self.running.lock() = false;
        let _ = self.client.disconnect().await;
        info!("disconnected from broker");
    }
}
