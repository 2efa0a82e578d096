//! Bridging between a Rako controller and an MQTT broker
//!
//! This crate turns inbound bus messages into controller commands and
//! controller status broadcasts into retained state topics, and keeps a
//! retained availability marker alive while it runs. [`BridgeEngine`]
//! supervises the whole arrangement; [`MqttBus`] is the production [`Bus`]
//! implementation.

pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod mqtt;
pub mod translate;

pub use bus::{Bus, BusMessage};
pub use config::{BridgeConfig, ConfigOverlay};
pub use engine::{BridgeEngine, EngineConfig};
pub use error::{BridgeError, Result};
pub use mqtt::{MqttBus, MqttBusConfig};
pub use translate::{PowerState, SetPayload};
