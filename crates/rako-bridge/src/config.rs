//! Bridge configuration
//!
//! [`BridgeConfig`] carries every runtime knob with working defaults. A JSON
//! file can overlay it through [`ConfigOverlay`]: only keys present in the
//! file change anything.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use rako_core::{FadeRate, RAKO_PORT};

use crate::error::Result;

/// Bridge settings with defaults for every knob
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Controller host; `None` triggers broadcast discovery
    pub rako_host: Option<String>,
    /// Controller port, shared by the datagram and stream paths
    pub rako_port: u16,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: Option<String>,
    pub mqtt_password: Option<String>,
    /// Fade rate name applied when a payload has no transition
    pub default_fade_rate: String,
    pub topic_prefix: String,
    /// Scene-cache poll interval in seconds; `None` or zero disables it
    pub poll_interval_secs: Option<u64>,
    pub debug: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            rako_host: None,
            rako_port: RAKO_PORT,
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_user: None,
            mqtt_password: None,
            default_fade_rate: "medium".to_string(),
            topic_prefix: "rako".to_string(),
            poll_interval_secs: None,
            debug: false,
        }
    }
}

/// Keys accepted from a JSON config file
///
/// Every field is optional; only keys present in the file override the
/// current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverlay {
    #[serde(alias = "rako_bridge_host")]
    pub rako_host: Option<String>,
    pub rako_port: Option<u16>,
    pub mqtt_host: Option<String>,
    pub mqtt_port: Option<u16>,
    pub mqtt_user: Option<String>,
    pub mqtt_password: Option<String>,
    pub default_fade_rate: Option<String>,
    pub topic_prefix: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub debug: Option<bool>,
}

impl BridgeConfig {
    /// Overlay settings from a JSON file
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let overlay: ConfigOverlay = serde_json::from_str(&text)?;
        self.apply(overlay);
        Ok(())
    }

    /// Overlay settings, keeping current values for absent keys
    pub fn apply(&mut self, overlay: ConfigOverlay) {
        if let Some(v) = overlay.rako_host {
            self.rako_host = Some(v);
        }
        if let Some(v) = overlay.rako_port {
            self.rako_port = v;
        }
        if let Some(v) = overlay.mqtt_host {
            self.mqtt_host = v;
        }
        if let Some(v) = overlay.mqtt_port {
            self.mqtt_port = v;
        }
        if let Some(v) = overlay.mqtt_user {
            self.mqtt_user = Some(v);
        }
        if let Some(v) = overlay.mqtt_password {
            self.mqtt_password = Some(v);
        }
        if let Some(v) = overlay.default_fade_rate {
            self.default_fade_rate = v;
        }
        if let Some(v) = overlay.topic_prefix {
            self.topic_prefix = v;
        }
        if let Some(v) = overlay.poll_interval_secs {
            self.poll_interval_secs = Some(v);
        }
        if let Some(v) = overlay.debug {
            self.debug = v;
        }
    }

    /// The configured default fade rate
    pub fn fade_rate(&self) -> FadeRate {
        FadeRate::from_name(&self.default_fade_rate)
    }

    /// The scene-cache poll interval, if polling is enabled
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
