//! Topic and payload translation
//!
//! Maps inbound bus messages onto controller commands and decoded status
//! events onto bus publications. Topic layout under the configured prefix:
//!
//! - `{prefix}/room/{room}/set` — room scene (JSON body)
//! - `{prefix}/room/{room}/channel/{channel}/set` — channel level (JSON body)
//! - `{prefix}/room/{room}/channel/{channel}/command` — plain OPEN/CLOSE/STOP
//! - `{prefix}/room/{room}/state`, `.../channel/{channel}/state` — status out
//! - `{prefix}/bridge/status` — availability marker

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use rako_core::types::{scene_for_brightness, Command, CommandType, FadeRate, StatusEvent};

use crate::error::{BridgeError, Result};

/// Light state as it appears on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
}

/// Inbound JSON body on the `set` topics
///
/// Any one of `brightness`, `percentage` or `position` names a level;
/// `state` alone means full on or off. `transition` is a duration in
/// seconds, mapped to the nearest controller fade rate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetPayload {
    pub state: Option<PowerState>,
    pub brightness: Option<u8>,
    pub percentage: Option<u8>,
    pub position: Option<u8>,
    pub transition: Option<f64>,
}

impl SetPayload {
    /// Parse and range-check a raw payload
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let parsed: SetPayload = serde_json::from_slice(payload)
            .map_err(|e| BridgeError::UnsupportedPayload(e.to_string()))?;

        if let Some(p) = parsed.percentage {
            if p > 100 {
                return Err(BridgeError::UnsupportedPayload(format!(
                    "percentage {} out of range",
                    p
                )));
            }
        }
        if let Some(p) = parsed.position {
            if p > 100 {
                return Err(BridgeError::UnsupportedPayload(format!(
                    "position {} out of range",
                    p
                )));
            }
        }

        Ok(parsed)
    }

    /// Brightness this payload asks for, before any state override
    ///
    /// Percentage and position scale by 2.55 with truncation; a bare state
    /// maps ON to full and anything else to zero.
    pub fn effective_brightness(&self) -> u8 {
        if let Some(b) = self.brightness {
            b
        } else if let Some(p) = self.percentage {
            (f64::from(p) * 2.55) as u8
        } else if let Some(p) = self.position {
            (f64::from(p) * 2.55) as u8
        } else if self.state == Some(PowerState::On) {
            255
        } else {
            0
        }
    }

    fn has_level(&self) -> bool {
        self.brightness.is_some() || self.percentage.is_some() || self.position.is_some()
    }

    fn fade_rate(&self, default: FadeRate) -> FadeRate {
        match self.transition {
            Some(seconds) => FadeRate::from_transition(seconds),
            None => default,
        }
    }
}

/// Topic carrying the online/offline availability marker
pub fn availability_topic(prefix: &str) -> String {
    format!("{}/bridge/status", prefix)
}

/// Translate an inbound bus message into a controller command
///
/// `default_fade` applies when the payload carries no `transition`. Messages
/// that match no topic pattern or carry an unusable payload are errors; the
/// caller drops them.
pub fn command_for_message(
    prefix: &str,
    topic: &str,
    payload: &[u8],
    default_fade: FadeRate,
) -> Result<Command> {
    let path = topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| BridgeError::UnsupportedTopic(topic.to_string()))?;
    let segments: Vec<&str> = path.split('/').collect();

    match segments.as_slice() {
        ["room", room, "channel", channel, "command"] => {
            let room = parse_room(room, topic)?;
            let channel = parse_channel(channel, topic)?;
            let command = parse_action(payload)?;
            Ok(Command::explicit(room, channel, command))
        }
        ["room", room, "channel", channel, "set"] => {
            let room = parse_room(room, topic)?;
            let channel = parse_channel(channel, topic)?;
            let set = SetPayload::parse(payload)?;

            let brightness = match set.state {
                Some(PowerState::Off) => 0,
                Some(PowerState::On) => set.effective_brightness(),
                None if set.has_level() => set.effective_brightness(),
                None => {
                    return Err(BridgeError::UnsupportedPayload(
                        "no state or level given".to_string(),
                    ))
                }
            };

            Ok(Command::set_level(room, channel, brightness)
                .with_fade_rate(set.fade_rate(default_fade)))
        }
        ["room", room, "set"] => {
            let room = parse_room(room, topic)?;
            let set = SetPayload::parse(payload)?;

            let scene = match set.state {
                Some(PowerState::On) => 1,
                Some(PowerState::Off) => 0,
                None if set.has_level() => scene_for_brightness(set.effective_brightness()),
                None => {
                    return Err(BridgeError::UnsupportedPayload(
                        "no state or level given".to_string(),
                    ))
                }
            };

            // Room-wide commands address channel 0
            Ok(Command::set_scene(room, 0, scene).with_fade_rate(set.fade_rate(default_fade)))
        }
        _ => Err(BridgeError::UnsupportedTopic(topic.to_string())),
    }
}

/// Topic a status event publishes to
pub fn status_topic(prefix: &str, event: &StatusEvent) -> String {
    if event.channel == 0 {
        format!("{}/room/{}/state", prefix, event.room)
    } else {
        format!(
            "{}/room/{}/channel/{}/state",
            prefix, event.room, event.channel
        )
    }
}

/// JSON body a status event publishes
pub fn status_payload(event: &StatusEvent) -> serde_json::Value {
    match event.command {
        CommandType::SetLevel | CommandType::LevelSetLegacy => {
            let brightness = event.brightness.unwrap_or(0);
            json!({
                "state": if brightness > 0 { "ON" } else { "OFF" },
                "brightness": brightness,
            })
        }
        CommandType::SetScene => {
            let on = event.scene.unwrap_or(0) > 0;
            json!({
                "state": if on { "ON" } else { "OFF" },
                "brightness": if on { 255 } else { 0 },
            })
        }
        CommandType::ButtonPress => {
            let scene = event.scene.unwrap_or(0);
            json!({
                "state": if scene > 0 { "ON" } else { "OFF" },
                "brightness": event.brightness.unwrap_or(0),
                "scene": scene,
                "event": "button_press",
                "event_type": "scene",
                "event_data": { "scene": scene },
            })
        }
        CommandType::FadeUp => json!({
            "state": "ON",
            "brightness": 255,
            "action": "opening",
        }),
        CommandType::FadeDown => json!({
            "state": "ON",
            "brightness": 0,
            "action": "closing",
        }),
        CommandType::Stop => json!({ "action": "stopped" }),
        other => {
            warn!("no payload mapping for {:?} status", other);
            json!({ "state": "OFF", "brightness": 0 })
        }
    }
}

fn parse_room(text: &str, topic: &str) -> Result<u16> {
    let room: u16 = text
        .parse()
        .map_err(|_| BridgeError::UnsupportedTopic(topic.to_string()))?;
    if room > 0x3FF {
        return Err(BridgeError::UnsupportedTopic(topic.to_string()));
    }
    Ok(room)
}

fn parse_channel(text: &str, topic: &str) -> Result<u8> {
    text.parse()
        .map_err(|_| BridgeError::UnsupportedTopic(topic.to_string()))
}

/// Parse a plain-text cover command: OPEN, CLOSE or STOP
///
/// Quotes are tolerated and matching is case-insensitive.
fn parse_action(payload: &[u8]) -> Result<CommandType> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| BridgeError::UnsupportedPayload(e.to_string()))?;
    let action = text
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_ascii_uppercase();

    match action.as_str() {
        "OPEN" => Ok(CommandType::FadeUp),
        "CLOSE" => Ok(CommandType::FadeDown),
        "STOP" => Ok(CommandType::Stop),
        other => Err(BridgeError::UnsupportedPayload(format!(
            "unknown cover command: {}",
            other
        ))),
    }
}
