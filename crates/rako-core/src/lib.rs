//! Rako Core
//!
//! Core types and wire codec for the Rako lighting-controller protocol
//! (the binary UDP protocol spoken by RA/RTC bridge devices on port 9761).
//!
//! This crate provides:
//! - Protocol types ([`CommandType`], [`FadeRate`], [`StatusEvent`], [`Command`])
//! - Status-frame decoding and command-frame encoding ([`frame`])
//! - Scene/level cache document parsing ([`cache`])
//!
//! Everything here is pure: no sockets, no clocks, no logging. Transport and
//! bridging live in the `rako-transport` and `rako-bridge` crates.

pub mod cache;
pub mod error;
pub mod frame;
pub mod types;

pub use cache::{LevelCacheEntry, SceneCacheEntry};
pub use error::{Error, Result};
pub use frame::{decode_status, encode_command};
pub use types::{Command, CommandType, FadeRate, StatusEvent};

/// UDP/TCP port the controller listens on and broadcasts from
pub const RAKO_PORT: u16 = 9761;

/// First byte of an inbound status frame ('S')
pub const STATUS_MARKER: u8 = 0x53;

/// First byte of an outbound command frame ('R')
pub const COMMAND_MARKER: u8 = 0x52;

/// Single-byte discovery probe broadcast to locate a controller ('D')
pub const DISCOVERY_PROBE: u8 = 0x44;

/// Datagram acknowledgement the controller sends after a command frame
pub const DATAGRAM_ACK: &[u8] = b"AOK\r\n";

/// Token expected somewhere in a stream-protocol reply line
pub const STREAM_ACK_TOKEN: &str = "OK";
