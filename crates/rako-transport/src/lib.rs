//! Rako Transport Layer
//!
//! This crate provides the controller-facing transports:
//! - UDP status receive and acknowledged command delivery
//! - TCP stream (RS232 line protocol) command delivery
//! - Command dispatching with datagram-to-stream fallback
//! - UDP broadcast controller discovery
//! - HTTP cache document fetching

pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod telnet;
pub mod traits;
pub mod udp;

pub use dispatch::{CommandDispatcher, DispatchPolicy};
pub use error::{Result, TransportError};
pub use http::CacheClient;
pub use telnet::{StreamConfig, TelnetLink};
pub use traits::CommandLink;
pub use udp::{StatusSocket, UdpCommandLink, UdpConfig};
