//! Stream transport implementation
//!
//! The controller's TCP service on port 9761 accepts the RS232 line protocol:
//! one ASCII command per line, CRLF terminated, answered with a short reply
//! line containing `OK`. The link connects lazily and tears the stream down
//! on any error; the next delivery reconnects.

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::CommandLink;
use rako_core::{Command, CommandType, STREAM_ACK_TOKEN};

/// Reply buffer size
const REPLY_BUFFER_SIZE: usize = 256;

/// Stream configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// How long to wait for the controller's reply line
    pub reply_timeout: Duration,
    /// Keep-alive interval in seconds (0 = disabled)
    pub keepalive_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(5),
            keepalive_secs: 30,
        }
    }
}

/// Render the line-protocol form of a command
///
/// Scene and level commands have direct line forms. Of the explicit command
/// types only IDENT and the legacy scene calls exist in the line protocol;
/// everything else is datagram-only.
fn line_for(command: &Command) -> Result<String> {
    if let Some(kind) = command.command {
        if kind == CommandType::Ident {
            return Ok(format!(
                "ROOM{:02},CHANNEL{:02},IDENT",
                command.room, command.channel
            ));
        }
        if let Some(scene) = kind.legacy_scene() {
            return Ok(format!(
                "ROOM{:02},CHANNEL{:02},SCENE{:02}",
                command.room, command.channel, scene
            ));
        }
        return Err(TransportError::UnsupportedLine(format!("{kind:?}")));
    }

    if let Some(scene) = command.scene {
        return Ok(format!(
            "ROOM{:02},CHANNEL{:02},SCENE{:02}",
            command.room, command.channel, scene
        ));
    }

    if let Some(brightness) = command.brightness {
        return Ok(format!(
            "ROOM{:02},CHANNEL{:02},LEVEL{:03}",
            command.room, command.channel, brightness
        ));
    }

    Err(TransportError::Protocol(rako_core::Error::EmptyCommand))
}

/// Command link speaking the line protocol over TCP
pub struct TelnetLink {
    controller: SocketAddr,
    config: StreamConfig,
    stream: Mutex<Option<TcpStream>>,
}

impl TelnetLink {
    /// Link to a controller's stream service
    pub fn new(controller: SocketAddr) -> Self {
        Self::with_config(controller, StreamConfig::default())
    }

    /// Link with config
    pub fn with_config(controller: SocketAddr, config: StreamConfig) -> Self {
        Self {
            controller,
            config,
            stream: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        info!("connecting to controller stream at {}", self.controller);

        let stream = TcpStream::connect(self.controller)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        // Enable TCP keepalive if configured
        if self.config.keepalive_secs > 0 {
            let socket = socket2::SockRef::from(&stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(self.config.keepalive_secs));
            let _ = socket.set_tcp_keepalive(&keepalive);
        }

        Ok(stream)
    }

    async fn exchange(&self, stream: &mut TcpStream, line: &str) -> Result<()> {
        debug!("sending line: {}", line);

        stream
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        let mut buf = [0u8; REPLY_BUFFER_SIZE];
        let len = match timeout(self.config.reply_timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => return Err(TransportError::ConnectionClosed),
            Ok(Ok(len)) => len,
            Ok(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
            Err(_) => return Err(TransportError::ReplyTimeout),
        };

        let reply = String::from_utf8_lossy(&buf[..len]);
        debug!("reply: {}", reply.trim_end());
        if !reply.contains(STREAM_ACK_TOKEN) {
            warn!("unexpected reply for {:?}: {}", line, reply.trim_end());
        }

        Ok(())
    }

    /// Tail raw reply traffic from the controller
    ///
    /// Opens a dedicated connection and forwards every chunk the controller
    /// writes until the connection drops. Status reporting over the stream
    /// protocol is undocumented, so chunks are passed through as raw bytes.
    pub async fn monitor(&self) -> Result<mpsc::UnboundedReceiver<Bytes>> {
        let mut stream = self.connect().await?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut buf = [0u8; REPLY_BUFFER_SIZE];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) => {
                        debug!("monitor connection closed");
                        break;
                    }
                    Ok(len) => {
                        debug!("monitor received {} bytes", len);
                        if tx.send(Bytes::copy_from_slice(&buf[..len])).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("monitor read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl CommandLink for TelnetLink {
    /// Deliver one command as a protocol line
    ///
    /// Deliveries are serialized; the controller answers one line at a time.
    /// On any exchange error the connection is dropped so the next delivery
    /// starts with a fresh one.
    async fn deliver(&self, command: &Command) -> Result<()> {
        let line = line_for(command)?;
        let mut guard = self.stream.lock().await;

        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        match self.exchange(&mut stream, &line).await {
            Ok(()) => {
                *guard = Some(stream);
                Ok(())
            }
            Err(e) => {
                warn!("stream delivery failed, dropping connection: {}", e);
                Err(e)
            }
        }
    }

    async fn reset(&self) {
        *self.stream.lock().await = None;
    }
}
