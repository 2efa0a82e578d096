//! UDP transport implementation
//!
//! Two sockets talk to the controller over UDP. A status socket bound to the
//! well-known port receives the frames the controller broadcasts on every
//! state change. A command socket on an ephemeral port sends command frames
//! and waits for the controller's `AOK` acknowledgement.

use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::CommandLink;
use rako_core::{decode_status, encode_command, Command, StatusEvent, DATAGRAM_ACK, RAKO_PORT};

/// Receive buffer size; controller frames are far smaller
const RECV_BUFFER_SIZE: usize = 256;

/// UDP configuration
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// How long to wait for the controller's acknowledgement
    pub ack_timeout: Duration,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
        }
    }
}

/// Socket receiving controller status broadcasts
pub struct StatusSocket {
    socket: Arc<UdpSocket>,
}

impl StatusSocket {
    /// Bind the well-known controller port on all interfaces
    pub async fn bind() -> Result<Self> {
        Self::bind_port(RAKO_PORT).await
    }

    /// Bind a specific port (0 picks an ephemeral one)
    ///
    /// The socket is bound with `SO_REUSEADDR` so the daemon can share the
    /// port with other listeners on the same host.
    pub async fn bind_port(port: u16) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )
        .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        socket
            .bind(&addr.into())
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;

        let socket = UdpSocket::from_std(socket.into())
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;

        info!("status socket bound to {}", socket.local_addr()?);

        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(TransportError::Io)
    }

    /// Start decoding status frames into a channel
    ///
    /// Frames that fail to decode are logged at debug level and dropped.
    /// Socket errors are retried after a pause; the loop only ends when the
    /// receiving side is dropped, closing the channel.
    pub fn start_receiver(&self) -> mpsc::UnboundedReceiver<StatusEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = self.socket.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((0, _)) => {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    Ok((len, from)) => {
                        debug!("received {} bytes from {}", len, from);
                        match decode_status(&buf[..len]) {
                            Ok(event) => {
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => debug!("dropping frame from {}: {}", from, e),
                        }
                    }
                    Err(e) => {
                        warn!("status receive error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        if tx.is_closed() {
                            break;
                        }
                    }
                }
            }
        });

        rx
    }
}

/// Command link sending frames as datagrams
///
/// The controller acknowledges every accepted frame with `AOK\r\n`. A missing
/// acknowledgement is a delivery failure; an unexpected one is logged and
/// accepted.
pub struct UdpCommandLink {
    socket: Arc<UdpSocket>,
    controller: SocketAddr,
    config: UdpConfig,
}

impl UdpCommandLink {
    /// Bind an ephemeral socket for talking to the controller
    pub async fn new(controller: SocketAddr) -> Result<Self> {
        Self::with_config(controller, UdpConfig::default()).await
    }

    /// Bind with config
    pub async fn with_config(controller: SocketAddr, config: UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;

        Ok(Self {
            socket: Arc::new(socket),
            controller,
            config,
        })
    }
}

#[async_trait]
impl CommandLink for UdpCommandLink {
    async fn deliver(&self, command: &Command) -> Result<()> {
        let frame = encode_command(command)?;
        debug!("sending {:02x?} to {}", frame.as_ref(), self.controller);

        self.socket
            .send_to(&frame, self.controller)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let (len, from) =
            match timeout(self.config.ack_timeout, self.socket.recv_from(&mut buf)).await {
                Ok(Ok(reply)) => reply,
                Ok(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                Err(_) => return Err(TransportError::AckTimeout),
            };

        if &buf[..len] == DATAGRAM_ACK {
            debug!("command acknowledged");
        } else {
            warn!(
                "unexpected acknowledgement from {}: {:02x?} (command {:02x?})",
                from,
                &buf[..len],
                frame.as_ref()
            );
        }

        Ok(())
    }

    async fn reset(&self) {}
}
