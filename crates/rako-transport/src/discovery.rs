//! Controller discovery via UDP broadcast
//!
//! Controllers answer a single `D` byte broadcast to the well-known port.
//! The probe is repeated a few times because both the probe and the answer
//! travel as lossy datagrams; the first answer wins.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use rako_core::{DISCOVERY_PROBE, RAKO_PORT};

/// Broadcast rounds before giving up
pub const DISCOVERY_ATTEMPTS: u32 = 3;

/// Default wait per broadcast round
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Find a controller on the LAN
pub async fn find_controller() -> Result<IpAddr> {
    discover(RAKO_PORT, DISCOVERY_TIMEOUT).await
}

/// Broadcast probes to a specific port with a per-round timeout
pub async fn discover(port: u16, per_attempt: Duration) -> Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| TransportError::BindFailed(e.to_string()))?;
    socket.set_broadcast(true).map_err(TransportError::Io)?;

    let target = SocketAddr::from(([255, 255, 255, 255], port));
    let mut buf = [0u8; 256];

    for attempt in 1..=DISCOVERY_ATTEMPTS {
        debug!("broadcasting controller probe (attempt {})", attempt);
        socket
            .send_to(&[DISCOVERY_PROBE], target)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        match timeout(per_attempt, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                debug!("received {} bytes from {}", len, from);
                info!("found controller at {}", from.ip());
                return Ok(from.ip());
            }
            Ok(Err(e)) => warn!("discovery receive error: {}", e),
            Err(_) => debug!("no controller answered attempt {}", attempt),
        }
    }

    Err(TransportError::NoControllerFound)
}
