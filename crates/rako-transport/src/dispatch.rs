//! Command delivery with datagram-to-stream fallback
//!
//! Datagram delivery is preferred. When it fails the dispatcher switches to
//! the stream link for the rest of the session; when stream delivery fails
//! the stream is torn down and the next round starts over with datagrams.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::CommandLink;
use rako_core::Command;

/// Retry policy for command delivery
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Rounds before giving up
    pub attempts: u32,
    /// Pause between rounds
    pub backoff: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Dispatches commands over a datagram link with stream fallback
pub struct CommandDispatcher {
    datagram: Box<dyn CommandLink>,
    stream: Box<dyn CommandLink>,
    use_stream: AtomicBool,
    policy: DispatchPolicy,
}

impl CommandDispatcher {
    pub fn new(datagram: Box<dyn CommandLink>, stream: Box<dyn CommandLink>) -> Self {
        Self::with_policy(datagram, stream, DispatchPolicy::default())
    }

    pub fn with_policy(
        datagram: Box<dyn CommandLink>,
        stream: Box<dyn CommandLink>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            datagram,
            stream,
            use_stream: AtomicBool::new(false),
            policy,
        }
    }

    /// Whether the stream link is currently preferred
    pub fn uses_stream(&self) -> bool {
        self.use_stream.load(Ordering::Relaxed)
    }

    /// Tear down any open stream connection
    pub async fn reset(&self) {
        self.stream.reset().await;
    }

    /// Deliver a command, retrying across both links
    ///
    /// Each round tries the preferred link. A datagram failure flips the
    /// preference to the stream within the same round and for every later
    /// command; a stream failure resets the stream link and hands the next
    /// round back to datagrams.
    pub async fn dispatch(&self, command: &Command) -> Result<()> {
        for attempt in 1..=self.policy.attempts {
            if !self.use_stream.load(Ordering::Relaxed) {
                match self.datagram.deliver(command).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        warn!("datagram delivery failed (attempt {}): {}", attempt, e);
                        self.use_stream.store(true, Ordering::Relaxed);
                    }
                }
            }

            if self.use_stream.load(Ordering::Relaxed) {
                match self.stream.deliver(command).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        warn!("stream delivery failed (attempt {}): {}", attempt, e);
                        self.stream.reset().await;
                        self.use_stream.store(false, Ordering::Relaxed);
                    }
                }
            }

            if attempt < self.policy.attempts {
                debug!("retrying delivery in {:?}", self.policy.backoff);
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        Err(TransportError::Exhausted {
            attempts: self.policy.attempts,
        })
    }
}
