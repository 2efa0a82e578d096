//! Transport trait definitions

use async_trait::async_trait;

use crate::error::Result;
use rako_core::Command;

/// Trait for delivering commands to a controller
///
/// A link either delivers the whole command or fails; there is no partial
/// delivery. [`CommandLink::reset`] drops any connection state so the next
/// [`CommandLink::deliver`] starts from scratch.
#[async_trait]
pub trait CommandLink: Send + Sync {
    /// Deliver one command to the controller
    async fn deliver(&self, command: &Command) -> Result<()>;

    /// Drop connection state, if the link holds any
    async fn reset(&self);
}
