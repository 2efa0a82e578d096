//! Error types for the Rako protocol codec

use crate::types::CommandType;
use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Codec error types
///
/// Every variant produced by [`crate::frame::decode_status`] means the frame
/// is malformed: callers drop the frame and log, nothing is recoverable
/// mid-frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Frame does not start with the status marker
    #[error("invalid frame marker: expected 0x53, got 0x{0:02x}")]
    InvalidMarker(u8),

    /// Frame shorter than the fixed header
    #[error("frame truncated: need {needed} bytes, have {have}")]
    TruncatedFrame { needed: usize, have: usize },

    /// Opcode payload shorter than its decode rule requires
    #[error("payload too short for {command:?}: {have} bytes")]
    ShortPayload { command: CommandType, have: usize },

    /// Scene number outside the legacy 0-4 table
    #[error("scene {0} outside the legacy scene table")]
    UnknownScene(u8),

    /// Recognized opcode with no status-frame semantics
    #[error("no status decoding for {0:?}")]
    UnhandledCommand(CommandType),

    /// Command carries neither an explicit type, a scene, nor a brightness
    #[error("command has no explicit type, scene or brightness")]
    EmptyCommand,
}
