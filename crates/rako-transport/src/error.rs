//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("bind failed: {0}")]
    BindFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("no acknowledgement from controller")]
    AckTimeout,

    #[error("no reply from controller")]
    ReplyTimeout,

    #[error("command has no stream form: {0}")]
    UnsupportedLine(String),

    #[error("delivery failed after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("no controller answered discovery")]
    NoControllerFound,

    #[error("http error: {0}")]
    Http(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] rako_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
