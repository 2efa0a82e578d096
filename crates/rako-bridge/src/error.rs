//! Bridge error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("unsupported topic: {0}")]
    UnsupportedTopic(String),

    #[error("unsupported payload: {0}")]
    UnsupportedPayload(String),

    #[error("bus connection closed")]
    BusClosed,

    #[error("status stream closed")]
    StatusClosed,

    #[error("transport error: {0}")]
    Transport(#[from] rako_transport::TransportError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bridge error: {0}")]
    Other(String),
}
