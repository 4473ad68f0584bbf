/// Errors originating from the delivery service layer.
///
/// Transport failures are absorbed by the delivery queue through retries;
/// callers only ever see `QueueClosed` from the queue handle itself.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryServiceError {
    #[error("Peer rejected the message: {0}")]
    Nack(String),
    #[error("No acknowledgment within {0:?}")]
    AckTimeout(std::time::Duration),
    #[error("Peer connection lost: {0}")]
    Disconnected(String),
    #[error("Delivery queue is no longer running")]
    QueueClosed,

    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("An unknown error occurred: {0}")]
    Other(anyhow::Error),
}
