//! Transport capability consumed by the delivery queue.
use async_trait::async_trait;
use log::{error, info};

use crate::{message::AppMessage, DeliveryServiceError};

/// Sends one message to the peer and reports the acknowledgment.
///
/// Every call resolves exactly once: `Ok(())` when the peer acknowledged the
/// message, `Err(_)` when the attempt failed. Framing and the actual wire
/// transmission are the implementation's business.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, msg: &AppMessage) -> Result<(), DeliveryServiceError>;
}

/// Single attempt send that bypasses the delivery queue.
///
/// Used for messages that are not worth retrying (handshake, position fixes).
/// The outcome is only logged; the result is handed back for callers that
/// care.
pub async fn send_once(
    transport: &dyn Transport,
    msg: &AppMessage,
) -> Result<(), DeliveryServiceError> {
    let res = transport.send(msg).await;
    match &res {
        Ok(()) => info!("Send successful: {msg}"),
        Err(e) => error!("Send failed! {msg}: {e}"),
    }
    res
}
