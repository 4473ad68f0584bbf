//! Reliable, ordered delivery of application messages to a single peer.
//!
//! - [`message`]: the key/value payload model.
//! - [`transport`]: the send capability the queue consumes.
//! - [`queue`]: the idle/sending state machine.
//! - [`service`]: the tokio task that drives the state machine.
//! - [`retry`]: back-off between resends.
//! - [`ws_transport`]: a WebSocket [`Transport`](transport::Transport).
pub mod message;
pub mod queue;
pub mod retry;
pub mod service;
pub mod transport;
pub mod ws_transport;

mod error;

pub use error::DeliveryServiceError;
pub use message::{AppMessage, Value};
pub use queue::{DeliveryQueue, DeliveryState, Outstanding, QueueStatus};
pub use retry::RetryPolicy;
pub use service::{DeliveryEvent, DeliveryService};
pub use transport::{send_once, Transport};
pub use ws_transport::{PeerFrame, WsTransport};
