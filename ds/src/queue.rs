//! Delivery queue state machine.
//!
//! [`DeliveryQueue`] tracks the pending messages and the single message in
//! flight. It does not touch the transport: the driver in
//! [`crate::service`] feeds it submissions and acknowledgments and transmits
//! whatever it is told to.
//!
//! # Contract
//! - At most **one** message is in flight (`Sending`).
//! - Pending messages are sent in submission order; nothing is reordered.
//! - A failed message is resent in place and never goes back into the queue.
use std::collections::VecDeque;
use std::fmt::Display;

use log::{debug, warn};

use crate::message::AppMessage;

/// The message currently awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outstanding {
    pub message: AppMessage,
    /// Number of transmissions issued so far (1 = first send).
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeliveryState {
    #[default]
    Idle,
    Sending(Outstanding),
}

impl Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            DeliveryState::Idle => "Idle",
            DeliveryState::Sending(_) => "Sending",
        };
        write!(f, "{state}")
    }
}

/// Point-in-time view of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub sending: bool,
    /// Transmissions of the in-flight message, `0` when idle.
    pub attempts: u32,
    /// Messages waiting behind the in-flight one.
    pub pending: usize,
}

#[derive(Debug, Default)]
pub struct DeliveryQueue {
    state: DeliveryState,
    pending: VecDeque<AppMessage>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a message.
    ///
    /// Returns the message to transmit right away when the queue was idle,
    /// `None` when it was appended behind the in-flight message.
    pub fn submit(&mut self, msg: AppMessage) -> Option<AppMessage> {
        match self.state {
            DeliveryState::Idle => {
                debug!("[submit] Idle -> Sending");
                self.state = DeliveryState::Sending(Outstanding {
                    message: msg.clone(),
                    attempts: 1,
                });
                Some(msg)
            }
            DeliveryState::Sending(_) => {
                self.pending.push_back(msg);
                debug!("[submit] Queued, {} pending", self.pending.len());
                None
            }
        }
    }

    /// The in-flight message was acknowledged.
    ///
    /// Returns the released message and moves the next pending one (if any)
    /// into flight; see [`DeliveryQueue::current`] for what to transmit next.
    pub fn on_success(&mut self) -> Option<Outstanding> {
        let DeliveryState::Sending(done) = std::mem::take(&mut self.state) else {
            warn!("[on_success] Acknowledgment while idle, ignoring");
            return None;
        };
        self.advance();
        Some(done)
    }

    /// The in-flight message failed; it stays in flight for a resend.
    pub fn on_failure(&mut self) -> Option<&Outstanding> {
        match &mut self.state {
            DeliveryState::Sending(current) => {
                current.attempts += 1;
                debug!("[on_failure] Resending, attempt {}", current.attempts);
                Some(current)
            }
            DeliveryState::Idle => {
                warn!("[on_failure] Failure while idle, ignoring");
                None
            }
        }
    }

    /// Drop the in-flight message without an acknowledgment and advance.
    ///
    /// Only reachable through a retry policy with an attempt cap.
    pub fn abandon(&mut self) -> Option<Outstanding> {
        let DeliveryState::Sending(dropped) = std::mem::take(&mut self.state) else {
            return None;
        };
        self.advance();
        Some(dropped)
    }

    fn advance(&mut self) {
        self.state = match self.pending.pop_front() {
            Some(next) => DeliveryState::Sending(Outstanding {
                message: next,
                attempts: 1,
            }),
            None => DeliveryState::Idle,
        };
        debug!("[advance] -> {}, {} pending", self.state, self.pending.len());
    }

    pub fn current(&self) -> Option<&Outstanding> {
        match &self.state {
            DeliveryState::Sending(current) => Some(current),
            DeliveryState::Idle => None,
        }
    }

    pub fn state(&self) -> &DeliveryState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DeliveryState::Idle
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            sending: !self.is_idle(),
            attempts: self.current().map_or(0, |c| c.attempts),
            pending: self.pending.len(),
        }
    }
}
