//! Async driver for the [`DeliveryQueue`].
//!
//! The queue lives inside a single tokio task. Submissions reach it over an
//! unbounded command channel, so [`DeliveryService::submit`] never blocks,
//! and the one outstanding transport call is polled by the same loop. All
//! state transitions therefore happen on one execution context and no lock
//! guards the queue.
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    message::AppMessage,
    queue::{DeliveryQueue, QueueStatus},
    retry::RetryPolicy,
    transport::Transport,
    DeliveryServiceError,
};

/// Progress notifications for observers of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    Delivered {
        message: AppMessage,
        attempts: u32,
    },
    Retrying {
        message: AppMessage,
        /// Number of the transmission about to be issued.
        attempt: u32,
        delay: Duration,
        error: String,
    },
    /// Retry budget exhausted; only emitted when the policy caps attempts.
    Abandoned {
        message: AppMessage,
        attempts: u32,
        error: String,
    },
}

#[derive(Debug)]
enum Command {
    Submit(AppMessage),
    Status(oneshot::Sender<QueueStatus>),
}

type InFlight = Pin<Box<dyn Future<Output = Result<(), DeliveryServiceError>> + Send>>;

/// Handle to a running delivery queue.
#[derive(Clone)]
pub struct DeliveryService {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<DeliveryEvent>,
}

impl DeliveryService {
    /// Spawn the queue task on the current tokio runtime.
    ///
    /// The task runs until every handle is dropped and the queue has drained.
    pub fn start(transport: Arc<dyn Transport>, policy: RetryPolicy) -> (Self, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(256);

        let driver = Driver {
            queue: DeliveryQueue::new(),
            transport,
            policy,
            commands: commands_rx,
            events: events_tx.clone(),
        };
        let handle = tokio::spawn(driver.run());

        (
            Self {
                commands: commands_tx,
                events: events_tx,
            },
            handle,
        )
    }

    /// Hand a message over for delivery.
    pub fn submit(&self, msg: AppMessage) -> Result<(), DeliveryServiceError> {
        self.commands
            .send(Command::Submit(msg))
            .map_err(|_| DeliveryServiceError::QueueClosed)
    }

    pub async fn status(&self) -> Result<QueueStatus, DeliveryServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Status(reply_tx))
            .map_err(|_| DeliveryServiceError::QueueClosed)?;
        reply_rx.await.map_err(|_| DeliveryServiceError::QueueClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.events.subscribe()
    }
}

struct Driver {
    queue: DeliveryQueue,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<DeliveryEvent>,
}

impl Driver {
    async fn run(mut self) {
        info!("Delivery queue started");
        let mut in_flight: Option<InFlight> = None;
        let mut accepting = true;

        loop {
            if !accepting && in_flight.is_none() {
                break;
            }
            tokio::select! {
                cmd = self.commands.recv(), if accepting => match cmd {
                    Some(Command::Submit(msg)) => {
                        if let Some(msg) = self.queue.submit(msg) {
                            in_flight = Some(self.transmit(msg, Duration::ZERO));
                        }
                    }
                    Some(Command::Status(reply)) => {
                        let _ = reply.send(self.queue.status());
                    }
                    None => {
                        debug!("All queue handles dropped, draining");
                        accepting = false;
                    }
                },
                outcome = wait(&mut in_flight), if in_flight.is_some() => {
                    in_flight = self.on_outcome(outcome);
                }
            }
        }
        info!("Delivery queue finished");
    }

    fn transmit(&self, msg: AppMessage, delay: Duration) -> InFlight {
        let transport = Arc::clone(&self.transport);
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            transport.send(&msg).await
        })
    }

    fn on_outcome(&mut self, outcome: Result<(), DeliveryServiceError>) -> Option<InFlight> {
        match outcome {
            Ok(()) => {
                if let Some(done) = self.queue.on_success() {
                    debug!("Delivered {} after {} attempt(s)", done.message, done.attempts);
                    let _ = self.events.send(DeliveryEvent::Delivered {
                        message: done.message,
                        attempts: done.attempts,
                    });
                }
            }
            Err(err) => {
                let failed = self.queue.current()?.attempts;
                match self.policy.backoff(failed) {
                    Some(delay) => {
                        let current = self.queue.on_failure()?;
                        warn!(
                            "Send failed ({err}), retrying {} in {delay:?} (attempt {})",
                            current.message, current.attempts
                        );
                        let message = current.message.clone();
                        let _ = self.events.send(DeliveryEvent::Retrying {
                            message: message.clone(),
                            attempt: current.attempts,
                            delay,
                            error: err.to_string(),
                        });
                        return Some(self.transmit(message, delay));
                    }
                    None => {
                        let dropped = self.queue.abandon()?;
                        error!(
                            "Giving up on {} after {} attempt(s): {err}",
                            dropped.message, dropped.attempts
                        );
                        let _ = self.events.send(DeliveryEvent::Abandoned {
                            message: dropped.message,
                            attempts: dropped.attempts,
                            error: err.to_string(),
                        });
                    }
                }
            }
        }
        // Head of the queue, if any, goes out next.
        let next = self.queue.current()?.message.clone();
        Some(self.transmit(next, Duration::ZERO))
    }
}

async fn wait(in_flight: &mut Option<InFlight>) -> Result<(), DeliveryServiceError> {
    match in_flight {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}
