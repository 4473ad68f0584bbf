//! WebSocket link to the watch bridge.
//!
//! Frames are JSON text messages tagged by `type`:
//! - `{"type":"app_message","id":7,"payload":{...}}` carries a message in
//!   either direction;
//! - `{"type":"ack","id":7}` / `{"type":"nack","id":7,"error":"..."}`
//!   answer an `app_message` with the same id.
//!
//! [`WsTransport::send`] resolves when the matching answer arrives. Inbound
//! `app_message` frames are acknowledged and forwarded to the receiver
//! returned by [`WsTransport::connect`].
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::{message::AppMessage, transport::Transport, DeliveryServiceError};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerFrame {
    AppMessage { id: u64, payload: AppMessage },
    Ack { id: u64 },
    Nack { id: u64, error: String },
}

type PendingAcks = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<(), DeliveryServiceError>>>>>;

pub struct WsTransport {
    sender: mpsc::UnboundedSender<Message>,
    pending: PendingAcks,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    ack_timeout: Duration,
}

impl WsTransport {
    pub async fn connect(
        addr: &str,
        ack_timeout: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AppMessage>), DeliveryServiceError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(addr).await?;
        info!("Connected to peer at {addr}");
        let (mut write, mut read) = ws_stream.split();
        let (sender, mut outgoing) = mpsc::unbounded_channel::<Message>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let pending: PendingAcks = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));

        // Spawn a task to handle outgoing frames
        tokio::spawn(async move {
            while let Some(message) = outgoing.recv().await {
                if let Err(e) = write.send(message).await {
                    error!("Error writing frame to peer: {e}");
                    break;
                }
            }
        });

        // Spawn a task to handle incoming frames
        let reader_pending = Arc::clone(&pending);
        let reader_closed = Arc::clone(&closed);
        let reader_sender = sender.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        handle_frame(&text, &reader_pending, &reader_sender, &inbound_tx).await
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Peer link error: {e}");
                        break;
                    }
                }
            }
            info!("Peer connection closed");
            reader_closed.store(true, Ordering::Release);
            for (_, waiter) in reader_pending.lock().await.drain() {
                let _ = waiter.send(Err(DeliveryServiceError::Disconnected(
                    "connection closed".to_string(),
                )));
            }
        });

        Ok((
            Self {
                sender,
                pending,
                closed,
                next_id: AtomicU64::new(1),
                ack_timeout,
            },
            inbound_rx,
        ))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, msg: &AppMessage) -> Result<(), DeliveryServiceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&PeerFrame::AppMessage {
            id,
            payload: msg.clone(),
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, reply_tx);
        // The reader sets `closed` before it drains `pending`.
        if self.closed.load(Ordering::Acquire) {
            self.pending.lock().await.remove(&id);
            return Err(DeliveryServiceError::Disconnected(
                "connection closed".to_string(),
            ));
        }
        if self.sender.send(Message::Text(frame)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(DeliveryServiceError::Disconnected(
                "writer stopped".to_string(),
            ));
        }

        match tokio::time::timeout(self.ack_timeout, reply_rx).await {
            Ok(Ok(res)) => res,
            Ok(Err(_)) => Err(DeliveryServiceError::Disconnected(
                "acknowledgment dropped".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(DeliveryServiceError::AckTimeout(self.ack_timeout))
            }
        }
    }
}

async fn handle_frame(
    text: &str,
    pending: &PendingAcks,
    sender: &mpsc::UnboundedSender<Message>,
    inbound: &mpsc::UnboundedSender<AppMessage>,
) {
    let frame = match serde_json::from_str::<PeerFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            match unreadable_app_message_id(text) {
                Some(id) => {
                    warn!("Rejecting app message {id} from peer: {e}");
                    let error = e.to_string();
                    reply(sender, &PeerFrame::Nack { id, error });
                }
                None => warn!("Ignoring malformed frame from peer: {e}"),
            }
            return;
        }
    };
    match frame {
        PeerFrame::Ack { id } => resolve(pending, id, Ok(())).await,
        PeerFrame::Nack { id, error } => {
            resolve(pending, id, Err(DeliveryServiceError::Nack(error))).await
        }
        PeerFrame::AppMessage { id, payload } => {
            debug!("appmsg: {payload}");
            reply(sender, &PeerFrame::Ack { id });
            let _ = inbound.send(payload);
        }
    }
}

/// Id of an `app_message` frame whose payload could not be decoded.
fn unreadable_app_message_id(text: &str) -> Option<u64> {
    let value = serde_json::from_str::<serde_json::Value>(text).ok()?;
    if value.get("type")?.as_str()? != "app_message" {
        return None;
    }
    value.get("id")?.as_u64()
}

fn reply(sender: &mpsc::UnboundedSender<Message>, frame: &PeerFrame) {
    match serde_json::to_string(frame) {
        Ok(text) => {
            let _ = sender.send(Message::Text(text));
        }
        Err(e) => error!("Failed to encode reply {frame:?}: {e}"),
    }
}

async fn resolve(pending: &PendingAcks, id: u64, res: Result<(), DeliveryServiceError>) {
    match pending.lock().await.remove(&id) {
        Some(waiter) => {
            let _ = waiter.send(res);
        }
        None => debug!("Acknowledgment for unknown or expired frame {id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> (
        PendingAcks,
        mpsc::UnboundedSender<Message>,
        mpsc::UnboundedReceiver<Message>,
        mpsc::UnboundedSender<AppMessage>,
        mpsc::UnboundedReceiver<AppMessage>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (Arc::default(), out_tx, out_rx, in_tx, in_rx)
    }

    fn sent_frame(out: &mut mpsc::UnboundedReceiver<Message>) -> PeerFrame {
        match out.try_recv() {
            Ok(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_nacked() {
        let (pending, out_tx, mut out_rx, in_tx, mut in_rx) = channels();

        let text = r#"{"type":"app_message","id":9,"payload":{"lat":51.5}}"#;
        handle_frame(text, &pending, &out_tx, &in_tx).await;

        assert!(matches!(sent_frame(&mut out_rx), PeerFrame::Nack { id: 9, .. }));
        assert!(in_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_inbound_message_is_acked() {
        let (pending, out_tx, mut out_rx, in_tx, mut in_rx) = channels();

        let text = r#"{"type":"app_message","id":4,"payload":{"request":0}}"#;
        handle_frame(text, &pending, &out_tx, &in_tx).await;

        assert_eq!(sent_frame(&mut out_rx), PeerFrame::Ack { id: 4 });
        assert_eq!(in_rx.try_recv().unwrap(), AppMessage::new().with("request", 0));
    }

    #[tokio::test]
    async fn test_garbage_gets_no_reply() {
        let (pending, out_tx, mut out_rx, in_tx, _in_rx) = channels();
        handle_frame("not json", &pending, &out_tx, &in_tx).await;
        handle_frame(r#"{"type":"ack","id":"x"}"#, &pending, &out_tx, &in_tx).await;
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_on_closed_link_fails_without_waiting() {
        let (pending, sender, _out_rx, _, _) = channels();
        let transport = WsTransport {
            sender,
            pending: Arc::clone(&pending),
            closed: Arc::new(AtomicBool::new(true)),
            next_id: AtomicU64::new(1),
            ack_timeout: Duration::from_secs(3600),
        };

        let started = tokio::time::Instant::now();
        let res = transport.send(&AppMessage::new().with("ready", 1)).await;
        assert!(matches!(res, Err(DeliveryServiceError::Disconnected(_))));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(pending.lock().await.is_empty());
    }

    #[test]
    fn test_frame_json() {
        let frame = PeerFrame::AppMessage {
            id: 3,
            payload: AppMessage::new().with("ready", 1),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"type":"app_message","id":3,"payload":{"ready":1}}"#);

        let nack: PeerFrame =
            serde_json::from_str(r#"{"type":"nack","id":3,"error":"busy"}"#).unwrap();
        assert_eq!(
            nack,
            PeerFrame::Nack {
                id: 3,
                error: "busy".to_string()
            }
        );
    }
}
