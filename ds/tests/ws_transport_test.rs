use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::Message;

use ds::{AppMessage, DeliveryServiceError, PeerFrame, Transport, WsTransport};

/// Minimal watch bridge: acks everything except `reject` (nack) and `silent`
/// (no answer), hangs up on `hangup`, and greets the client with a request.
async fn spawn_bridge() -> (String, tokio::sync::mpsc::UnboundedReceiver<PeerFrame>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let greeting = PeerFrame::AppMessage {
            id: 100,
            payload: AppMessage::new().with("request", 0),
        };
        ws.send(Message::Text(serde_json::to_string(&greeting).unwrap()))
            .await
            .unwrap();

        while let Some(Ok(frame)) = ws.next().await {
            let Message::Text(text) = frame else {
                continue;
            };
            let frame: PeerFrame = serde_json::from_str(&text).unwrap();
            seen_tx.send(frame.clone()).unwrap();
            let PeerFrame::AppMessage { id, payload } = frame else {
                continue;
            };
            let reply = if payload.get("reject").is_some() {
                PeerFrame::Nack {
                    id,
                    error: "busy".to_string(),
                }
            } else if payload.get("silent").is_some() {
                continue;
            } else if payload.get("hangup").is_some() {
                break;
            } else {
                PeerFrame::Ack { id }
            };
            ws.send(Message::Text(serde_json::to_string(&reply).unwrap()))
                .await
                .unwrap();
        }
    });

    (addr, seen_rx)
}

#[tokio::test]
async fn test_ack_and_nack() {
    let (addr, _seen) = spawn_bridge().await;
    let (transport, _inbound) = WsTransport::connect(&addr, Duration::from_secs(5))
        .await
        .expect("Failed to connect");

    transport
        .send(&AppMessage::new().with("ready", 1))
        .await
        .expect("Message should be acknowledged");

    let res = transport.send(&AppMessage::new().with("reject", 1)).await;
    assert!(matches!(res, Err(DeliveryServiceError::Nack(e)) if e == "busy"));
}

#[tokio::test]
async fn test_inbound_messages_are_acked_and_forwarded() {
    let (addr, mut seen) = spawn_bridge().await;
    let (_transport, mut inbound) = WsTransport::connect(&addr, Duration::from_secs(5))
        .await
        .expect("Failed to connect");

    let payload = tokio::time::timeout(Duration::from_secs(5), inbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload.get_int("request"), Some(0));

    let ack = tokio::time::timeout(Duration::from_secs(5), seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ack, PeerFrame::Ack { id: 100 });
}

#[tokio::test]
async fn test_missing_ack_times_out() {
    let (addr, _seen) = spawn_bridge().await;
    let (transport, _inbound) = WsTransport::connect(&addr, Duration::from_millis(200))
        .await
        .expect("Failed to connect");

    let res = transport.send(&AppMessage::new().with("silent", 1)).await;
    assert!(matches!(res, Err(DeliveryServiceError::AckTimeout(_))));
}

#[tokio::test]
async fn test_hangup_fails_pending_and_later_sends() {
    let (addr, _seen) = spawn_bridge().await;
    let (transport, _inbound) = WsTransport::connect(&addr, Duration::from_secs(5))
        .await
        .expect("Failed to connect");

    let res = transport.send(&AppMessage::new().with("hangup", 1)).await;
    assert!(matches!(res, Err(DeliveryServiceError::Disconnected(_))));

    let res = transport.send(&AppMessage::new().with("ready", 1)).await;
    assert!(matches!(res, Err(DeliveryServiceError::Disconnected(_))));
}
