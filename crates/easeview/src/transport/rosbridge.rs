//! Production transport speaking the rosbridge JSON protocol over websockets.
//!
//! Wire format: one JSON object per text frame, discriminated by `op`
//! (`auth`, `advertise`, `publish`, `subscribe`, `call_service`,
//! `service_response`). Incoming `publish` frames are routed to per-topic
//! channels, `service_response` frames resolve the matching in-flight call.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use easeview_protocol::Credential;

use super::{Connection, EventSender, Transport, TransportEvent};
use crate::error::TransportError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

type TopicMap = Arc<DashMap<String, mpsc::UnboundedSender<Value>>>;
type PendingMap = Arc<DashMap<String, oneshot::Sender<Value>>>;

/// Factory for rosbridge websocket connections.
#[derive(Debug, Default)]
pub struct RosbridgeTransport;

impl RosbridgeTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for RosbridgeTransport {
    async fn connect(
        &self,
        url: &str,
        events: EventSender,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|err| TransportError::WebSocket(err.to_string()))?;
        let (sink, source) = stream.split();

        let (out_tx, out_rx) = mpsc::unbounded_channel::<String>();
        let topics: TopicMap = Arc::new(DashMap::new());
        let pending: PendingMap = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();

        tokio::spawn(write_loop(sink, out_rx, cancel.clone()));
        tokio::spawn(read_loop(
            source,
            topics.clone(),
            pending.clone(),
            events.clone(),
            cancel.clone(),
        ));

        // The handshake is done once connect_async returns; deliver the
        // event through the channel so callers see browser-like ordering.
        let _ = events.send(TransportEvent::Connected);

        Ok(Arc::new(RosbridgeConnection {
            out: out_tx,
            topics,
            pending,
            advertised: DashMap::new(),
            next_id: AtomicU64::new(0),
            cancel,
        }))
    }
}

async fn write_loop(mut sink: WsSink, mut out: mpsc::UnboundedReceiver<String>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = out.recv() => match frame {
                Some(text) => {
                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                        debug!("websocket send failed: {err}");
                        break;
                    }
                }
                None => break,
            },
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(
    mut source: WsSource,
    topics: TopicMap,
    pending: PendingMap,
    events: EventSender,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // A deliberate close still fires the close handler.
                let _ = events.send(TransportEvent::Closed);
                return;
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => route_frame(&text, &topics, &pending),
                Some(Ok(Message::Close(_))) | None => {
                    let _ = events.send(TransportEvent::Closed);
                    return;
                }
                Some(Ok(_)) => {} // binary/ping/pong frames carry no bus traffic
                Some(Err(err)) => {
                    let _ = events.send(TransportEvent::Error {
                        message: err.to_string(),
                    });
                    return;
                }
            },
        }
    }
}

/// Route one incoming frame to its topic channel or in-flight service call.
fn route_frame(text: &str, topics: &TopicMap, pending: &PendingMap) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            warn!("dropping malformed bus frame: {err}");
            return;
        }
    };

    match frame.get("op").and_then(Value::as_str) {
        Some("publish") => {
            let Some(topic) = frame.get("topic").and_then(Value::as_str) else {
                return;
            };
            let message = frame.get("msg").cloned().unwrap_or(Value::Null);
            let gone = topics
                .get(topic)
                .is_some_and(|tx| tx.send(message).is_err());
            if gone {
                topics.remove(topic);
            }
        }
        Some("service_response") => {
            let Some(id) = frame.get("id").and_then(Value::as_str) else {
                return;
            };
            if let Some((_, reply)) = pending.remove(id) {
                let _ = reply.send(service_values(&frame));
            }
        }
        Some(op) => debug!("ignoring bus frame with op {op}"),
        None => warn!("dropping bus frame without op"),
    }
}

/// Extract the payload of a `service_response`, folding a failed call into
/// an error object the query gateway understands.
fn service_values(frame: &Value) -> Value {
    let ok = frame.get("result").and_then(Value::as_bool).unwrap_or(true);
    let values = frame.get("values").cloned().unwrap_or(Value::Null);
    if ok {
        return values;
    }
    match values {
        Value::Object(mut map) => {
            map.entry("error".to_string())
                .or_insert_with(|| Value::String("service call failed".to_string()));
            Value::Object(map)
        }
        Value::Null => json!({ "error": "service call failed" }),
        other => json!({ "error": other }),
    }
}

struct RosbridgeConnection {
    out: mpsc::UnboundedSender<String>,
    topics: TopicMap,
    pending: PendingMap,
    advertised: DashMap<String, ()>,
    next_id: AtomicU64,
    cancel: CancellationToken,
}

impl RosbridgeConnection {
    fn send(&self, frame: Value) -> Result<(), TransportError> {
        self.out
            .send(frame.to_string())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn call_id(&self, service: &str) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("call_service:{service}:{seq}")
    }
}

#[async_trait]
impl Connection for RosbridgeConnection {
    async fn authenticate(&self, credential: &Credential) -> Result<(), TransportError> {
        let mut frame = serde_json::to_value(credential)
            .map_err(|err| TransportError::Malformed(err.to_string()))?;
        frame["op"] = Value::String("auth".to_string());
        self.send(frame)
    }

    async fn publish(
        &self,
        topic: &str,
        message_type: &str,
        message: Value,
    ) -> Result<(), TransportError> {
        if self.advertised.insert(topic.to_string(), ()).is_none() {
            self.send(json!({
                "op": "advertise",
                "topic": topic,
                "type": message_type,
            }))?;
        }
        self.send(json!({
            "op": "publish",
            "topic": topic,
            "msg": message,
        }))
    }

    async fn subscribe(
        &self,
        topic: &str,
        message_type: &str,
    ) -> Result<mpsc::UnboundedReceiver<Value>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics.insert(topic.to_string(), tx);
        self.send(json!({
            "op": "subscribe",
            "topic": topic,
            "type": message_type,
        }))?;
        Ok(rx)
    }

    async fn call_service(&self, service: &str, args: Value) -> Result<Value, TransportError> {
        let id = self.call_id(service);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        if let Err(err) = self.send(json!({
            "op": "call_service",
            "service": service,
            "args": args,
            "id": id,
        })) {
            self.pending.remove(&id);
            return Err(err);
        }
        rx.await.map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&self) {
        self.cancel.cancel();
        // In-flight calls never resolve on a closed connection.
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps() -> (TopicMap, PendingMap) {
        (Arc::new(DashMap::new()), Arc::new(DashMap::new()))
    }

    #[test]
    fn test_route_publish_frame_to_topic_channel() {
        let (topics, pending) = maps();
        let (tx, mut rx) = mpsc::unbounded_channel();
        topics.insert("/camera/pose".to_string(), tx);

        route_frame(
            r#"{"op":"publish","topic":"/camera/pose","msg":{"position":{"x":1.0}}}"#,
            &topics,
            &pending,
        );

        let message = rx.try_recv().unwrap();
        assert_eq!(message["position"]["x"], 1.0);
    }

    #[test]
    fn test_route_service_response_resolves_pending_call() {
        let (topics, pending) = maps();
        let (tx, rx) = oneshot::channel();
        pending.insert("call_service:/json_prolog/simple_query:0".to_string(), tx);

        route_frame(
            r#"{"op":"service_response","id":"call_service:/json_prolog/simple_query:0","result":true,"values":{"ok":true}}"#,
            &topics,
            &pending,
        );

        assert_eq!(rx.blocking_recv().unwrap(), json!({"ok": true}));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_failed_service_response_carries_error() {
        let frame: Value = serde_json::from_str(
            r#"{"op":"service_response","id":"x","result":false,"values":null}"#,
        )
        .unwrap();
        let values = service_values(&frame);
        assert!(values.get("error").is_some());
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let (topics, pending) = maps();
        route_frame("not json", &topics, &pending);
        route_frame(r#"{"topic":"/x"}"#, &topics, &pending);
        assert!(topics.is_empty());
        assert!(pending.is_empty());
    }
}
