use crate::domain::BusError;
use crate::domain::ports::{Delivery, MessageBus};
use crate::interface_adapters::bus::TopicExchange;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::rand_id;

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures_util::SinkExt;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{Instrument, debug, info, info_span, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const OUTBOUND_CAPACITY: usize = 1024;

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    BusClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

/// Frames a remote client sends over `/bus`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientFrame {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Publish { topic: String, payload: Box<RawValue> },
}

/// Frames the bridge pushes to a remote client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerFrame<'a> {
    Delivery { topic: &'a str, payload: &'a RawValue },
    Error { message: String },
}

enum LoopControl {
    Continue,
    Disconnect,
}

// One remote subscription: the bus id plus the task forwarding into the socket queue.
struct Forwarder {
    subscription_id: u64,
    task: JoinHandle<()>,
}

struct ConnCtx {
    bus: Arc<TopicExchange>,
    outbound_tx: mpsc::Sender<Delivery>,
    forwarders: HashMap<String, Forwarder>,

    msgs_in: u64,
    msgs_out: u64,
    invalid_json: u32,
    last_invalid_log: Instant,

    close_frame: Option<CloseFrame>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let bus = state.bus.clone();
    // Separate connection id for correlating logs across the session.
    let span = info_span!("conn", conn_id = rand_id());
    ws.on_upgrade(move |socket| handle_socket(socket, bus).instrument(span))
}

async fn handle_socket(mut socket: WebSocket, bus: Arc<TopicExchange>) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Delivery>(OUTBOUND_CAPACITY);
    let mut ctx = ConnCtx {
        bus,
        outbound_tx,
        forwarders: HashMap::new(),
        msgs_in: 0,
        msgs_out: 0,
        invalid_json: 0,
        last_invalid_log: Instant::now() - LOG_THROTTLE,
        close_frame: None,
    };
    info!("bridge client connected");

    let result = run_client_loop(&mut socket, &mut ctx, &mut outbound_rx).await;

    for (topic, forwarder) in ctx.forwarders.drain() {
        forwarder.task.abort();
        ctx.bus.unsubscribe(forwarder.subscription_id);
        debug!(%topic, "released subscription");
    }

    match result {
        Ok(()) => info!(
            msgs_in = ctx.msgs_in,
            msgs_out = ctx.msgs_out,
            "bridge client disconnected"
        ),
        Err(e) => warn!(error = ?e, "bridge client loop exited with error"),
    }
}

async fn run_client_loop(
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
    outbound_rx: &mut mpsc::Receiver<Delivery>,
) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(socket, incoming, ctx).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }
            Some(delivery) = outbound_rx.recv() => {
                match forward_delivery(socket, &delivery).await {
                    Ok(()) => {
                        ctx.msgs_out += 1;
                        false
                    }
                    Err(e) => {
                        debug!(error = ?e, "failed to forward delivery; disconnecting");
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    socket: &mut WebSocket,
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let message = match incoming {
        Some(Ok(message)) => message,
        Some(Err(e)) => {
            debug!(error = ?e, "websocket receive error");
            return Ok(LoopControl::Disconnect);
        }
        None => return Ok(LoopControl::Disconnect),
    };

    match message {
        Message::Text(text) => {
            ctx.msgs_in += 1;
            match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => handle_frame(socket, frame, ctx).await,
                Err(e) => {
                    ctx.invalid_json += 1;
                    if should_log(&mut ctx.last_invalid_log) {
                        warn!(error = %e, count = ctx.invalid_json, "invalid bridge frame");
                    }
                    if ctx.invalid_json > MAX_INVALID_JSON {
                        ctx.close_frame = Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: "too many invalid messages".into(),
                        });
                        return Ok(LoopControl::Disconnect);
                    }
                    send_error(socket, format!("invalid frame: {e}")).await?;
                    Ok(LoopControl::Continue)
                }
            }
        }
        Message::Binary(_) => {
            ctx.close_frame = Some(CloseFrame {
                code: close_code::UNSUPPORTED,
                reason: "binary messages not supported".into(),
            });
            Ok(LoopControl::Disconnect)
        }
        Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
        Message::Close(_) => Ok(LoopControl::Disconnect),
    }
}

async fn handle_frame(
    socket: &mut WebSocket,
    frame: ClientFrame,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match frame {
        ClientFrame::Subscribe { topic } => {
            if ctx.forwarders.contains_key(&topic) {
                debug!(%topic, "already subscribed");
                return Ok(LoopControl::Continue);
            }
            match ctx.bus.subscribe(&topic) {
                Ok(mut subscription) => {
                    let subscription_id = subscription.id;
                    let outbound_tx = ctx.outbound_tx.clone();
                    let task = tokio::spawn(
                        async move {
                            while let Some(delivery) = subscription.recv().await {
                                if outbound_tx.send(delivery).await.is_err() {
                                    break;
                                }
                            }
                        }
                        .in_current_span(),
                    );
                    debug!(%topic, subscription_id, "subscribed");
                    ctx.forwarders.insert(
                        topic,
                        Forwarder {
                            subscription_id,
                            task,
                        },
                    );
                    Ok(LoopControl::Continue)
                }
                Err(BusError::Closed) => Err(NetError::BusClosed),
                Err(e) => {
                    send_error(socket, e.to_string()).await?;
                    Ok(LoopControl::Continue)
                }
            }
        }
        ClientFrame::Unsubscribe { topic } => {
            if let Some(forwarder) = ctx.forwarders.remove(&topic) {
                forwarder.task.abort();
                ctx.bus.unsubscribe(forwarder.subscription_id);
                debug!(%topic, "unsubscribed");
            }
            Ok(LoopControl::Continue)
        }
        ClientFrame::Publish { topic, payload } => {
            match ctx.bus.publish(&topic, Arc::from(payload.get())) {
                Ok(()) => Ok(LoopControl::Continue),
                Err(BusError::Closed) => Err(NetError::BusClosed),
                Err(e) => {
                    send_error(socket, e.to_string()).await?;
                    Ok(LoopControl::Continue)
                }
            }
        }
    }
}

async fn forward_delivery(socket: &mut WebSocket, delivery: &Delivery) -> Result<(), NetError> {
    // Bus payloads are JSON text; anything else is forwarded as a JSON string.
    let owned;
    let payload: &RawValue = match serde_json::from_str::<&RawValue>(&delivery.payload) {
        Ok(raw) => raw,
        Err(_) => {
            owned = serde_json::value::to_raw_value(&*delivery.payload)
                .map_err(NetError::Serialization)?;
            &*owned
        }
    };
    send_frame(
        socket,
        &ServerFrame::Delivery {
            topic: &delivery.topic,
            payload,
        },
    )
    .await
}

async fn send_error(socket: &mut WebSocket, message: String) -> Result<(), NetError> {
    send_frame(socket, &ServerFrame::Error { message }).await
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame<'_>) -> Result<(), NetError> {
    let txt = serde_json::to_string(frame).map_err(NetError::Serialization)?;
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_frame_keeps_payload_verbatim() {
        let text = r#"{"type":"Publish","data":{"topic":"party.p.input","payload":{"acceleration":1.0}}}"#;
        let frame: ClientFrame = serde_json::from_str(text).expect("valid frame");
        let ClientFrame::Publish { topic, payload } = frame else {
            panic!("expected publish");
        };
        assert_eq!(topic, "party.p.input");
        assert_eq!(payload.get(), r#"{"acceleration":1.0}"#);
    }

    #[test]
    fn delivery_frame_embeds_payload_as_json() {
        let raw = RawValue::from_string(r#"{"partyState":1}"#.to_string()).expect("raw");
        let value = serde_json::to_value(ServerFrame::Delivery {
            topic: "party.p.sync.u",
            payload: &raw,
        })
        .expect("serialize");
        assert_eq!(
            value,
            json!({ "type": "Delivery", "data": { "topic": "party.p.sync.u", "payload": { "partyState": 1 } } })
        );
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let result = serde_json::from_str::<ClientFrame>(r#"{"type":"Shout","data":{}}"#);
        assert!(result.is_err());
    }
}
