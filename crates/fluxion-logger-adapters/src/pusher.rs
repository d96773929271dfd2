// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Pusher Channels subscriber (protocol 7) for the telemetry feed.
//!
//! Every configured channel carries one telemetry signal. Data events have
//! the shape `{"payload": [[timestamp_ms, value], ...]}` and are forwarded
//! sample by sample as [`FeedEvent`]s. Any loss of the socket is reported
//! as [`FeedEvent::Disconnected`]; reconnecting is left to the supervisor.

use crate::error::FeedError;
use fluxion_logger::{FeedEvent, Sample};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

const PROTOCOL_VERSION: u8 = 7;

/// Pusher error codes in this range mean "do not reconnect".
const FATAL_ERROR_CODES: std::ops::Range<u16> = 4000..4100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PusherConfig {
    /// Full websocket URL, see [`PusherConfig::endpoint`].
    pub url: String,
    pub channels: Vec<String>,
    /// Name of the event carrying telemetry payloads.
    pub event: String,
}

impl PusherConfig {
    /// Public Pusher endpoint for an app key and cluster.
    pub fn endpoint(key: &str, cluster: &str) -> String {
        let version = env!("CARGO_PKG_VERSION");
        format!(
            "wss://ws-{cluster}.pusher.com/app/{key}\
             ?protocol={PROTOCOL_VERSION}&client=fluxion-logger&version={version}&flash=false"
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PusherFrame {
    ConnectionEstablished { socket_id: String },
    SubscriptionSucceeded { channel: String },
    Ping,
    Error { code: Option<u16>, message: String },
    Data {
        channel: String,
        samples: Vec<Sample>,
    },
    Ignored { event: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ConnectionData {
    socket_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TelemetryPayload {
    payload: Vec<(i64, f64)>,
}

/// Event data is usually a JSON document encoded as a string.
fn decode_data(data: Value) -> Result<Value, FeedError> {
    match data {
        Value::String(s) => Ok(serde_json::from_str(&s)?),
        other => Ok(other),
    }
}

/// Decode one text frame. `data_event` is the telemetry event name.
pub fn parse_frame(text: &str, data_event: &str) -> Result<PusherFrame, FeedError> {
    let raw: RawFrame = serde_json::from_str(text)?;

    let frame = match raw.event.as_str() {
        "pusher:connection_established" => {
            let data: ConnectionData = serde_json::from_value(decode_data(raw.data)?)?;
            PusherFrame::ConnectionEstablished {
                socket_id: data.socket_id,
            }
        }
        "pusher_internal:subscription_succeeded" => PusherFrame::SubscriptionSucceeded {
            channel: raw.channel.unwrap_or_default(),
        },
        "pusher:ping" => PusherFrame::Ping,
        "pusher:error" => {
            let data: ErrorData = serde_json::from_value(decode_data(raw.data)?)?;
            PusherFrame::Error {
                code: data.code,
                message: data.message,
            }
        }
        event if event == data_event => {
            let channel = raw
                .channel
                .ok_or_else(|| FeedError::Protocol(format!("'{event}' without channel")))?;
            let data: TelemetryPayload = serde_json::from_value(decode_data(raw.data)?)?;
            PusherFrame::Data {
                channel,
                samples: data
                    .payload
                    .into_iter()
                    .map(|(timestamp, value)| Sample::new(timestamp, value))
                    .collect(),
            }
        }
        event => PusherFrame::Ignored {
            event: event.to_owned(),
        },
    };

    Ok(frame)
}

/// Running subscription. Dropping it without [`FeedHandle::disconnect`]
/// leaves the socket task running.
#[derive(Debug)]
pub struct FeedHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Close the socket and wait for the feed task to finish.
    pub async fn disconnect(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already be gone after a disconnect
            let _ = shutdown.send(());
        }
        if let Err(e) = self.task.await {
            warn!("⚠️ Feed task ended abnormally: {}", e);
        }
    }
}

#[derive(Debug)]
pub struct PusherFeed;

impl PusherFeed {
    /// Open the socket and start forwarding telemetry into `events`.
    pub async fn connect(
        config: PusherConfig,
        events: mpsc::Sender<FeedEvent>,
    ) -> Result<FeedHandle, FeedError> {
        let (stream, _) = tokio_tungstenite::connect_async(config.url.as_str()).await?;
        info!(
            "🔌 [FEED] Connected, subscribing to {} channels",
            config.channels.len()
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_socket(stream, config, events, shutdown_rx));

        Ok(FeedHandle {
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

type Writer<S> = SplitSink<WebSocketStream<S>, Message>;

async fn send_json<S>(write: &mut Writer<S>, value: &Value) -> Result<(), FeedError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write.send(Message::Text(value.to_string().into())).await?;
    Ok(())
}

async fn run_socket<S>(
    stream: WebSocketStream<S>,
    config: PusherConfig,
    events: mpsc::Sender<FeedEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, mut read) = stream.split();

    let reason = loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match parse_frame(text.as_str(), &config.event) {
                        Ok(frame) => {
                            let handled = handle_frame(frame, &config, &mut write, &events).await;
                            if let Err(reason) = handled {
                                break reason;
                            }
                        }
                        Err(e) => warn!("⚠️ [FEED] Skipping frame: {}", e),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break format!("server closed the connection ({frame:?})");
                }
                Some(Ok(
                    Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_),
                )) => {}
                Some(Err(e)) => break format!("websocket error: {e}"),
                None => break "websocket stream ended".to_owned(),
            },
            _ = &mut shutdown_rx => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!("Close frame not sent: {}", e);
                }
                info!("🔌 [FEED] Disconnected");
                return;
            }
        }
    };

    error!("❌ [FEED] Lost telemetry feed: {}", reason);
    if events
        .send(FeedEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("Disconnect not delivered, ingest already stopped");
    }
}

/// Returns the disconnect reason when the frame ends the session.
async fn handle_frame<S>(
    frame: PusherFrame,
    config: &PusherConfig,
    write: &mut Writer<S>,
    events: &mpsc::Sender<FeedEvent>,
) -> Result<(), String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match frame {
        PusherFrame::ConnectionEstablished { socket_id } => {
            debug!("[FEED] Socket id {}", socket_id);
            for channel in &config.channels {
                let subscribe = json!({
                    "event": "pusher:subscribe",
                    "data": { "channel": channel }
                });
                send_json(write, &subscribe)
                    .await
                    .map_err(|e| format!("subscribe to '{channel}' failed: {e}"))?;
            }
        }
        PusherFrame::SubscriptionSucceeded { channel } => {
            info!("✅ [FEED] Subscribed to '{}'", channel);
        }
        PusherFrame::Ping => {
            let pong = json!({ "event": "pusher:pong", "data": {} });
            send_json(write, &pong)
                .await
                .map_err(|e| format!("pong failed: {e}"))?;
        }
        PusherFrame::Error { code, message } => {
            if code.is_some_and(|c| FATAL_ERROR_CODES.contains(&c)) {
                return Err(format!("pusher error {code:?}: {message}"));
            }
            warn!("⚠️ [FEED] Pusher error {:?}: {}", code, message);
        }
        PusherFrame::Data { channel, samples } => {
            for sample in samples {
                let event = FeedEvent::Sample {
                    channel: channel.clone(),
                    sample,
                };
                if events.send(event).await.is_err() {
                    return Err("ingest stopped".to_owned());
                }
            }
        }
        PusherFrame::Ignored { event } => debug!("[FEED] Ignoring event '{}'", event),
    }
    Ok(())
}
