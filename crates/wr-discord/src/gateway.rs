//! Discord gateway client.
//!
//! Keeps one websocket session open and forwards every `MESSAGE_CREATE` as an
//! [`IncomingMessage`]. Lost connections, server-requested reconnects and
//! invalidated sessions start a fresh session after an exponential backoff.
//!
//! ```text
//!   connect ──► Hello(interval) ──► Identify ──► Ready
//!                                                  │
//!         ┌────────────── heartbeat every interval ┤
//!         │                                        │
//!         └──► missed ack / Reconnect / close ─────┴──► backoff ──► connect
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wr_core::{DiscordConfig, IncomingMessage};

use crate::error::DiscordError;
use crate::model::{opcode, GatewayPayload, Hello, Identify, IdentifyProperties, MessageCreate, INTENTS};

/// How long to wait for `Hello` after connecting.
const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

/// Close codes after which reconnecting cannot succeed.
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

/// A decoded gateway frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Session greeting with the heartbeat period.
    Hello(Duration),
    /// Session is ready.
    Ready,
    /// A message was posted.
    MessageCreate(IncomingMessage),
    /// Some other dispatch we do not handle.
    OtherDispatch(String),
    /// Server asks for an immediate heartbeat.
    HeartbeatRequest,
    /// Server acknowledged our heartbeat.
    HeartbeatAck,
    /// Server asks us to reconnect.
    Reconnect,
    /// The session was invalidated.
    InvalidSession,
    /// An opcode we do not handle.
    Unknown(u8),
}

/// A decoded frame plus its sequence number, if it carried one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number of a dispatch.
    pub seq: Option<u64>,
    /// The decoded event.
    pub event: GatewayEvent,
}

/// Decodes one text frame.
pub fn decode(text: &str) -> Result<Frame, DiscordError> {
    let payload: GatewayPayload = serde_json::from_str(text)?;
    let event = match payload.op {
        opcode::DISPATCH => match payload.t.as_deref() {
            Some("READY") => GatewayEvent::Ready,
            Some("MESSAGE_CREATE") => {
                let msg: MessageCreate = serde_json::from_value(payload.d)?;
                GatewayEvent::MessageCreate(msg.into())
            }
            Some(other) => GatewayEvent::OtherDispatch(other.to_owned()),
            None => return Err(DiscordError::protocol("dispatch without event name")),
        },
        opcode::HELLO => {
            let hello: Hello = serde_json::from_value(payload.d)?;
            GatewayEvent::Hello(Duration::from_millis(hello.heartbeat_interval))
        }
        opcode::HEARTBEAT => GatewayEvent::HeartbeatRequest,
        opcode::HEARTBEAT_ACK => GatewayEvent::HeartbeatAck,
        opcode::RECONNECT => GatewayEvent::Reconnect,
        opcode::INVALID_SESSION => GatewayEvent::InvalidSession,
        other => GatewayEvent::Unknown(other),
    };
    Ok(Frame {
        seq: payload.s,
        event,
    })
}

/// Encodes an `op 1 Heartbeat` carrying the last sequence number seen.
pub fn heartbeat(seq: Option<u64>) -> String {
    json!({ "op": opcode::HEARTBEAT, "d": seq }).to_string()
}

/// Encodes an `op 2 Identify`.
pub fn identify(token: &str) -> String {
    let data = Identify {
        token,
        intents: INTENTS,
        properties: IdentifyProperties::default(),
    };
    json!({ "op": opcode::IDENTIFY, "d": data }).to_string()
}

/// Exponential reconnect delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a backoff doubling from `initial` up to `max`.
    #[must_use]
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Returns the delay to wait now and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Starts over after a healthy session.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Why a session ended.
#[derive(Debug)]
enum SessionEnd {
    /// Connect again after the backoff.
    Reconnect { healthy: bool },
    /// Stop for good.
    Shutdown,
}

/// Gateway connection that feeds inbound messages to the relay.
#[derive(Debug)]
pub struct Gateway {
    url: String,
    token: String,
    inbound: mpsc::Sender<IncomingMessage>,
    backoff: Backoff,
}

impl Gateway {
    /// Creates a gateway client sending messages to `inbound`.
    #[must_use]
    pub fn new(config: &DiscordConfig, inbound: mpsc::Sender<IncomingMessage>) -> Self {
        Self {
            url: config.gateway_url.clone(),
            token: config.token.clone(),
            inbound,
            backoff: Backoff::default(),
        }
    }

    /// Overrides the reconnect backoff.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs sessions until `shutdown` fires, the inbound receiver is dropped,
    /// or Discord rejects the session for good.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), DiscordError> {
        loop {
            match self.session(&shutdown).await {
                Ok(SessionEnd::Shutdown) => return Ok(()),
                Ok(SessionEnd::Reconnect { healthy }) => {
                    if healthy {
                        self.backoff.reset();
                    }
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!(error = %err, "gateway session failed"),
            }

            let delay = self.backoff.next_delay();
            debug!(delay_ms = delay.as_millis(), "reconnecting to gateway");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = shutdown.cancelled() => return Ok(()),
            }
        }
    }

    async fn session(&self, shutdown: &CancellationToken) -> Result<SessionEnd, DiscordError> {
        info!(url = %self.url, "connecting to gateway");
        let (stream, _response) = tokio::select! {
            result = tokio_tungstenite::connect_async(self.url.as_str()) => result?,
            () = shutdown.cancelled() => return Ok(SessionEnd::Shutdown),
        };
        let (mut write, mut read) = stream.split();

        let period = match tokio::time::timeout(HELLO_TIMEOUT, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => match decode(&text)?.event {
                GatewayEvent::Hello(period) => period,
                other => return Err(DiscordError::protocol(format!("expected Hello, got {other:?}"))),
            },
            Ok(Some(Ok(other))) => {
                return Err(DiscordError::protocol(format!("expected Hello, got {other:?}")));
            }
            Ok(Some(Err(err))) => return Err(err.into()),
            Ok(None) => return Ok(SessionEnd::Reconnect { healthy: false }),
            Err(_elapsed) => return Err(DiscordError::protocol("no Hello within timeout")),
        };

        write.send(Message::text(identify(&self.token))).await?;

        // interval_at panics on a zero period.
        let period = period.max(Duration::from_secs(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq = None;
        let mut acked = true;
        let mut healthy = false;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
                _ = ticker.tick() => {
                    if !acked {
                        warn!("heartbeat not acknowledged, reconnecting");
                        return Ok(SessionEnd::Reconnect { healthy });
                    }
                    acked = false;
                    write.send(Message::text(heartbeat(seq))).await?;
                }
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                            continue;
                        }
                        Some(Ok(Message::Close(frame))) => return close_outcome(frame.as_ref(), healthy),
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => return Err(err.into()),
                        None => return Ok(SessionEnd::Reconnect { healthy }),
                    };

                    let frame = match decode(&text) {
                        Ok(frame) => frame,
                        Err(err) => {
                            warn!(error = %err, "undecodable gateway frame");
                            continue;
                        }
                    };
                    if frame.seq.is_some() {
                        seq = frame.seq;
                    }

                    match frame.event {
                        GatewayEvent::Ready => {
                            info!("gateway session ready");
                            healthy = true;
                        }
                        GatewayEvent::MessageCreate(message) => {
                            if self.inbound.send(message).await.is_err() {
                                debug!("inbound receiver dropped, closing gateway");
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(SessionEnd::Shutdown);
                            }
                        }
                        GatewayEvent::HeartbeatRequest => {
                            write.send(Message::text(heartbeat(seq))).await?;
                        }
                        GatewayEvent::HeartbeatAck => acked = true,
                        GatewayEvent::Reconnect => {
                            info!("gateway requested reconnect");
                            return Ok(SessionEnd::Reconnect { healthy });
                        }
                        GatewayEvent::InvalidSession => {
                            warn!("gateway session invalidated");
                            return Ok(SessionEnd::Reconnect { healthy: false });
                        }
                        GatewayEvent::Hello(_) | GatewayEvent::OtherDispatch(_) | GatewayEvent::Unknown(_) => {}
                    }
                }
            }
        }
    }
}

fn close_outcome(frame: Option<&CloseFrame>, healthy: bool) -> Result<SessionEnd, DiscordError> {
    let Some(frame) = frame else {
        return Ok(SessionEnd::Reconnect { healthy });
    };
    let code = u16::from(frame.code);
    if FATAL_CLOSE_CODES.contains(&code) {
        return Err(DiscordError::SessionRejected {
            code,
            reason: frame.reason.to_string(),
        });
    }
    info!(code, reason = %frame.reason, "gateway closed the session");
    Ok(SessionEnd::Reconnect { healthy })
}
