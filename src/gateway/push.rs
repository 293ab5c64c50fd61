//! Push channel client.
//!
//! A long-lived websocket over which the remote side announces state
//! changes. Every decoded notification is treated purely as an invalidation
//! signal: the engine refetches the full directory rather than applying the
//! payload incrementally, so the directory can never diverge through a
//! field-level partial update. Channel loss degrades the client to
//! poll-only until the next reconnect attempt; it never stops the engine.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ChannelError;
use crate::sync::{RefreshReason, SyncEvent};
use crate::types::Notice;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Notification kinds that invalidate the directory.
const INVALIDATION_KINDS: &[&str] =
    &["service_updated", "container_started", "container_stopped"];

#[derive(Debug, Deserialize)]
struct PushMessage {
    #[serde(rename = "type")]
    kind: String,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect_once(url: &Url) -> Result<WsStream, ChannelError> {
    let (ws, _) = connect_async(url.as_str())
        .await
        .map_err(|err| ChannelError::Connect {
            reason: err.to_string(),
        })?;
    Ok(ws)
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Decode a text frame; returns the notification kind when it is one of the
/// invalidation signals, `None` for anything else.
fn invalidation_kind(text: &str) -> Option<String> {
    match serde_json::from_str::<PushMessage>(text) {
        Ok(msg) if INVALIDATION_KINDS.contains(&msg.kind.as_str()) => Some(msg.kind),
        Ok(msg) => {
            debug!("ignoring push message of type {}", msg.kind);
            None
        }
        Err(err) => {
            debug!("undecodable push message: {err}");
            None
        }
    }
}

pub(crate) async fn run(
    url: Url,
    events: mpsc::Sender<SyncEvent>,
    notices: broadcast::Sender<Notice>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        if *shutdown.borrow() {
            break;
        }
        let mut ws = tokio::select! {
            conn = connect_once(&url) => match conn {
                Ok(ws) => ws,
                Err(err) => {
                    warn!("{err}; retrying in {backoff:?}");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => break,
                    }
                    backoff = next_backoff(backoff);
                    continue;
                }
            },
            _ = shutdown.changed() => break,
        };
        backoff = INITIAL_BACKOFF;
        info!("push channel connected to {url}");
        let _ = notices.send(Notice::info("Connected to orchestration server"));

        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(kind) = invalidation_kind(&text) {
                            debug!("push invalidation: {kind}");
                            if events.send(SyncEvent::Refresh(RefreshReason::Push)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("push channel error, relying on polling until reconnect: {err}");
                        break;
                    }
                    None => {
                        warn!("{}, relying on polling until reconnect", ChannelError::Closed);
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    let _ = ws.close(None).await;
                    debug!("push channel stopped");
                    return;
                }
            }
        }
    }
    debug!("push channel stopped");
}
