//! Supabase Realtime change subscriptions.
//!
//! Realtime speaks the Phoenix channel protocol over a websocket. Each
//! subscription opens its own socket, joins `realtime:<channel>` with a
//! `postgres_changes` filter, and forwards matching records to a
//! [`Subscription`] until released, at which point it sends `phx_leave` and
//! closes the socket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::instrument;

use super::{SupabaseClient, SupabaseError};
use crate::subscription::{EVENT_BUFFER, Subscription};

/// Interval between Phoenix heartbeats.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Reference used for the join message.
const JOIN_REF: &str = "1";

/// Change kind subscriptions are scoped to.
const INSERT_EVENT: &str = "INSERT";

/// Incoming Phoenix frame.
#[derive(Debug, Deserialize)]
struct PhoenixFrame {
    #[serde(default)]
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

/// What the reader should do with a decoded frame.
#[derive(Debug, PartialEq)]
enum FrameAction {
    /// A matching change arrived; forward the row.
    Record(Value),
    /// Our join was acknowledged.
    Joined,
    /// Our join (or the channel) failed.
    Rejected(String),
    /// Anything else (heartbeat replies, presence, system notices).
    Ignore,
}

/// Classify a text frame for `topic`.
fn classify_frame(text: &str, topic: &str) -> FrameAction {
    let Ok(frame) = serde_json::from_str::<PhoenixFrame>(text) else {
        return FrameAction::Ignore;
    };

    if frame.topic != topic {
        return FrameAction::Ignore;
    }

    match frame.event.as_str() {
        "phx_reply" if frame.reference.as_deref() == Some(JOIN_REF) => {
            match frame.payload.get("status").and_then(Value::as_str) {
                Some("ok") => FrameAction::Joined,
                _ => FrameAction::Rejected(reply_reason(&frame.payload)),
            }
        }
        "phx_error" => FrameAction::Rejected("channel error".to_string()),
        "postgres_changes" => {
            let data = frame.payload.get("data");
            let kind = data.and_then(|d| d.get("type")).and_then(Value::as_str);
            match (kind, data.and_then(|d| d.get("record"))) {
                (Some(kind), Some(record)) if kind == INSERT_EVENT => {
                    FrameAction::Record(record.clone())
                }
                _ => FrameAction::Ignore,
            }
        }
        _ => FrameAction::Ignore,
    }
}

fn reply_reason(payload: &Value) -> String {
    payload
        .pointer("/response/reason")
        .and_then(Value::as_str)
        .map_or_else(|| payload.to_string(), ToString::to_string)
}

/// Websocket endpoint for a project URL.
fn websocket_url(base_url: &str, api_key: &str) -> Result<String, SupabaseError> {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(SupabaseError::Parse(format!(
            "Unsupported project URL for realtime: {base_url}"
        )));
    };

    url::Url::parse_with_params(
        &format!("{ws_base}/realtime/v1/websocket"),
        &[("apikey", api_key), ("vsn", "1.0.0")],
    )
    .map(String::from)
    .map_err(|e| SupabaseError::Parse(format!("Invalid realtime URL: {e}")))
}

fn text_frame(value: &Value) -> WsMessage {
    WsMessage::Text(value.to_string().into())
}

impl SupabaseClient {
    /// Subscribe to row inserts on `public.<table>`.
    ///
    /// Returns once the server has acknowledged the channel join; rows are
    /// then delivered, in arrival order, until the subscription is released.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError` if the socket cannot be opened or the join is
    /// rejected.
    #[instrument(skip(self))]
    pub async fn subscribe_inserts<T>(
        &self,
        channel: &str,
        table: &str,
    ) -> Result<Subscription<T>, SupabaseError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let key = self.anon_key().expose_secret().to_string();
        let url = websocket_url(self.base_url(), &key)?;
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        let topic = format!("realtime:{channel}");
        let join = json!({
            "topic": topic,
            "event": "phx_join",
            "payload": {
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [
                        { "event": INSERT_EVENT, "schema": "public", "table": table }
                    ]
                },
                "access_token": key
            },
            "ref": JOIN_REF,
            "join_ref": JOIN_REF
        });
        sink.send(text_frame(&join)).await?;

        // Records can arrive before the join reply; keep them for delivery.
        let mut early = Vec::new();
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => match classify_frame(&text, &topic) {
                    FrameAction::Joined => break,
                    FrameAction::Rejected(reason) => {
                        let _ = sink.close().await;
                        return Err(SupabaseError::ChannelJoin(reason));
                    }
                    FrameAction::Record(record) => early.push(record),
                    FrameAction::Ignore => {}
                },
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(SupabaseError::ChannelJoin(
                        "socket closed before join reply".to_string(),
                    ));
                }
            }
        }

        tracing::info!(%topic, "Realtime channel joined");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task_topic = topic.clone();

        tokio::spawn(async move {
            let topic = task_topic;
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;
            let mut next_ref: u64 = 2;

            for record in early {
                if !forward(&tx, record).await {
                    return;
                }
            }

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        let leave = json!({
                            "topic": topic,
                            "event": "phx_leave",
                            "payload": {},
                            "ref": next_ref.to_string(),
                            "join_ref": JOIN_REF
                        });
                        let _ = sink.send(text_frame(&leave)).await;
                        let _ = sink.close().await;
                        tracing::info!(%topic, "Realtime channel left");
                        break;
                    }
                    _ = heartbeat.tick() => {
                        let beat = json!({
                            "topic": "phoenix",
                            "event": "heartbeat",
                            "payload": {},
                            "ref": next_ref.to_string()
                        });
                        next_ref += 1;
                        if let Err(e) = sink.send(text_frame(&beat)).await {
                            tracing::warn!(%topic, error = %e, "Realtime heartbeat failed");
                            break;
                        }
                    }
                    frame = stream.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            match classify_frame(&text, &topic) {
                                FrameAction::Record(record) => {
                                    if !forward(&tx, record).await {
                                        break;
                                    }
                                }
                                FrameAction::Rejected(reason) => {
                                    tracing::warn!(%topic, %reason, "Realtime channel error");
                                    break;
                                }
                                FrameAction::Joined | FrameAction::Ignore => {}
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            tracing::warn!(%topic, "Realtime socket closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(%topic, error = %e, "Realtime socket error");
                            break;
                        }
                    }
                }
            }
        });

        Ok(Subscription::new(channel, rx, Some(stop_tx)))
    }
}

/// Decode and forward one record. Returns `false` once the receiver is gone.
async fn forward<T: DeserializeOwned>(tx: &mpsc::Sender<T>, record: Value) -> bool {
    match serde_json::from_value::<T>(record) {
        Ok(row) => tx.send(row).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable realtime record");
            !tx.is_closed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "realtime:messages-abc";

    #[test]
    fn test_websocket_url_https() {
        let url = websocket_url("https://abcd.supabase.co", "key123").unwrap_or_default();
        assert_eq!(
            url,
            "wss://abcd.supabase.co/realtime/v1/websocket?apikey=key123&vsn=1.0.0"
        );
    }

    #[test]
    fn test_websocket_url_http() {
        let url = websocket_url("http://localhost:54321", "k").unwrap_or_default();
        assert!(url.starts_with("ws://localhost:54321/realtime/v1/websocket?"));
    }

    #[test]
    fn test_classify_join_reply() {
        let ok = r#"{"topic":"realtime:messages-abc","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert_eq!(classify_frame(ok, TOPIC), FrameAction::Joined);

        let err = r#"{"topic":"realtime:messages-abc","event":"phx_reply","payload":{"status":"error","response":{"reason":"unmatched topic"}},"ref":"1"}"#;
        assert_eq!(
            classify_frame(err, TOPIC),
            FrameAction::Rejected("unmatched topic".to_string())
        );
    }

    #[test]
    fn test_classify_heartbeat_reply_is_ignored() {
        let beat = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"2"}"#;
        assert_eq!(classify_frame(beat, TOPIC), FrameAction::Ignore);
    }

    #[test]
    fn test_classify_insert_record() {
        let frame = r#"{
            "topic":"realtime:messages-abc",
            "event":"postgres_changes",
            "payload":{"data":{"type":"INSERT","schema":"public","table":"messages",
                "record":{"id":9,"content":"hi"},"commit_timestamp":"2025-01-01T00:00:00Z"},"ids":[1]},
            "ref":null
        }"#;
        assert_eq!(
            classify_frame(frame, TOPIC),
            FrameAction::Record(json!({"id": 9, "content": "hi"}))
        );

        let update = frame.replace("\"INSERT\"", "\"UPDATE\"");
        assert_eq!(classify_frame(&update, TOPIC), FrameAction::Ignore);
    }

    #[test]
    fn test_classify_other_topic_is_ignored() {
        let frame = r#"{"topic":"realtime:other","event":"postgres_changes","payload":{"data":{"type":"INSERT","record":{}}}}"#;
        assert_eq!(classify_frame(frame, TOPIC), FrameAction::Ignore);
    }

    #[test]
    fn test_classify_garbage_is_ignored() {
        assert_eq!(classify_frame("not json", TOPIC), FrameAction::Ignore);
    }
}
