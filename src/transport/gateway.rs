//! Messaging-bridge transport — long-polls a local bridge HTTP API.
//!
//! The bridge owns the real messaging session (browser automation, QR
//! login, contact lookup) and exposes it over three endpoints:
//!
//! - `POST /session/events` `{cursor, timeout}` → `{cursor, events: [...]}`
//! - `POST /session/send`   `{to, text}`
//! - `GET  /session/status`
//!
//! Event objects carry a `type` tag (`qr`, `authenticated`, `ready`,
//! `disconnected`, `message`); message events embed sender, container and
//! mention data already resolved by the bridge.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{EventStream, InboundMessage, Transport, TransportEvent};

/// How long the bridge may hold an events poll open.
const POLL_HOLD_SECS: u64 = 30;

/// Back-off after a failed poll round.
const POLL_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Transport backed by a messaging-bridge HTTP API.
pub struct HttpGatewayTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGatewayTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl Transport for HttpGatewayTransport {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn start(&self) -> Result<EventStream, TransportError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let client = self.client.clone();
        let events_url = self.api_url("session/events");

        tokio::spawn(async move {
            let mut cursor: i64 = 0;

            tracing::info!("Gateway transport listening for events...");

            loop {
                let body = serde_json::json!({
                    "cursor": cursor,
                    "timeout": POLL_HOLD_SECS,
                });

                let resp = match client.post(&events_url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Gateway poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Gateway parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                if let Some(next) = data.get("cursor").and_then(serde_json::Value::as_i64) {
                    cursor = next;
                }

                let Some(events) = data.get("events").and_then(serde_json::Value::as_array) else {
                    continue;
                };

                for raw in events {
                    let Some(event) = parse_event(raw) else {
                        tracing::debug!(payload = %raw, "Skipping unrecognized gateway event");
                        continue;
                    };

                    let ends_session = matches!(event, TransportEvent::Disconnected { .. });
                    if tx.send(event).is_err() {
                        tracing::info!("Gateway listener channel closed");
                        return;
                    }
                    if ends_session {
                        // The consumer decides whether to reconnect; this
                        // poll loop is done.
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({ "to": to, "text": text });

        let resp = self
            .client
            .post(self.api_url("session/send"))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed {
                name: "gateway".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(TransportError::SendFailed {
                name: "gateway".into(),
                reason: format!("send returned {status}: {detail}"),
            });
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        let resp = self
            .client
            .get(self.api_url("session/status"))
            .send()
            .await
            .map_err(|e| TransportError::StartupFailed {
                name: "gateway".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::StartupFailed {
                name: "gateway".into(),
                reason: format!("status returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        tracing::info!("Gateway transport shutting down");
        Ok(())
    }
}

/// Parse one bridge event object. Returns `None` for payloads that are
/// missing their required fields or carry an unknown type tag.
fn parse_event(raw: &serde_json::Value) -> Option<TransportEvent> {
    match raw.get("type").and_then(serde_json::Value::as_str)? {
        "qr" => {
            let data = raw.get("data").and_then(serde_json::Value::as_str)?;
            Some(TransportEvent::QrChallenge { data: data.into() })
        }
        "authenticated" => Some(TransportEvent::Authenticated),
        "ready" => {
            let self_address = raw.get("self_address").and_then(serde_json::Value::as_str)?;
            Some(TransportEvent::Ready {
                self_address: self_address.into(),
            })
        }
        "disconnected" => {
            let reason = raw
                .get("reason")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown");
            Some(TransportEvent::Disconnected {
                reason: reason.into(),
            })
        }
        "message" => {
            let sender_address = raw.get("sender").and_then(serde_json::Value::as_str)?;
            let container_id = raw
                .get("container")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(sender_address);
            let text = raw
                .get("text")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();

            let mut msg = InboundMessage::new(sender_address, container_id, text)
                .with_group(
                    raw.get("is_group")
                        .and_then(serde_json::Value::as_bool)
                        .unwrap_or(false),
                )
                .with_from_self(
                    raw.get("from_self")
                        .and_then(serde_json::Value::as_bool)
                        .unwrap_or(false),
                );

            if let Some(name) = raw.get("sender_name").and_then(serde_json::Value::as_str) {
                msg = msg.with_sender_name(name);
            }

            if let Some(mentions) = raw.get("mentions").and_then(serde_json::Value::as_array) {
                msg = msg.with_mentions(
                    mentions
                        .iter()
                        .filter_map(|m| m.as_str().map(String::from))
                        .collect(),
                );
            }

            Some(TransportEvent::Message(msg))
        }
        _ => None,
    }
}
