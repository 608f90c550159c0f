//! Messaging-transport abstraction.
//!
//! The bot is a logic layer over one opaque messaging session. A transport
//! yields a stream of lifecycle and message events and accepts plain-text
//! sends; everything else (authentication, contact metadata, group
//! membership) stays behind the seam.

pub mod gateway;

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransportError;

pub use gateway::HttpGatewayTransport;

/// Stream of events from a transport session.
pub type EventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Lifecycle and message events delivered by a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Authentication challenge to present out-of-band (scan to link).
    QrChallenge { data: String },
    /// Credentials accepted; session is being restored.
    Authenticated,
    /// Session is live. Carries the session's own address, used for
    /// mention detection.
    Ready { self_address: String },
    /// Session dropped; caller decides whether to reconnect.
    Disconnected { reason: String },
    /// One inbound message.
    Message(InboundMessage),
}

/// Unified inbound message, immutable after receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Locally generated id for log correlation.
    pub id: Uuid,
    /// Stable sender address (the conversation-participant key).
    pub sender_address: String,
    /// Display name, when the contact exposes one.
    pub sender_name: Option<String>,
    /// Conversation scope the message arrived in (group or direct chat).
    pub container_id: String,
    /// Whether the container is a group.
    pub is_group: bool,
    /// Message body.
    pub text: String,
    /// Addresses mentioned in the body.
    pub mentioned_addresses: Vec<String>,
    /// True for messages echoed back from our own session.
    pub from_self: bool,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        sender_address: impl Into<String>,
        container_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_address: sender_address.into(),
            sender_name: None,
            container_id: container_id.into(),
            is_group: false,
            text: text.into(),
            mentioned_addresses: Vec::new(),
            from_self: false,
            received_at: Utc::now(),
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn with_group(mut self, is_group: bool) -> Self {
        self.is_group = is_group;
        self
    }

    pub fn with_mentions(mut self, mentions: Vec<String>) -> Self {
        self.mentioned_addresses = mentions;
        self
    }

    pub fn with_from_self(mut self, from_self: bool) -> Self {
        self.from_self = from_self;
        self
    }
}

/// A messaging session the bot can listen on and send through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name for logs and errors.
    fn name(&self) -> &str;

    /// Open the session and return its event stream.
    async fn start(&self) -> Result<EventStream, TransportError>;

    /// Send a plain-text message to an address.
    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError>;

    /// Cheap liveness probe.
    async fn health_check(&self) -> Result<(), TransportError>;

    /// Close the session.
    async fn shutdown(&self) -> Result<(), TransportError>;
}
