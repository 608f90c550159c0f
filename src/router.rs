//! Top-level per-message dispatch.
//!
//! One inbound message produces at most one action, chosen in a fixed
//! priority order: peer reply consumption, context continuation, canned
//! keyword reply, mention relay, greeting, nothing. All replies are sent
//! into the conversation the message arrived in.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::config::{BotConfig, FALLBACK_DISPLAY_NAME, GREETING_PHRASES};
use crate::context::ConversationContextStore;
use crate::delivery::MessageDelivery;
use crate::error::Result;
use crate::greeting::GreetingPolicy;
use crate::keywords::KeywordResponder;
use crate::mediator::AiQueryMediator;
use crate::notify::Notifier;
use crate::transport::InboundMessage;

/// Per-message dispatcher. Owns all mutable bot state; must be driven by
/// a single task so each message is fully handled before the next one
/// touches the mediator, cooldown or context maps.
pub struct MessageRouter {
    mediator: AiQueryMediator,
    keywords: KeywordResponder,
    greetings: GreetingPolicy,
    context: ConversationContextStore,
    delivery: MessageDelivery,
    notifier: Option<Notifier>,
    report_to: Option<String>,
    allowed_groups: HashSet<String>,
    context_timeout: chrono::Duration,
    /// Our own session address, learned from the transport `Ready` event.
    self_address: Option<String>,
}

impl MessageRouter {
    pub fn new(config: &BotConfig, delivery: MessageDelivery, notifier: Option<Notifier>) -> Self {
        Self {
            mediator: AiQueryMediator::new(
                config.peer_address.clone(),
                config.persona.clone(),
                delivery.clone(),
            ),
            keywords: KeywordResponder::default(),
            greetings: GreetingPolicy::new(
                GREETING_PHRASES,
                config.greeting_cooldown,
                config.timezone,
            ),
            context: ConversationContextStore::new(),
            delivery,
            notifier,
            report_to: config.report_to.clone(),
            allowed_groups: config.allowed_groups.iter().cloned().collect(),
            context_timeout: config.context_timeout,
            self_address: None,
        }
    }

    /// Record the session's own address once the transport reports ready.
    /// Mention detection is inert until this is set.
    pub fn set_self_address(&mut self, address: impl Into<String>) {
        self.self_address = Some(address.into());
    }

    /// Handle one inbound message now.
    pub async fn handle(&mut self, msg: InboundMessage) -> Result<()> {
        self.handle_at(msg, Utc::now()).await
    }

    /// Handle one inbound message at an explicit instant. The only clock
    /// read on the message path happens in [`handle`].
    pub async fn handle_at(&mut self, msg: InboundMessage, now: DateTime<Utc>) -> Result<()> {
        if msg.from_self {
            return Ok(());
        }

        if msg.text.is_empty() || msg.sender_address.is_empty() {
            tracing::debug!(id = %msg.id, "Discarding malformed inbound message");
            return Ok(());
        }

        // Peer replies complete the pending query; they never reach the
        // keyword/greeting/mention logic below.
        if self.mediator.peer_address() == Some(msg.sender_address.as_str()) {
            if let Some(answered) = self.mediator.complete(&msg.text).await {
                let label = answered
                    .requester_name
                    .clone()
                    .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string());
                self.context
                    .record((answered.requester_address, label), answered.answer, now);
            }
            return Ok(());
        }

        let label = msg
            .sender_name
            .clone()
            .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string());

        tracing::info!(
            sender = %label,
            container = %msg.container_id,
            text = %msg.text,
            "New message"
        );

        let eligible = !msg.is_group || self.allowed_groups.contains(&msg.container_id);
        if !eligible {
            return Ok(());
        }

        // a. A fresh context entry makes this message a continuation of the
        //    dialogue; it bypasses keyword/greeting/mention classification.
        let key = (msg.container_id.clone(), label.clone());
        if let Some(prior) = self.context.consume_if_fresh(&key, now, self.context_timeout) {
            tracing::info!(sender = %label, "Continuing prior dialogue");
            self.mediator
                .dispatch(
                    &msg.container_id,
                    msg.sender_name.as_deref(),
                    &msg.text,
                    Some(&prior),
                )
                .await;
            return Ok(());
        }

        // b. Canned keyword reply.
        if let Some(reply) = self.keywords.find_reply(&msg.text) {
            tracing::info!(sender = %label, "Keyword table matched");
            self.delivery.send(&msg.container_id, reply).await;
            if msg.is_group {
                self.notify(
                    &format!("Reporte de '{}'", msg.text),
                    &format!(
                        "Mensaje de {} en {}: {}",
                        label, msg.container_id, msg.text
                    ),
                );
            }
            return Ok(());
        }

        // c. Mention of our own identity relays the message to the peer.
        let mentioned = self
            .self_address
            .as_deref()
            .is_some_and(|own| msg.mentioned_addresses.iter().any(|m| m == own));
        if mentioned {
            tracing::info!(sender = %label, "Mention detected, relaying to peer");
            if msg.is_group {
                self.notify(
                    &format!("Mención para IA en {}", msg.container_id),
                    &format!("Mensaje de {}: {}", label, msg.text),
                );
            }
            self.mediator
                .dispatch(&msg.container_id, msg.sender_name.as_deref(), &msg.text, None)
                .await;
            return Ok(());
        }

        // d. Simple greeting, gated by the per-identity cooldown.
        if self.greetings.is_greeting(&msg.text)
            && self.greetings.may_greet(&msg.container_id, &label, now)
        {
            tracing::info!(sender = %label, "Greeting");
            let greeting = self.greetings.greeting_for(msg.sender_name.as_deref(), now);
            self.delivery.send(&msg.container_id, &greeting).await;
            return Ok(());
        }

        // e. No action.
        Ok(())
    }

    fn notify(&self, subject: &str, body: &str) {
        if let (Some(notifier), Some(to)) = (&self.notifier, &self.report_to) {
            notifier.notify(to, subject, body);
        }
    }
}
