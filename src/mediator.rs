//! Single-slot mediation between end users and the answer-generation peer.
//!
//! The transport carries no request/response correlation id: a peer reply
//! can only be matched to its originating question by allowing one
//! outstanding question at a time. The mediator is therefore a two-state
//! machine — `Idle` or `AwaitingAnswer` with exactly one pending query —
//! and a second query arriving mid-flight is answered with a busy notice
//! and dropped, never queued.
//!
//! There is no timeout: a peer that never replies leaves the mediator in
//! `AwaitingAnswer` until the process restarts.

use std::time::Duration;

use crate::config::{BUSY_NOTICE, FALLBACK_DISPLAY_NAME, PEER_UNCONFIGURED_NOTICE, WORKING_NOTICE};
use crate::delivery::MessageDelivery;

/// Pause between the requester acknowledgment and the peer prompt.
const DISPATCH_PAUSE: Duration = Duration::from_secs(1);

/// Max chars of a prior answer carried into a continuation prompt.
const HISTORY_SUMMARY_MAX_CHARS: usize = 120;

/// The one query in flight, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub requester_address: String,
    pub requester_name: Option<String>,
}

#[derive(Debug)]
enum MediatorState {
    Idle,
    AwaitingAnswer(PendingQuery),
}

/// Result of a dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Query relayed to the peer; mediator is now busy.
    Dispatched,
    /// Another query was in flight; requester was told to wait.
    Busy,
    /// No peer address configured; requester was notified.
    NotConfigured,
}

/// A completed query: the peer's answer, already delivered to the requester.
#[derive(Debug, Clone)]
pub struct AnsweredQuery {
    pub requester_address: String,
    pub requester_name: Option<String>,
    /// The peer's raw answer body (without the delivery attribution line).
    pub answer: String,
}

/// The single-slot query coordinator.
pub struct AiQueryMediator {
    state: MediatorState,
    peer_address: Option<String>,
    persona: String,
    delivery: MessageDelivery,
}

impl AiQueryMediator {
    pub fn new(peer_address: Option<String>, persona: String, delivery: MessageDelivery) -> Self {
        Self {
            state: MediatorState::Idle,
            peer_address,
            persona,
            delivery,
        }
    }

    /// Configured peer address, if any.
    pub fn peer_address(&self) -> Option<&str> {
        self.peer_address.as_deref()
    }

    /// True while a query is awaiting its answer.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, MediatorState::AwaitingAnswer(_))
    }

    /// The pending query, if one is in flight.
    pub fn pending(&self) -> Option<&PendingQuery> {
        match &self.state {
            MediatorState::AwaitingAnswer(q) => Some(q),
            MediatorState::Idle => None,
        }
    }

    /// Relay a question to the answer peer (`Idle → AwaitingAnswer`).
    ///
    /// The slot is claimed before the first await point, so two messages
    /// handled in FIFO order can never both pass the idle check. On the
    /// busy and unconfigured paths the requester gets a notice and the
    /// state is left untouched.
    pub async fn dispatch(
        &mut self,
        requester_address: &str,
        requester_name: Option<&str>,
        question: &str,
        history: Option<&str>,
    ) -> DispatchOutcome {
        let Some(peer) = self.peer_address.clone() else {
            tracing::warn!("Query requested but no peer address configured");
            self.delivery
                .send(requester_address, PEER_UNCONFIGURED_NOTICE)
                .await;
            return DispatchOutcome::NotConfigured;
        };

        if self.is_busy() {
            tracing::info!(
                requester = requester_address,
                "Mediator busy; dropping query"
            );
            self.delivery.send(requester_address, BUSY_NOTICE).await;
            return DispatchOutcome::Busy;
        }

        self.state = MediatorState::AwaitingAnswer(PendingQuery {
            requester_address: requester_address.to_string(),
            requester_name: requester_name.map(String::from),
        });

        self.delivery.send(requester_address, WORKING_NOTICE).await;

        // Give the peer session a breather before the prompt lands.
        tokio::time::sleep(DISPATCH_PAUSE).await;

        let prompt = self.build_prompt(requester_name, question, history);
        self.delivery.send(&peer, &prompt).await;

        tracing::info!(requester = requester_address, "Query relayed to peer");
        DispatchOutcome::Dispatched
    }

    /// Consume a peer reply (`AwaitingAnswer → Idle`).
    ///
    /// Delivers the attributed answer to the pending requester and returns
    /// the completed query for context recording. A reply with no pending
    /// query has no requester to deliver to and is discarded.
    pub async fn complete(&mut self, answer_body: &str) -> Option<AnsweredQuery> {
        let MediatorState::AwaitingAnswer(pending) =
            std::mem::replace(&mut self.state, MediatorState::Idle)
        else {
            tracing::debug!("Peer reply with no pending query; discarding");
            return None;
        };

        let label = pending
            .requester_name
            .as_deref()
            .unwrap_or(FALLBACK_DISPLAY_NAME);
        let attributed = format!("*Para {label}:*\n{answer_body}");
        self.delivery
            .send(&pending.requester_address, &attributed)
            .await;

        tracing::info!(requester = %pending.requester_address, "Answer delivered");
        Some(AnsweredQuery {
            requester_address: pending.requester_address,
            requester_name: pending.requester_name,
            answer: answer_body.to_string(),
        })
    }

    fn build_prompt(
        &self,
        requester_name: Option<&str>,
        question: &str,
        history: Option<&str>,
    ) -> String {
        let name = requester_name.unwrap_or(FALLBACK_DISPLAY_NAME);
        let mut prompt = format!(
            "Actúa como {}, un experto en telecomunicaciones. Responde en primera persona \
             y dirígete a tu colega por su nombre '{}'. Tu colega te pregunta: \"{}\"",
            self.persona, name, question
        );
        if let Some(prior) = history {
            prompt.push_str(&format!(
                " Contexto: le acababas de responder \"{}\".",
                summarize(prior)
            ));
        }
        prompt
    }
}

/// One-line summary of a prior answer for continuation prompts.
fn summarize(answer: &str) -> String {
    let first_line = answer.lines().next().unwrap_or("");
    if first_line.chars().count() > HISTORY_SUMMARY_MAX_CHARS {
        let truncated: String = first_line.chars().take(HISTORY_SUMMARY_MAX_CHARS).collect();
        format!("{truncated}...")
    } else {
        first_line.to_string()
    }
}
