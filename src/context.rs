//! Short-lived memory of the last answer delivered to each identity.
//!
//! A fresh entry turns the identity's next message into a continuation of
//! the dialogue (relayed to the answer peer with history) instead of going
//! through keyword/greeting classification. Entries are one-shot and are
//! only checked — and expired — on access; there is no background sweep.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Key identifying a conversation participant: `(address, display label)`.
pub type RequesterKey = (String, String);

#[derive(Debug, Clone)]
struct ContextEntry {
    answer: String,
    delivered_at: DateTime<Utc>,
}

/// Time-bounded store of last-delivered answers.
#[derive(Default)]
pub struct ConversationContextStore {
    entries: HashMap<RequesterKey, ContextEntry>,
}

impl ConversationContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the entry for `key`.
    pub fn record(&mut self, key: RequesterKey, answer: impl Into<String>, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            ContextEntry {
                answer: answer.into(),
                delivered_at: now,
            },
        );
    }

    /// One-shot read: if an entry exists and is younger than `timeout`,
    /// remove and return its answer. Stale entries are removed on access
    /// and `None` is returned.
    pub fn consume_if_fresh(
        &mut self,
        key: &RequesterKey,
        now: DateTime<Utc>,
        timeout: chrono::Duration,
    ) -> Option<String> {
        let fresh = self
            .entries
            .get(key)
            .is_some_and(|e| now - e.delivered_at < timeout);
        let entry = self.entries.remove(key)?;
        fresh.then_some(entry.answer)
    }
}
