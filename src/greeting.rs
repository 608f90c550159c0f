//! Greeting detection and the per-identity cooldown gate.

use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::text::normalize;

/// Greeting policy: phrase detection, cooldown bookkeeping, and the
/// time-of-day salutation.
///
/// Cooldown entries are keyed by `(container_id, display label)` and are
/// never deleted; a long-lived deployment keeps one entry per identity
/// ever greeted.
pub struct GreetingPolicy {
    /// Greeting phrases, pre-folded.
    phrases: Vec<String>,
    cooldown: chrono::Duration,
    timezone: Tz,
    last_greeted: HashMap<(String, String), DateTime<Utc>>,
}

impl GreetingPolicy {
    pub fn new(phrases: &[&str], cooldown: chrono::Duration, timezone: Tz) -> Self {
        Self {
            phrases: phrases.iter().map(|p| normalize(p)).collect(),
            cooldown,
            timezone,
            last_greeted: HashMap::new(),
        }
    }

    /// True if the folded text contains any greeting phrase as a substring.
    pub fn is_greeting(&self, raw_text: &str) -> bool {
        let folded = normalize(raw_text);
        self.phrases.iter().any(|p| folded.contains(p.as_str()))
    }

    /// Check-and-set the cooldown gate for one identity.
    ///
    /// Grants when the identity has never been greeted or the cooldown has
    /// elapsed, recording `now` as the new stamp in the same step. No await
    /// points: two messages handled in order cannot both be granted inside
    /// one cooldown window.
    pub fn may_greet(&mut self, container_id: &str, display_label: &str, now: DateTime<Utc>) -> bool {
        let key = (container_id.to_string(), display_label.to_string());
        match self.last_greeted.get(&key) {
            Some(last) if now - *last <= self.cooldown => false,
            _ => {
                self.last_greeted.insert(key, now);
                true
            }
        }
    }

    /// Time-of-day salutation in the configured timezone, personalized when
    /// the display name is known.
    pub fn greeting_for(&self, display_name: Option<&str>, now: DateTime<Utc>) -> String {
        let hour = now.with_timezone(&self.timezone).hour();
        let base = if hour < 12 {
            "¡Buen día"
        } else if hour < 18 {
            "¡Buenas tardes"
        } else {
            "¡Buenas noches"
        };
        match display_name {
            Some(name) => format!("{base}, {name}!"),
            None => format!("{base}!"),
        }
    }
}
