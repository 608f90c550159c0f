//! Outbound send wrapper.
//!
//! A failed send is terminal for that one action: it is logged and
//! swallowed so the message-handling path never crashes on transport
//! hiccups, and nothing is re-queued.

use std::sync::Arc;

use crate::transport::Transport;

/// Collapse text into a short single-line preview for send logs.
fn preview(text: &str, max_chars: usize) -> String {
    let collapsed: String = text
        .chars()
        .map(|c| if c == '\n' { ' ' } else { c })
        .take(max_chars)
        .collect();
    if text.chars().count() > max_chars {
        format!("{collapsed}...")
    } else {
        collapsed
    }
}

/// Outbound message delivery over a shared transport handle.
#[derive(Clone)]
pub struct MessageDelivery {
    transport: Arc<dyn Transport>,
}

impl MessageDelivery {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Attempt one send; log and swallow failure.
    pub async fn send(&self, to: &str, text: &str) {
        tracing::info!(to, text = %preview(text, 70), "Sending message");
        match self.transport.send_text(to, text).await {
            Ok(()) => tracing::debug!(to, "Message sent"),
            Err(e) => tracing::warn!(to, error = %e, "Failed to send message"),
        }
    }
}
