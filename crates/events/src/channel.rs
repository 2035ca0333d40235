//! Single-subscriber, fire-and-forget broadcaster.
//!
//! At most one subscriber is attached at a time. Attaching again replaces the
//! previous subscriber, whose receiver then yields `None`. Sending never
//! blocks and never fails: with no subscriber the message is dropped.
//!
//! `send` only touches a std mutex and an unbounded sender, so it is safe to
//! call from the async runtime and from plain threads such as the generation
//! worker alike.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// UpdateMessage
// ---------------------------------------------------------------------------

/// The envelope delivered to the subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessage {
    /// Dot-separated event name, e.g. `"output.updated"`.
    pub name: String,
    /// The serialized entity the event is about.
    pub payload: serde_json::Value,
}

impl UpdateMessage {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// UpdateChannel
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct UpdateChannel {
    subscriber: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl UpdateChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscriber, replacing any previous one. The receiver
    /// yields serialized [`UpdateMessage`] text frames.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.lock();
        if guard.replace(tx).is_some() {
            tracing::debug!("Update subscriber replaced");
        }
        rx
    }

    /// Whether a live subscriber is attached.
    pub fn is_attached(&self) -> bool {
        self.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Serialize `payload` under `name` and hand it to the subscriber.
    pub fn send<T: Serialize>(&self, name: &str, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(event = name, error = %e, "Failed to serialize update payload");
                return;
            }
        };
        self.publish(UpdateMessage::new(name, payload));
    }

    /// Deliver a prepared message.
    pub fn publish(&self, message: UpdateMessage) {
        let mut guard = self.lock();
        let Some(tx) = guard.as_ref() else {
            return;
        };
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(event = %message.name, error = %e, "Failed to encode update");
                return;
            }
        };
        // A send error only means the subscriber went away.
        if tx.send(text).is_err() {
            *guard = None;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        // The guarded value is a plain sender, so a poisoned lock is still usable.
        self.subscriber
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use varnava_core::update_events::{EVENT_OUTPUT_UPDATED, EVENT_RESOURCES_UPDATE};

    #[test]
    fn send_without_subscriber_is_a_noop() {
        let channel = UpdateChannel::new();
        channel.send(EVENT_RESOURCES_UPDATE, &serde_json::json!({ "isDownloading": true }));
        assert!(!channel.is_attached());
    }

    #[tokio::test]
    async fn attached_subscriber_receives_envelope() {
        let channel = UpdateChannel::new();
        let mut rx = channel.attach();

        channel.send(EVENT_OUTPUT_UPDATED, &serde_json::json!({ "progress": 0.5 }));

        let text = rx.recv().await.unwrap();
        let message: UpdateMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(message.name, "output.updated");
        assert_eq!(message.payload["progress"], 0.5);
    }

    #[tokio::test]
    async fn later_attach_replaces_previous_subscriber() {
        let channel = UpdateChannel::new();
        let mut first = channel.attach();
        let mut second = channel.attach();

        channel.send("output.created", &1);

        // The first sender was dropped on replacement.
        assert!(first.recv().await.is_none());
        assert!(second.recv().await.is_some());
    }

    #[test]
    fn closed_subscriber_is_detached_on_send() {
        let channel = UpdateChannel::new();
        let rx = channel.attach();
        drop(rx);

        channel.send("output.created", &1);
        assert!(!channel.is_attached());
    }

    #[tokio::test]
    async fn send_from_plain_thread_reaches_subscriber() {
        let channel = std::sync::Arc::new(UpdateChannel::new());
        let mut rx = channel.attach();

        let sender = channel.clone();
        std::thread::spawn(move || sender.send("output.updated", &42))
            .join()
            .unwrap();

        let text = rx.recv().await.unwrap();
        assert!(text.contains("\"payload\":42"));
    }
}
