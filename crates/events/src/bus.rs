//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`PlatformEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tunesmith_core::types::DbId;

/// Event names published by the generation service.
pub mod event_types {
    pub const GENERATION_STARTED: &str = "generation.started";
    pub const GENERATION_PHASE_CHANGED: &str = "generation.phase_changed";
    pub const GENERATION_SUCCEEDED: &str = "generation.succeeded";
    pub const GENERATION_FAILED: &str = "generation.failed";
    pub const GENERATION_CANCELLED: &str = "generation.cancelled";
    /// A blob could not be cleaned up and needs out-of-band deletion.
    pub const ARTIFACT_ORPHANED: &str = "artifact.orphaned";
    /// A library record was deleted; playback references must be dropped.
    pub const MEDIA_DELETED: &str = "media.deleted";
    /// A cover image was generated and stored.
    pub const THUMBNAIL_CREATED: &str = "media.thumbnail_created";
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// Something that happened in the service.
///
/// Constructed via [`PlatformEvent::new`] and enriched with the builder
/// methods [`with_session`](PlatformEvent::with_session),
/// [`with_generation`](PlatformEvent::with_generation),
/// [`with_record`](PlatformEvent::with_record), and
/// [`with_payload`](PlatformEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"generation.succeeded"`.
    pub event_type: String,

    /// Session whose orchestrator produced the event.
    pub session: Option<String>,

    /// Generation token of the run the event belongs to.
    pub generation: Option<u64>,

    /// Library record the event refers to.
    pub record_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            session: None,
            generation: None,
            record_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn with_record(mut self, record_id: DbId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`PlatformEvent`].
///
/// ```rust
/// use tunesmith_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::new("generation.started"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: PlatformEvent) {
        // Ignore the SendError, it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = PlatformEvent::new(event_types::GENERATION_SUCCEEDED)
            .with_session("alice")
            .with_generation(3)
            .with_record(42)
            .with_payload(serde_json::json!({"task_id": "T1"}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "generation.succeeded");
        assert_eq!(received.session.as_deref(), Some("alice"));
        assert_eq!(received.generation, Some(3));
        assert_eq!(received.record_id, Some(42));
        assert_eq!(received.payload["task_id"], "T1");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::new(event_types::MEDIA_DELETED));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, "media.deleted");
        assert_eq!(e2.event_type, "media.deleted");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(PlatformEvent::new("orphan.event"));
    }

    #[test]
    fn default_event_has_empty_optional_fields() {
        let event = PlatformEvent::new("bare.event");
        assert!(event.session.is_none());
        assert!(event.generation.is_none());
        assert!(event.record_id.is_none());
        assert!(event.payload.is_object());
    }
}
