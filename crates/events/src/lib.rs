//! In-process event bus for generation lifecycle notifications.
//!
//! - [`EventBus`]: publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the event envelope.
//! - [`event_types`]: the event names published by the service.

pub mod bus;

pub use bus::{event_types, EventBus, PlatformEvent};
