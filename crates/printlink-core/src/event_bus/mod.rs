//! # Event Bus Module
//!
//! Publish/subscribe for gateway lifecycle events. Each gateway owns its own
//! bus; there is no process-wide instance.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use printlink_core::event_bus::{EventBus, EventCategory, EventFilter, GatewayEvent};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Client]),
//!     |event| tracing::info!("{}", event.description()),
//! );
//!
//! let mut receiver = bus.receiver();
//! // ... receiver.recv().await in a task
//!
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
