//! # printlink Core
//!
//! Core types, traits, and utilities for printlink.
//! Provides the error taxonomy, the line/reply data model shared by the
//! protocol layer, the session listener interface, and the gateway event bus.

pub mod data;
pub mod error;
pub mod event_bus;
pub mod listener;

pub use data::{ClientId, Line, Reply, SessionState, SENTINEL};

pub use error::{ConnectionError, Error, Result, SessionError};

pub use event_bus::{
    EventBus, EventBusConfig, EventBusError, EventCategory, EventFilter, GatewayEvent,
    SubscriptionId,
};

pub use listener::{NoOpListener, SessionListener};
