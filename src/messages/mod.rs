//! Message types for inter-layer communication in the actor-based architecture.
//!
//! This module defines all messages that flow between the front end, App, and Network layers.

pub mod app_events;
pub mod network;
pub mod snapshot;

pub use app_events::AppEvent;
pub use network::{NetworkCommand, NetworkResponse};
pub use snapshot::Snapshot;
