//! Network layer - proxy HTTP execution and socket sessions
//!
//! The Network actor receives commands and sends back responses and session messages.

pub mod actor;
pub mod client;
pub mod registry;
pub mod socketio;
pub mod websocket;

pub use actor::NetworkActor;
pub use client::ProxyClient;
pub use registry::{SessionRegistry, SessionState};
