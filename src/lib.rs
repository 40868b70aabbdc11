//! # Courier
//!
//! The core of an API testing client, similar to Postman/Insomnia.
//!
//! ## Features
//! - Collections, folders and independent requests kept in a remote store
//! - Variables from collection and environment scopes, `{{key}}` substitution
//! - Sandboxed Lua pre-request scripts with a `pm`-style API
//! - HTTP through a backend proxy, raw WebSocket and Socket.IO sessions
//! - Debounced query-string sync and auto-save of edits
//!
//! ## Architecture
//! Actor-based with channels:
//! - App Layer (state machine, send pipeline)
//! - Network Layer (Tokio runtime, one session per request id)

pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod messages;
pub mod models;
pub mod network;
pub mod request;
pub mod script;
pub mod store;
pub mod variables;
pub mod workspace;

// Re-export commonly used types
pub use app::{AppActor, AppState};
pub use config::Config;
pub use error::{Error, Result};
pub use messages::{AppEvent, NetworkCommand, NetworkResponse, Snapshot};
pub use models::{
    AuthType, Body, BodyType, Collection, Environment, Header, HttpMethod, Message, MessageKind,
    Param, Request, RequestType, Response, Variable,
};
pub use network::{NetworkActor, ProxyClient};
pub use request::{materialize, prepare, MaterializedRequest};
pub use store::RemoteStore;
pub use variables::{resolve, Resolver};
pub use workspace::Workspace;
