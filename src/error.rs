//! Error types for the request pipeline.
//!
//! All fallible library operations return [`Result<T>`]. Only the Send
//! boundary in the app layer turns these into user-visible state.

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// The pre-request script failed to parse or raised at runtime.
    ///
    /// Fatal to the send attempt: nothing goes on the wire.
    #[error("Pre-request script error: {message}")]
    Script { message: String },

    /// A remote store call was rejected.
    #[error("{message}")]
    Store { message: String },

    /// The backend proxy reported a failure.
    #[error("{message}")]
    Proxy { message: String },

    /// Socket.IO handshake or protocol failure.
    #[error("Socket.IO error: {message}")]
    SocketIo { message: String },

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// No request with this id in the workspace.
    #[error("Request not found: {id}")]
    RequestNotFound { id: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn script(message: impl Into<String>) -> Self {
        Error::Script {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Error::Store {
            message: message.into(),
        }
    }

    pub fn proxy(message: impl Into<String>) -> Self {
        Error::Proxy {
            message: message.into(),
        }
    }

    pub fn socket_io(message: impl Into<String>) -> Self {
        Error::SocketIo {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Returns `true` for errors raised by the pre-request script.
    pub fn is_script(&self) -> bool {
        matches!(self, Error::Script { .. })
    }
}
