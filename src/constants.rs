//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

/// Default backend base URL (store and proxy)
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Proxy endpoint, relative to the backend base URL
pub const PROXY_PATH: &str = "proxy";

/// HTTP request timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Quiet period before an edited request is saved
pub const AUTOSAVE_DELAY_MS: u64 = 1000;

/// Quiet period before edited query parameters are written back to the URL
pub const QUERY_SYNC_DELAY_MS: u64 = 100;

/// Event name used when emitting user messages over Socket.IO
pub const SOCKET_IO_EVENT: &str = "message";

/// Directory name under the platform config dir
pub const APP_DIR_NAME: &str = "courier";

/// Log file written by the binary
pub const DEFAULT_LOG_FILE: &str = "courier.log";

/// Application name
pub const APP_NAME: &str = "Courier";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
