//! Network messages - communication between App and Network layers

use crate::models::{Message, Response};
use crate::request::MaterializedRequest;

/// Commands sent from App layer to Network layer
#[derive(Debug, Clone)]
pub enum NetworkCommand {
    /// Dispatch a materialized request: an HTTP call through the proxy, or a
    /// new socket session replacing any live one for the same request id
    Send(MaterializedRequest),
    /// Send a user message on the live session of a request
    SendMessage { request_id: String, text: String },
    /// Close the live session of a request
    Disconnect { request_id: String },
    /// Close every session and stop the network actor
    Shutdown,
}

/// Responses sent from Network layer to App layer
#[derive(Debug, Clone)]
pub enum NetworkResponse {
    /// HTTP call finished; failures are carried in `response.error`
    HttpCompleted { request_id: String, response: Response },
    /// A socket session produced a log message
    SessionMessage { request_id: String, message: Message },
    /// The live session of a request is gone
    SessionEnded { request_id: String },
}
