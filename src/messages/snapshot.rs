//! Snapshot - data structure sent from App layer to a front end for rendering

use crate::models::{Message, Param, Request, Response};

/// Complete state needed to render the active request
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Request being edited
    pub draft: Option<Request>,
    pub query_params: Vec<Param>,
    /// Rows of a form-data body; empty for other body types
    pub form_params: Vec<Param>,
    pub response: Option<Response>,
    pub messages: Vec<Message>,
    pub loading: bool,
    /// A socket session is live for the draft
    pub live: bool,
    pub active_environment: Option<String>,
}
