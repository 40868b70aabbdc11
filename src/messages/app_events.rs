//! App events - messages from a front end to the App layer

use crate::models::{AuthType, BodyType, Header, HttpMethod, Param};

/// Edits and actions a front end can request
#[derive(Debug, Clone)]
pub enum AppEvent {
    // Navigation
    Select(String),
    SetActiveEnvironment(Option<String>),

    // Editing the active request
    EditUrl(String),
    EditMethod(HttpMethod),
    EditQueryParams(Vec<Param>),
    EditHeaders(Vec<Header>),
    EditBody(String),
    SetBodyType(BodyType),
    EditFormParams(Vec<Param>),
    SetAuth(AuthType),
    SetScript(Option<String>),

    // Transport
    Send,
    SendMessage(String),
    Disconnect,

    Quit,
}
