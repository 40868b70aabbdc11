//! Command handlers - business logic for processing App events

use crate::app::AppState;
use crate::app::state::Persisted;
use crate::messages::{NetworkCommand, NetworkResponse};
use crate::models::{AuthType, Body, BodyType, Header, HttpMethod, Param, RequestType, Response};
use crate::request::{build_url, parse_form_data, parse_query_params, prepare};

impl AppState {
    // ========================
    // Navigation
    // ========================

    /// Make `id` the draft. Returns a disconnect for the previous draft's
    /// live session, if it had one.
    pub fn select(&mut self, id: &str) -> Option<NetworkCommand> {
        let disconnect = self.disconnect();
        match self.workspace.find_request(id).cloned() {
            Some(request) => {
                self.query_params = parse_query_params(&request.url);
                self.persisted = Some(Persisted::of(&request));
                self.draft = Some(request);
            }
            None => {
                tracing::warn!(request_id = %id, "Selected unknown request");
                self.draft = None;
                self.query_params.clear();
                self.persisted = None;
            }
        }
        disconnect
    }

    pub fn set_active_environment(&mut self, needle: Option<&str>) -> bool {
        let found = self.workspace.set_active_environment(needle);
        if !found {
            tracing::warn!(environment = ?needle, "Unknown environment");
        }
        found
    }

    // ========================
    // Editing
    //
    // Each returns true when the draft changed in a way worth saving.
    // ========================

    /// URL edits re-parse the query params; params never write back here
    pub fn edit_url(&mut self, url: String) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        if draft.url == url {
            return false;
        }
        self.query_params = parse_query_params(&url);
        draft.url = url;
        true
    }

    pub fn edit_method(&mut self, method: HttpMethod) -> bool {
        match self.draft.as_mut() {
            Some(draft) if draft.method != method => {
                draft.method = method;
                true
            }
            _ => false,
        }
    }

    /// Replace the param rows; the URL catches up in `sync_url`
    pub fn edit_query_params(&mut self, params: Vec<Param>) {
        self.query_params = params;
    }

    /// Write the param rows back into the URL. Returns false if nothing changed.
    pub fn sync_url(&mut self) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        let url = build_url(&draft.url, &self.query_params);
        if url == draft.url {
            return false;
        }
        draft.url = url;
        true
    }

    pub fn edit_headers(&mut self, headers: Vec<Header>) -> bool {
        match self.draft.as_mut() {
            Some(draft) if draft.headers != headers => {
                draft.headers = headers;
                true
            }
            _ => false,
        }
    }

    /// Body text under the current type; a body with no type becomes raw
    pub fn edit_body(&mut self, text: String) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        let body = match draft.body.body_type() {
            BodyType::Json => Body::Json(text),
            BodyType::FormData => Body::FormData(parse_form_data(&text)),
            BodyType::Raw | BodyType::None => Body::Raw(text),
        };
        if draft.body == body {
            return false;
        }
        draft.body = body;
        true
    }

    pub fn set_body_type(&mut self, body_type: BodyType) -> bool {
        match self.draft.as_mut() {
            Some(draft) if draft.body.body_type() != body_type => {
                draft.body = draft.body.convert(body_type);
                true
            }
            _ => false,
        }
    }

    pub fn edit_form_params(&mut self, params: Vec<Param>) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        let body = Body::FormData(params);
        if draft.body == body {
            return false;
        }
        draft.body = body;
        true
    }

    pub fn set_auth(&mut self, auth: AuthType) -> bool {
        match self.draft.as_mut() {
            Some(draft) if draft.auth != auth => {
                draft.auth = auth;
                true
            }
            _ => false,
        }
    }

    /// Scripts are saved with the next Send, not by auto-save
    pub fn set_script(&mut self, script: Option<String>) {
        if let Some(draft) = self.draft.as_mut() {
            draft.pre_request_script = script.filter(|s| !s.trim().is_empty());
        }
    }

    /// Record the draft as saved and mirror it into the workspace
    pub fn mark_persisted(&mut self) {
        if let Some(draft) = &self.draft {
            self.persisted = Some(Persisted::of(draft));
            self.workspace.update_request(draft);
        }
    }

    // ========================
    // Transport
    // ========================

    /// Materialize the draft and build the command that sends it.
    ///
    /// A script failure is recorded as the draft's response and nothing is sent.
    pub fn send(&mut self) -> Option<NetworkCommand> {
        let draft = self.draft.clone()?;

        let materialized = match prepare(&self.workspace, &draft) {
            Ok(materialized) => materialized,
            Err(e) => {
                tracing::warn!(request_id = %draft.id, error = %e, "Send aborted");
                self.loading.remove(&draft.id);
                self.responses
                    .insert(draft.id.clone(), Response::failed(e.to_string(), 0));
                return None;
            }
        };

        match draft.kind {
            RequestType::Http => {
                self.loading.insert(draft.id.clone());
            }
            RequestType::WebSocket | RequestType::SocketIo => {
                self.messages.insert(draft.id.clone(), Vec::new());
                self.live_sessions.insert(draft.id.clone());
            }
        }
        Some(NetworkCommand::Send(materialized))
    }

    /// Message for the draft's live session
    pub fn send_message(&self, text: String) -> Option<NetworkCommand> {
        if !self.is_live() || text.is_empty() {
            return None;
        }
        Some(NetworkCommand::SendMessage {
            request_id: self.draft_id()?.to_string(),
            text,
        })
    }

    pub fn disconnect(&mut self) -> Option<NetworkCommand> {
        let id = self.draft_id()?.to_string();
        if !self.live_sessions.remove(&id) {
            return None;
        }
        Some(NetworkCommand::Disconnect { request_id: id })
    }

    pub fn handle_response(&mut self, response: NetworkResponse) {
        match response {
            NetworkResponse::HttpCompleted { request_id, response } => {
                self.loading.remove(&request_id);
                self.responses.insert(request_id, response);
            }
            NetworkResponse::SessionMessage { request_id, message } => {
                self.messages.entry(request_id).or_default().push(message);
            }
            NetworkResponse::SessionEnded { request_id } => {
                self.live_sessions.remove(&request_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, MessageKind, Request};
    use crate::workspace::tests::sample;

    fn state_with(id: &str) -> AppState {
        let mut state = AppState::new(sample());
        state.select(id);
        state
    }

    #[test]
    fn test_select_parses_query_and_is_clean() {
        let mut workspace = sample();
        let mut request = workspace.find_request("r1").unwrap().clone();
        request.url = "https://api.test/x?a=1&b=2".into();
        workspace.update_request(&request);

        let mut state = AppState::new(workspace);
        state.select("r1");
        assert_eq!(state.query_params, vec![Param::new("a", "1"), Param::new("b", "2")]);
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_edit_url_reparses_params_and_dirties() {
        let mut state = state_with("r1");
        assert!(state.edit_url("https://api.test/y?q=rust".into()));
        assert_eq!(state.query_params, vec![Param::new("q", "rust")]);
        assert!(state.is_dirty());
        assert!(!state.edit_url("https://api.test/y?q=rust".into()));
    }

    #[test]
    fn test_param_edit_syncs_url_once() {
        let mut state = state_with("r1");
        state.edit_url("https://api.test/y?a=1".into());
        state.edit_query_params(vec![Param::new("a", "1"), Param::disabled("b", "2")]);
        assert!(!state.sync_url());

        state.edit_query_params(vec![Param::new("a", "1"), Param::new("c", "3")]);
        assert!(state.sync_url());
        assert_eq!(state.draft.as_ref().unwrap().url, "https://api.test/y?a=1&c=3");
        assert!(!state.sync_url());
    }

    #[test]
    fn test_reverting_edit_is_clean() {
        let mut state = state_with("r1");
        let original = state.draft.as_ref().unwrap().method;
        assert!(state.edit_method(HttpMethod::DELETE));
        assert!(state.is_dirty());
        assert!(state.edit_method(original));
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_body_type_switch_keeps_content() {
        let mut state = state_with("r1");
        state.edit_body("{\"a\":1}".into());
        assert_eq!(state.draft.as_ref().unwrap().body, Body::Raw("{\"a\":1}".into()));
        assert!(state.set_body_type(BodyType::Json));
        assert_eq!(state.draft.as_ref().unwrap().body, Body::Json("{\"a\":1}".into()));

        state.edit_form_params(vec![Param::new("k", "v")]);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.form_params, vec![Param::new("k", "v")]);
    }

    #[test]
    fn test_none_body_type_keeps_text_for_later() {
        let mut state = state_with("r1");
        state.edit_body("{\"keep\":1}".into());
        assert!(state.set_body_type(BodyType::None));
        assert_eq!(state.draft.as_ref().unwrap().body.payload(), None);

        assert!(state.set_body_type(BodyType::Raw));
        assert_eq!(state.draft.as_ref().unwrap().body, Body::Raw("{\"keep\":1}".into()));
    }

    #[test]
    fn test_script_is_not_an_autosave_field() {
        let mut state = state_with("r1");
        state.set_script(Some("pm.variables.set('a', 'b')".into()));
        assert!(!state.is_dirty());
        state.set_script(Some("   ".into()));
        assert_eq!(state.draft.as_ref().unwrap().pre_request_script, None);
    }

    #[test]
    fn test_send_http_marks_loading() {
        let mut state = state_with("r1");
        let cmd = state.send().unwrap();
        assert!(matches!(cmd, NetworkCommand::Send(ref m) if m.request_id == "r1"));
        assert!(state.snapshot().loading);

        state.handle_response(NetworkResponse::HttpCompleted {
            request_id: "r1".into(),
            response: Response::default(),
        });
        assert!(!state.snapshot().loading);
        assert!(state.snapshot().response.is_some());
    }

    #[test]
    fn test_script_error_is_reported_without_sending() {
        let mut state = state_with("r1");
        state.set_script(Some("error('boom')".into()));
        assert!(state.send().is_none());

        let response = state.snapshot().response.unwrap();
        assert!(response.error.unwrap().starts_with("Pre-request script error:"));
        assert!(!state.snapshot().loading);
    }

    #[test]
    fn test_socket_send_message_and_end() {
        let mut workspace = sample();
        let mut socket = Request::new("s1", "socket");
        socket.kind = RequestType::WebSocket;
        socket.url = "ws://localhost:9/{{h}}".into();
        workspace.independent_requests.push(socket);

        let mut state = AppState::new(workspace);
        state.select("s1");
        assert!(state.send_message("early".into()).is_none());

        assert!(matches!(state.send(), Some(NetworkCommand::Send(_))));
        assert!(state.is_live());
        assert!(matches!(
            state.send_message("hi".into()),
            Some(NetworkCommand::SendMessage { ref text, .. }) if text == "hi"
        ));

        state.handle_response(NetworkResponse::SessionMessage {
            request_id: "s1".into(),
            message: Message::info("Disconnected"),
        });
        state.handle_response(NetworkResponse::SessionEnded {
            request_id: "s1".into(),
        });
        let snapshot = state.snapshot();
        assert!(!snapshot.live);
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].kind, MessageKind::Info);
    }

    #[test]
    fn test_select_disconnects_previous_session() {
        let mut workspace = sample();
        let mut socket = Request::new("s1", "socket");
        socket.kind = RequestType::SocketIo;
        socket.url = "http://localhost:9".into();
        workspace.independent_requests.push(socket);

        let mut state = AppState::new(workspace);
        state.select("s1");
        state.send();
        let cmd = state.select("r1");
        assert!(matches!(cmd, Some(NetworkCommand::Disconnect { ref request_id }) if request_id == "s1"));
        assert!(state.select("s1").is_none());
    }

    #[test]
    fn test_mark_persisted_updates_workspace() {
        let mut state = state_with("r1");
        state.edit_url("https://api.test/changed".into());
        state.mark_persisted();
        assert!(!state.is_dirty());
        assert_eq!(state.workspace.find_request("r1").unwrap().url, "https://api.test/changed");
    }
}
