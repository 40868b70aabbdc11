//! App state - pure data structure with no I/O logic

use std::collections::{HashMap, HashSet};

use crate::messages::Snapshot;
use crate::models::{AuthType, Body, Header, HttpMethod, Message, Param, Request, Response};
use crate::workspace::Workspace;

/// The fields whose change warrants an auto-save
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Persisted {
    url: String,
    method: HttpMethod,
    headers: Vec<Header>,
    body: Body,
    auth: AuthType,
}

impl Persisted {
    pub fn of(request: &Request) -> Self {
        Persisted {
            url: request.url.clone(),
            method: request.method,
            headers: request.headers.clone(),
            body: request.body.clone(),
            auth: request.auth.clone(),
        }
    }
}

/// Main application state - pure data, no I/O
#[derive(Debug, Default)]
pub struct AppState {
    pub workspace: Workspace,

    // Active request
    pub draft: Option<Request>,
    pub query_params: Vec<Param>,
    pub persisted: Option<Persisted>,

    // Per request id
    pub responses: HashMap<String, Response>,
    pub messages: HashMap<String, Vec<Message>>,
    pub loading: HashSet<String>,
    pub live_sessions: HashSet<String>,
}

impl AppState {
    pub fn new(workspace: Workspace) -> Self {
        AppState {
            workspace,
            ..AppState::default()
        }
    }

    pub fn draft_id(&self) -> Option<&str> {
        self.draft.as_ref().map(|d| d.id.as_str())
    }

    /// Whether the draft differs from what was last saved
    pub fn is_dirty(&self) -> bool {
        match (&self.draft, &self.persisted) {
            (Some(draft), Some(saved)) => Persisted::of(draft) != *saved,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.draft_id()
            .is_some_and(|id| self.live_sessions.contains(id))
    }

    /// Convert state to a Snapshot for a front end
    pub fn snapshot(&self) -> Snapshot {
        let id = self.draft_id();
        let form_params = match self.draft.as_ref().map(|d| &d.body) {
            Some(Body::FormData(params)) => params.clone(),
            _ => Vec::new(),
        };
        Snapshot {
            draft: self.draft.clone(),
            query_params: self.query_params.clone(),
            form_params,
            response: id.and_then(|id| self.responses.get(id)).cloned(),
            messages: id
                .and_then(|id| self.messages.get(id))
                .cloned()
                .unwrap_or_default(),
            loading: id.is_some_and(|id| self.loading.contains(id)),
            live: self.is_live(),
            active_environment: self.workspace.active_environment().map(|e| e.name.clone()),
        }
    }
}
