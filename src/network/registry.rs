//! Session registry - live socket sessions keyed by request id
//!
//! At most one session per request id. The registry is owned by the network
//! actor and only touched from its loop.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot, watch};

use crate::models::{Message, RequestType};

/// Lifecycle of a socket session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// Events a session task reports back to the network actor
#[derive(Debug)]
pub struct SessionEvent {
    pub request_id: String,
    pub session_id: u64,
    pub kind: SessionEventKind,
}

#[derive(Debug)]
pub enum SessionEventKind {
    Message(Message),
    /// Terminal: the task has finished
    Ended,
}

/// Registry-side handle of a running session
#[derive(Debug)]
pub struct SessionHandle {
    session_id: u64,
    protocol: RequestType,
    outgoing: mpsc::UnboundedSender<String>,
    cancel: Option<oneshot::Sender<()>>,
    state: watch::Receiver<SessionState>,
}

/// Task-side ends of a session
#[derive(Debug)]
pub struct SessionLink {
    pub outgoing: mpsc::UnboundedReceiver<String>,
    pub cancel: oneshot::Receiver<()>,
    pub state: watch::Sender<SessionState>,
}

impl SessionHandle {
    pub fn new(session_id: u64, protocol: RequestType) -> (SessionHandle, SessionLink) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        (
            SessionHandle {
                session_id,
                protocol,
                outgoing: outgoing_tx,
                cancel: Some(cancel_tx),
                state: state_rx,
            },
            SessionLink {
                outgoing: outgoing_rx,
                cancel: cancel_rx,
                state: state_tx,
            },
        )
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn protocol(&self) -> RequestType {
        self.protocol
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Receiver that observes this session's state, for waiting on teardown
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Queue an outgoing message; false if the task is gone
    pub fn send(&self, text: String) -> bool {
        self.outgoing.send(text).is_ok()
    }

    /// Ask the task to close; idempotent
    pub fn close(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

/// Task-side reporter for one session
#[derive(Debug)]
pub struct SessionContext {
    request_id: String,
    session_id: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Sender<SessionState>,
}

impl SessionContext {
    pub fn new(
        request_id: impl Into<String>,
        session_id: u64,
        events: mpsc::UnboundedSender<SessionEvent>,
        state: watch::Sender<SessionState>,
    ) -> Self {
        SessionContext {
            request_id: request_id.into(),
            session_id,
            events,
            state,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn emit(&self, message: Message) {
        let _ = self.events.send(SessionEvent {
            request_id: self.request_id.clone(),
            session_id: self.session_id,
            kind: SessionEventKind::Message(message),
        });
    }

    /// Mark the session open for outgoing messages
    pub fn opened(&self) {
        self.state.send_replace(SessionState::Open);
    }

    /// Report the terminal event, then release waiters on this session
    pub fn end(self) {
        let _ = self.events.send(SessionEvent {
            request_id: self.request_id.clone(),
            session_id: self.session_id,
            kind: SessionEventKind::Ended,
        });
        self.state.send_replace(SessionState::Closed);
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, SessionHandle>,
    next_session_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_session_id(&mut self) -> u64 {
        self.next_session_id += 1;
        self.next_session_id
    }

    /// Register a session, handing back the one it replaces (not yet closed)
    pub fn insert(&mut self, request_id: impl Into<String>, handle: SessionHandle) -> Option<SessionHandle> {
        self.sessions.insert(request_id.into(), handle)
    }

    pub fn get(&self, request_id: &str) -> Option<&SessionHandle> {
        self.sessions.get(request_id)
    }

    pub fn remove(&mut self, request_id: &str) -> Option<SessionHandle> {
        self.sessions.remove(request_id)
    }

    /// Drop the entry after a terminal event, unless it was already replaced.
    ///
    /// Returns true when no newer session exists for the id.
    pub fn finish(&mut self, request_id: &str, session_id: u64) -> bool {
        match self.sessions.get(request_id) {
            Some(handle) if handle.session_id == session_id => {
                self.sessions.remove(request_id);
                true
            }
            Some(_) => false,
            None => true,
        }
    }

    /// Close and forget every session
    pub fn close_all(&mut self) {
        for (request_id, mut handle) in self.sessions.drain() {
            tracing::debug!(request_id = %request_id, "Closing session");
            handle.close();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacement_keeps_one_entry() {
        let mut registry = SessionRegistry::new();
        let first_id = registry.next_session_id();
        let (first, _first_link) = SessionHandle::new(first_id, RequestType::WebSocket);
        assert!(registry.insert("r1", first).is_none());

        let second_id = registry.next_session_id();
        let (second, _second_link) = SessionHandle::new(second_id, RequestType::WebSocket);
        let replaced = registry.insert("r1", second).unwrap();

        assert_eq!(replaced.session_id(), first_id);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("r1").unwrap().session_id(), second_id);
    }

    #[test]
    fn test_finish_ignores_replaced_session() {
        let mut registry = SessionRegistry::new();
        let (old, _l1) = SessionHandle::new(1, RequestType::SocketIo);
        let (new, _l2) = SessionHandle::new(2, RequestType::SocketIo);
        registry.insert("r1", old);
        registry.insert("r1", new);

        assert!(!registry.finish("r1", 1));
        assert_eq!(registry.len(), 1);
        assert!(registry.finish("r1", 2));
        assert!(registry.is_empty());
        assert!(registry.finish("r1", 2));
    }

    #[tokio::test]
    async fn test_close_signals_task() {
        let (mut handle, link) = SessionHandle::new(1, RequestType::WebSocket);
        handle.close();
        handle.close();
        assert!(link.cancel.await.is_ok());
    }

    #[test]
    fn test_open_state_follows_task() {
        let (handle, link) = SessionHandle::new(1, RequestType::WebSocket);
        assert_eq!(handle.state(), SessionState::Connecting);
        assert!(!handle.is_open());
        link.state.send_replace(SessionState::Open);
        assert!(handle.is_open());
        assert!(handle.send("hi".into()));
    }

    #[tokio::test]
    async fn test_context_reports_then_closes() {
        let (handle, link) = SessionHandle::new(7, RequestType::WebSocket);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let ctx = SessionContext::new("r1", 7, events_tx, link.state);

        ctx.opened();
        assert!(handle.is_open());
        ctx.emit(Message::info("hello"));
        ctx.end();

        let first = events_rx.recv().await.unwrap();
        assert_eq!(first.session_id, 7);
        assert!(matches!(first.kind, SessionEventKind::Message(ref m) if m.text == "hello"));
        let second = events_rx.recv().await.unwrap();
        assert!(matches!(second.kind, SessionEventKind::Ended));
        assert_eq!(handle.state(), SessionState::Closed);
    }

    #[test]
    fn test_send_fails_once_task_is_gone() {
        let (handle, link) = SessionHandle::new(1, RequestType::WebSocket);
        drop(link);
        assert!(!handle.send("late".into()));
    }
}
