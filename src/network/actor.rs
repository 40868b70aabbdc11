//! Network actor - runs proxy HTTP calls and socket sessions in Tokio async runtime

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::messages::{NetworkCommand, NetworkResponse};
use crate::models::{Message, RequestType};
use crate::network::client::ProxyClient;
use crate::network::registry::{
    SessionContext, SessionEvent, SessionEventKind, SessionHandle, SessionRegistry, SessionState,
};
use crate::network::socketio::run_socketio;
use crate::network::websocket::run_websocket;
use crate::request::MaterializedRequest;

/// How long shutdown waits for sessions to send their close frames
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Network actor that processes HTTP request and socket session commands
pub struct NetworkActor {
    proxy: ProxyClient,
    response_tx: mpsc::UnboundedSender<NetworkResponse>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    registry: SessionRegistry,
    active_requests: JoinSet<()>,
}

impl NetworkActor {
    pub fn new(proxy: ProxyClient, response_tx: mpsc::UnboundedSender<NetworkResponse>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        NetworkActor {
            proxy,
            response_tx,
            events_tx,
            events_rx,
            registry: SessionRegistry::new(),
            active_requests: JoinSet::new(),
        }
    }

    /// Run the network actor message loop
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<NetworkCommand>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(NetworkCommand::Send(request)) => self.dispatch(request),
                        Some(NetworkCommand::SendMessage { request_id, text }) => {
                            self.send_message(request_id, text);
                        }
                        Some(NetworkCommand::Disconnect { request_id }) => {
                            if let Some(mut handle) = self.registry.remove(&request_id) {
                                tracing::info!(request_id = %request_id, "Disconnecting session");
                                handle.close();
                            }
                        }
                        Some(NetworkCommand::Shutdown) | None => break,
                    }
                }

                Some(event) = self.events_rx.recv() => self.handle_session_event(event),

                // Clean up completed tasks
                Some(_result) = self.active_requests.join_next() => {}
            }
        }

        self.shutdown().await;
    }

    fn dispatch(&mut self, request: MaterializedRequest) {
        match request.kind {
            RequestType::Http => {
                let response_tx = self.response_tx.clone();
                let proxy = self.proxy.clone();

                // No de-duplication: every Send is its own call
                self.active_requests.spawn(async move {
                    tracing::info!(request_id = %request.request_id, url = %request.url, method = %request.method.as_str(), "Executing request");
                    let response = proxy.execute(&request).await;
                    tracing::info!(request_id = %request.request_id, status = ?response.status, error = ?response.error, "Request completed");
                    let _ = response_tx.send(NetworkResponse::HttpCompleted {
                        request_id: request.request_id,
                        response,
                    });
                });
            }
            RequestType::WebSocket | RequestType::SocketIo => self.open_session(request),
        }
    }

    /// Start a session, tearing down any live one for the same request first.
    /// The new task waits until the old one has fully closed before connecting.
    fn open_session(&mut self, request: MaterializedRequest) {
        let prior = self.registry.remove(&request.request_id).map(|mut handle| {
            tracing::info!(request_id = %request.request_id, session_id = handle.session_id(), "Replacing session");
            handle.close();
            handle.watch_state()
        });

        let session_id = self.registry.next_session_id();
        let (handle, link) = SessionHandle::new(session_id, request.kind);
        self.registry.insert(request.request_id.clone(), handle);

        let ctx = SessionContext::new(
            request.request_id.clone(),
            session_id,
            self.events_tx.clone(),
            link.state,
        );
        let kind = request.kind;
        let url = request.url;
        let outgoing = link.outgoing;
        let cancel = link.cancel;

        self.active_requests.spawn(async move {
            if let Some(mut prior_state) = prior {
                let _ = prior_state.wait_for(|s| *s == SessionState::Closed).await;
            }
            match kind {
                RequestType::SocketIo => run_socketio(ctx, url, outgoing, cancel).await,
                _ => run_websocket(ctx, url, outgoing, cancel).await,
            }
        });
    }

    fn send_message(&mut self, request_id: String, text: String) {
        let Some(handle) = self.registry.get(&request_id) else {
            tracing::debug!(request_id = %request_id, "No session, message dropped");
            return;
        };

        // Raw sockets only accept messages while open; Socket.IO queues until connected
        let accepted = match handle.protocol() {
            RequestType::SocketIo => handle.send(text.clone()),
            _ => handle.is_open() && handle.send(text.clone()),
        };
        if accepted {
            let _ = self.response_tx.send(NetworkResponse::SessionMessage {
                request_id,
                message: Message::sent(text),
            });
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event.kind {
            SessionEventKind::Message(message) => {
                let _ = self.response_tx.send(NetworkResponse::SessionMessage {
                    request_id: event.request_id,
                    message,
                });
            }
            SessionEventKind::Ended => {
                // A replaced session ends quietly; its successor owns the id now
                if self.registry.finish(&event.request_id, event.session_id) {
                    let _ = self.response_tx.send(NetworkResponse::SessionEnded {
                        request_id: event.request_id,
                    });
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        if !self.registry.is_empty() {
            tracing::info!(sessions = self.registry.len(), "Closing live sessions");
        }
        self.registry.close_all();
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while self.active_requests.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!("Network tasks still running at shutdown, aborting");
        }
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_session_event(event);
        }
    }
}
