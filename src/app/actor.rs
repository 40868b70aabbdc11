//! App actor - message loop processing App events, network responses and timers

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::debounce::Debouncer;
use crate::app::state::AppState;
use crate::config::Config;
use crate::messages::{AppEvent, NetworkCommand, NetworkResponse, Snapshot};
use crate::store::RemoteStore;
use crate::workspace::Workspace;

/// App actor that processes events and network responses
pub struct AppActor {
    state: AppState,
    store: Option<RemoteStore>,
    network_tx: mpsc::UnboundedSender<NetworkCommand>,
    snapshot_tx: mpsc::UnboundedSender<Snapshot>,
    url_sync: Debouncer,
    autosave: Debouncer,
}

impl AppActor {
    pub fn new(
        workspace: Workspace,
        config: &Config,
        network_tx: mpsc::UnboundedSender<NetworkCommand>,
        snapshot_tx: mpsc::UnboundedSender<Snapshot>,
    ) -> Self {
        AppActor {
            state: AppState::new(workspace),
            store: None,
            network_tx,
            snapshot_tx,
            url_sync: Debouncer::new(config.query_sync_delay()),
            autosave: Debouncer::new(config.autosave_delay()),
        }
    }

    /// Save edits to this store; without one, edits stay local
    pub fn with_store(mut self, store: RemoteStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Run the actor message loop
    pub async fn run(
        mut self,
        mut event_rx: mpsc::UnboundedReceiver<AppEvent>,
        mut net_rx: mpsc::UnboundedReceiver<NetworkResponse>,
    ) {
        self.publish();

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    if matches!(event, AppEvent::Quit) {
                        self.quit().await;
                        break;
                    }
                    self.handle_event(event);
                    self.publish();
                }
                Some(response) = net_rx.recv() => {
                    self.state.handle_response(response);
                    self.publish();
                }
                _ = self.url_sync.due() => {
                    if self.state.sync_url() {
                        self.autosave.schedule();
                        self.publish();
                    }
                }
                _ = self.autosave.due() => {
                    if self.state.is_dirty() {
                        let _ = self.persist();
                    }
                }
            }
        }
    }

    fn handle_event(&mut self, event: AppEvent) {
        let changed = match event {
            AppEvent::Select(id) => {
                let _ = self.settle();
                if let Some(cmd) = self.state.select(&id) {
                    let _ = self.network_tx.send(cmd);
                }
                false
            }
            AppEvent::SetActiveEnvironment(needle) => {
                self.state.set_active_environment(needle.as_deref());
                false
            }
            AppEvent::EditUrl(url) => {
                // A URL edit supersedes any pending param rebuild
                self.url_sync.cancel();
                self.state.edit_url(url)
            }
            AppEvent::EditMethod(method) => self.state.edit_method(method),
            AppEvent::EditQueryParams(params) => {
                self.state.edit_query_params(params);
                self.url_sync.schedule();
                false
            }
            AppEvent::EditHeaders(headers) => self.state.edit_headers(headers),
            AppEvent::EditBody(text) => self.state.edit_body(text),
            AppEvent::SetBodyType(body_type) => self.state.set_body_type(body_type),
            AppEvent::EditFormParams(params) => self.state.edit_form_params(params),
            AppEvent::SetAuth(auth) => self.state.set_auth(auth),
            AppEvent::SetScript(script) => {
                self.state.set_script(script);
                false
            }
            AppEvent::Send => {
                self.flush_url_sync();
                self.autosave.cancel();
                let _ = self.persist();
                if let Some(cmd) = self.state.send() {
                    let _ = self.network_tx.send(cmd);
                }
                false
            }
            AppEvent::SendMessage(text) => {
                if let Some(cmd) = self.state.send_message(text) {
                    let _ = self.network_tx.send(cmd);
                }
                false
            }
            AppEvent::Disconnect => {
                if let Some(cmd) = self.state.disconnect() {
                    let _ = self.network_tx.send(cmd);
                }
                false
            }
            AppEvent::Quit => false,
        };

        if changed {
            self.autosave.schedule();
        }
    }

    /// Apply a pending param rebuild now
    fn flush_url_sync(&mut self) {
        if self.url_sync.cancel() {
            self.state.sync_url();
        }
    }

    /// Finish pending work on the current draft before leaving it
    fn settle(&mut self) -> Option<JoinHandle<()>> {
        self.flush_url_sync();
        self.autosave.cancel();
        if self.state.is_dirty() {
            self.persist()
        } else {
            None
        }
    }

    /// Save the draft in the background
    fn persist(&mut self) -> Option<JoinHandle<()>> {
        let draft = self.state.draft.clone()?;
        self.state.mark_persisted();
        let store = self.store.clone()?;

        Some(tokio::spawn(async move {
            match store.update_request(&draft).await {
                Ok(_) => tracing::debug!(request_id = %draft.id, "Request saved"),
                Err(e) => tracing::warn!(request_id = %draft.id, error = %e, "Auto-save failed"),
            }
        }))
    }

    async fn quit(&mut self) {
        let pending_save = self.settle();
        if let Some(cmd) = self.state.disconnect() {
            let _ = self.network_tx.send(cmd);
        }
        let _ = self.network_tx.send(NetworkCommand::Shutdown);
        if let Some(handle) = pending_save {
            let _ = handle.await;
        }
        self.publish();
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(self.state.snapshot());
    }
}
