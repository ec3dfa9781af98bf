use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::api;
use crate::browser;
use crate::models::{ProviderMap, SaveKeyRequest, SessionSummary, model_options, parse_models_input};
use crate::pane::ChatPane;

/// Shared application state, provided via Leptos context.
#[derive(Clone, Copy)]
pub struct AppState {
    // --- Read signals (for components to subscribe to) ---
    pub providers: ReadSignal<ProviderMap>,
    pub sessions: ReadSignal<Vec<SessionSummary>>,
    pub selected_model: ReadSignal<String>,
    pub pane: ReadSignal<ChatPane>,

    // --- Write signals (for mutating state) ---
    pub set_providers: WriteSignal<ProviderMap>,
    pub set_sessions: WriteSignal<Vec<SessionSummary>>,
    pub set_selected_model: WriteSignal<String>,
    pub set_pane: WriteSignal<ChatPane>,
}

impl AppState {
    /// Create a new `AppState` and provide it in the current Leptos context.
    pub fn provide() -> Self {
        let (providers, set_providers) = signal(ProviderMap::new());
        let (sessions, set_sessions) = signal(Vec::<SessionSummary>::new());
        let (selected_model, set_selected_model) = signal(String::new());
        let (pane, set_pane) = signal(ChatPane::default());

        let state = Self {
            providers,
            sessions,
            selected_model,
            pane,
            set_providers,
            set_sessions,
            set_selected_model,
            set_pane,
        };

        provide_context(state);
        state
    }

    /// Whether the message input and send button are usable right now.
    pub fn input_enabled(&self) -> bool {
        let has_model = !self.selected_model.get().is_empty();
        self.pane.with(|p| p.input_enabled(has_model))
    }

    // ── API keys ─────────────────────────────────────────────────────────────

    /// Load configured providers; drops the selected model if it disappeared.
    pub fn load_api_keys(&self) {
        let state = *self;
        spawn_local(async move {
            match api::fetch_api_keys().await {
                Ok(providers) => {
                    let selected = state.selected_model.get_untracked();
                    let still_offered = model_options(&providers).iter().any(|o| o.value == selected);
                    if !still_offered && !selected.is_empty() {
                        state.set_selected_model.set(String::new());
                    }
                    state.set_providers.set(providers);
                }
                Err(e) => log::error!("Error loading API keys: {e}"),
            }
        });
    }

    /// Validate and store a key; `on_saved` runs after a successful save.
    pub fn save_api_key(
        &self,
        provider: String,
        api_key: String,
        models_text: String,
        on_saved: impl FnOnce() + 'static,
    ) {
        if provider.is_empty() || api_key.is_empty() {
            browser::alert("Please select a provider and enter an API key");
            return;
        }
        let request = SaveKeyRequest { provider, api_key, models: parse_models_input(&models_text) };

        let state = *self;
        spawn_local(async move {
            match api::save_api_key(&request).await {
                Ok(()) => {
                    on_saved();
                    state.load_api_keys();
                }
                Err(e) => browser::alert(&e),
            }
        });
    }

    pub fn delete_api_key(&self, provider: String) {
        if !browser::confirm(&format!("Delete API key for {provider}?")) {
            return;
        }
        let state = *self;
        spawn_local(async move {
            match api::delete_api_key(&provider).await {
                Ok(()) => state.load_api_keys(),
                Err(e) => browser::alert(&format!("Error deleting API key: {e}")),
            }
        });
    }

    // ── Sessions ─────────────────────────────────────────────────────────────

    /// Load sessions from the backend.
    pub fn load_sessions(&self) {
        let state = *self;
        spawn_local(async move {
            match api::fetch_sessions().await {
                Ok(sessions) => state.set_sessions.set(sessions),
                Err(e) => log::error!("Error loading chat sessions: {e}"),
            }
        });
    }

    pub fn new_chat(&self) {
        let state = *self;
        spawn_local(async move {
            match api::create_session().await {
                Ok(id) => {
                    state.set_pane.update(|p| p.open_new(id));
                    state.load_sessions();
                }
                Err(e) => browser::alert(&format!("Error creating new chat: {e}")),
            }
        });
    }

    /// Select a session and load its messages.
    pub fn select_session(&self, id: String) {
        let title = self
            .sessions
            .with_untracked(|list| list.iter().find(|s| s.id == id).map(|s| s.title.clone()));
        self.set_pane.update(|p| p.select(id.clone(), title));

        let state = *self;
        spawn_local(async move {
            match api::fetch_messages(&id).await {
                Ok(messages) => {
                    state.set_pane.update(|p| {
                        if !p.show_messages(&id, messages) {
                            log::debug!("Dropped messages of session {id}; another session is open");
                        }
                    });
                    state.load_sessions();
                }
                Err(e) => log::error!("Error loading chat session: {e}"),
            }
        });
    }

    pub fn delete_session(&self, id: String) {
        if !browser::confirm("Delete this chat session?") {
            return;
        }
        let state = *self;
        spawn_local(async move {
            match api::delete_session(&id).await {
                Ok(()) => {
                    state.set_pane.update(|p| {
                        p.session_deleted(&id);
                    });
                    state.load_sessions();
                }
                Err(e) => {
                    log::error!("Error deleting chat session {id}: {e}");
                    browser::alert("Error deleting chat session");
                }
            }
        });
    }

    // ── Messages ─────────────────────────────────────────────────────────────

    /// Send `text` with the selected model. Returns `false` when the send was ignored.
    pub fn send_message(&self, text: &str) -> bool {
        let model = self.selected_model.get_untracked();
        let mut outgoing = None;
        self.set_pane.update(|p| outgoing = p.begin_send(text, &model, browser::now_iso()));
        let Some(outgoing) = outgoing else {
            return false;
        };

        let state = *self;
        spawn_local(async move {
            let result = api::send_message(&outgoing.session_id, &outgoing.request).await;
            if let Err(e) = &result {
                log::error!("Error sending message: {e}");
            }
            state.set_pane.update(|p| p.finish_send(&outgoing, result));
            state.load_sessions();
        });
        true
    }
}
