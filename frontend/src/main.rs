mod api;
mod browser;
mod components;
mod markdown;
mod models;
mod pane;
mod state;
mod typeset;

use leptos::mount::mount_to_body;
use leptos::prelude::*;

use components::chat::ChatArea;
use components::sidebar::Sidebar;
use state::AppState;

/// Root application component.
#[component]
fn App() -> impl IntoView {
    let state = AppState::provide();

    // Load providers and sessions on mount
    state.load_api_keys();
    state.load_sessions();

    view! {
        <div class="app-container">
            <Sidebar />
            <ChatArea />
        </div>
    }
}

fn main() {
    if let Err(e) = console_log::init_with_level(log::Level::Debug) {
        web_sys::console::warn_1(&format!("Logger already initialised: {e}").into());
    }
    mount_to_body(App);
}
