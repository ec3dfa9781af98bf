use leptos::ev;
use leptos::prelude::*;

use crate::models::{PROVIDERS, model_examples, provider_summary};
use crate::state::AppState;

/// Sidebar with API key configuration and the chat session list.
#[component]
pub fn Sidebar() -> impl IntoView {
    view! {
        <aside class="sidebar">
            <div class="sidebar-header">
                <h2>"Chat Agent"</h2>
            </div>
            <ApiKeyPanel />
            <SessionList />
        </aside>
    }
}

/// Form for adding a provider key plus the list of configured providers.
#[component]
fn ApiKeyPanel() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (provider, set_provider) = signal(String::new());
    let (api_key, set_api_key) = signal(String::new());
    let (models_text, set_models_text) = signal(String::new());

    let on_save = move |_| {
        let clear_form = move || {
            set_provider.set(String::new());
            set_api_key.set(String::new());
            set_models_text.set(String::new());
        };
        state.save_api_key(
            provider.get_untracked(),
            api_key.get_untracked(),
            models_text.get_untracked(),
            clear_form,
        );
    };

    view! {
        <section class="api-key-panel">
            <h3>"API Keys"</h3>
            <select
                class="provider-select"
                on:change=move |ev| set_provider.set(event_target_value(&ev))
                prop:value=provider
            >
                <option value="">"Select Provider"</option>
                {PROVIDERS
                    .iter()
                    .map(|&(value, label, _)| {
                        view! {
                            <option value=value selected=move || provider.get() == value>
                                {label}
                            </option>
                        }
                    })
                    .collect_view()}
            </select>
            {move || {
                model_examples(&provider.get())
                    .map(|examples| view! { <div class="model-examples">{examples}</div> })
            }}
            <input
                type="password"
                placeholder="API key"
                prop:value=api_key
                on:input=move |ev| set_api_key.set(event_target_value(&ev))
            />
            <input
                type="text"
                placeholder="Models (comma-separated)"
                prop:value=models_text
                on:input=move |ev| set_models_text.set(event_target_value(&ev))
            />
            <button class="save-btn" on:click=on_save>
                "Save API Key"
            </button>

            <div class="configured-providers-list">
                {move || {
                    state
                        .providers
                        .get()
                        .into_iter()
                        .map(|(name, info)| {
                            let summary = provider_summary(&name, &info);
                            view! {
                                <div class="provider-item">
                                    <span>{summary}</span>
                                    <button
                                        class="delete-btn"
                                        on:click=move |_| state.delete_api_key(name.clone())
                                    >
                                        "×"
                                    </button>
                                </div>
                            }
                        })
                        .collect_view()
                }}
            </div>
        </section>
    }
}

/// "New Chat" button and the session list.
#[component]
fn SessionList() -> impl IntoView {
    let state = expect_context::<AppState>();

    view! {
        <section class="session-panel">
            <button class="new-chat-btn" on:click=move |_| state.new_chat()>
                "+ New Chat"
            </button>
            <div class="chat-sessions-list">
                {move || {
                    if state.sessions.with(Vec::is_empty) {
                        view! {
                            <div class="empty-sessions">"No conversations yet"</div>
                        }
                            .into_any()
                    } else {
                        view! {
                            <For
                                each=move || state.sessions.get()
                                key=|s| (s.id.clone(), s.title.clone(), s.message_count)
                                let:session
                            >
                                {
                                    let id_click = session.id.clone();
                                    let id_active = session.id.clone();
                                    let id_delete = session.id.clone();
                                    view! {
                                        <div
                                            class="chat-session"
                                            class:active=move || {
                                                state
                                                    .pane
                                                    .with(|p| p.current_session() == Some(id_active.as_str()))
                                            }
                                            on:click=move |_| state.select_session(id_click.clone())
                                        >
                                            <div class="session-title">{session.title.clone()}</div>
                                            <div class="session-meta">
                                                <span class="message-count">
                                                    {format!("{} messages", session.message_count)}
                                                </span>
                                                <button
                                                    class="delete-btn"
                                                    on:click=move |ev: ev::MouseEvent| {
                                                        ev.stop_propagation();
                                                        state.delete_session(id_delete.clone());
                                                    }
                                                >
                                                    "×"
                                                </button>
                                            </div>
                                        </div>
                                    }
                                }
                            </For>
                        }
                            .into_any()
                    }
                }}
            </div>
        </section>
    }
}
