use leptos::ev;
use leptos::html;
use leptos::prelude::*;

use crate::browser;
use crate::markdown::render_markdown;
use crate::models::{Message, model_options};
use crate::pane::{ChatEntry, ChatPane, EntryKind};
use crate::state::AppState;
use crate::typeset;

/// Main chat area with title, model picker, message history and input.
#[component]
pub fn ChatArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let container = NodeRef::<html::Div>::new();

    let title = Memo::new(move |_| state.pane.with(|p| p.title().to_string()));
    let shows_welcome = Memo::new(move |_| state.pane.with(ChatPane::shows_welcome));
    let entries = Memo::new(move |_| state.pane.with(|p| p.entries().to_vec()));
    let is_loading = Memo::new(move |_| state.pane.with(ChatPane::is_loading));

    // Keep the newest entry in view
    Effect::new(move |_| {
        entries.track();
        is_loading.track();
        if let Some(el) = container.get() {
            el.set_scroll_top(el.scroll_height());
        }
    });

    view! {
        <main class="chat-area">
            <div class="chat-header">
                <h2 class="chat-title">{move || title.get()}</h2>
                <ModelSelect />
            </div>

            <div class="chat-container" node_ref=container>
                {move || {
                    if shows_welcome.get() {
                        view! { <Welcome /> }.into_any()
                    } else {
                        view! {
                            <For each=move || entries.get() key=|e| e.id let:entry>
                                <EntryView entry=entry />
                            </For>
                            {move || {
                                is_loading
                                    .get()
                                    .then(|| view! { <div class="loading">"Generating response..."</div> })
                            }}
                        }
                            .into_any()
                    }
                }}
            </div>

            <ChatInput />
        </main>
    }
}

#[component]
fn Welcome() -> impl IntoView {
    view! {
        <div class="welcome">
            <h2>"Welcome to Chat Agent"</h2>
            <p>"Configure your API keys and start a new chat to begin."</p>
        </div>
    }
}

/// Dropdown of every configured `provider/model`.
#[component]
fn ModelSelect() -> impl IntoView {
    let state = expect_context::<AppState>();
    let options = Memo::new(move |_| state.providers.with(model_options));

    view! {
        <select
            class="model-select"
            on:change=move |ev| state.set_selected_model.set(event_target_value(&ev))
            prop:value=move || state.selected_model.get()
        >
            <option value="">"Select Model"</option>
            {move || {
                options
                    .get()
                    .into_iter()
                    .map(|option| {
                        let value = option.value.clone();
                        view! {
                            <option
                                value=option.value
                                selected=move || state.selected_model.get() == value
                            >
                                {option.label}
                            </option>
                        }
                    })
                    .collect_view()
            }}
        </select>
    }
}

#[component]
fn EntryView(entry: ChatEntry) -> impl IntoView {
    match entry.kind {
        EntryKind::Message(message) => view! { <MessageBubble message=message /> }.into_any(),
        EntryKind::Error(text) => view! { <div class="error">{text}</div> }.into_any(),
    }
}

/// A single chat message; assistant content is rendered as rich text.
#[component]
fn MessageBubble(message: Message) -> impl IntoView {
    let time = browser::local_time(&message.timestamp);

    if message.is_assistant() {
        let info = format!("{time} • {}", message.model.as_deref().unwrap_or("AI"));
        let html = render_markdown(&message.content);
        let content_ref = NodeRef::<html::Div>::new();
        Effect::new(move |_| {
            if let Some(el) = content_ref.get() {
                typeset::enhance(&el);
            }
        });

        view! {
            <div class="message assistant">
                <div class="message-content" node_ref=content_ref inner_html=html></div>
                <div class="message-info">{info}</div>
            </div>
        }
        .into_any()
    } else {
        view! {
            <div class="message user">
                <div class="message-content">{message.content}</div>
                <div class="message-info">{time}</div>
            </div>
        }
        .into_any()
    }
}

/// Message input form with textarea and send button.
#[component]
fn ChatInput() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (input, set_input) = signal(String::new());
    let input_ref = NodeRef::<html::Textarea>::new();

    let enabled = move || state.input_enabled();
    let is_loading = move || state.pane.with(ChatPane::is_loading);

    let send = move || {
        if state.send_message(&input.get_untracked()) {
            set_input.set(String::new());
        }
    };

    let on_keydown = move |ev: ev::KeyboardEvent| {
        if ev.key() == "Enter" && !ev.shift_key() {
            ev.prevent_default();
            send();
        }
    };

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        send();
    };

    // Refocus the input once a reply (or error) has arrived
    Effect::new(move |was_loading: Option<bool>| {
        let loading = is_loading();
        if was_loading == Some(true) && !loading {
            if let Some(el) = input_ref.get_untracked() {
                if let Err(e) = el.focus() {
                    log::debug!("Could not focus message input: {e:?}");
                }
            }
        }
        loading
    });

    view! {
        <form class="input-area" on:submit=on_submit>
            <div class="input-row">
                <textarea
                    rows="1"
                    placeholder="Type a message… (Enter to send, Shift+Enter for newline)"
                    node_ref=input_ref
                    prop:value=input
                    on:input=move |ev| set_input.set(event_target_value(&ev))
                    on:keydown=on_keydown
                    disabled=move || !enabled()
                />
                <button type="submit" class="send-btn" disabled=move || !enabled()>
                    {move || if is_loading() { "Sending…" } else { "Send" }}
                </button>
            </div>
        </form>
    }
}
