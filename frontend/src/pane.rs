//! State of the chat pane: which session is open, what it shows, and
//! whether a send is in flight.

use crate::models::{Message, ModelChoice, SendMessageRequest, title_from_message};

pub const DEFAULT_TITLE: &str = "Chat Agent";
pub const NEW_CHAT_TITLE: &str = "New Chat";

/// A row in the message list.
#[derive(Clone, Debug, PartialEq)]
pub enum EntryKind {
    Message(Message),
    Error(String),
}

/// Entries carry an id unique for the pane's lifetime so keyed lists never
/// confuse rows of different sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatEntry {
    pub id: u64,
    pub kind: EntryKind,
}

/// A send accepted by [`ChatPane::begin_send`].
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMessage {
    pub session_id: String,
    pub request: SendMessageRequest,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatPane {
    current_session: Option<String>,
    title: String,
    entries: Vec<ChatEntry>,
    is_loading: bool,
    next_entry_id: u64,
}

impl Default for ChatPane {
    fn default() -> Self {
        Self {
            current_session: None,
            title: DEFAULT_TITLE.to_string(),
            entries: Vec::new(),
            is_loading: false,
            next_entry_id: 0,
        }
    }
}

impl ChatPane {
    pub fn current_session(&self) -> Option<&str> {
        self.current_session.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// No session open: the welcome view is shown instead of messages.
    pub fn shows_welcome(&self) -> bool {
        self.current_session.is_none()
    }

    /// Input and send button are usable only with a session, a model and no send in flight.
    pub fn input_enabled(&self, has_model: bool) -> bool {
        has_model && self.current_session.is_some() && !self.is_loading
    }

    /// A freshly created session becomes current with an empty view.
    pub fn open_new(&mut self, session_id: String) {
        self.current_session = Some(session_id);
        self.title = NEW_CHAT_TITLE.to_string();
        self.entries.clear();
    }

    /// Marks a session current while its messages load.
    pub fn select(&mut self, session_id: String, title: Option<String>) {
        if let Some(title) = title {
            self.title = title;
        }
        self.current_session = Some(session_id);
    }

    /// Replaces the view with loaded messages, unless another session was selected meanwhile.
    pub fn show_messages(&mut self, session_id: &str, messages: Vec<Message>) -> bool {
        if self.current_session() != Some(session_id) {
            return false;
        }
        self.entries.clear();
        for message in messages {
            self.push(EntryKind::Message(message));
        }
        true
    }

    /// Clears the view when the deleted session is the open one.
    pub fn session_deleted(&mut self, session_id: &str) -> bool {
        if self.current_session() != Some(session_id) {
            return false;
        }
        self.current_session = None;
        self.title = DEFAULT_TITLE.to_string();
        self.entries.clear();
        true
    }

    /// Accepts a send and renders the user's message optimistically.
    /// Returns `None`, leaving the pane untouched, when the send must be ignored.
    pub fn begin_send(&mut self, text: &str, model_value: &str, now: String) -> Option<OutgoingMessage> {
        if self.is_loading {
            return None;
        }
        let session_id = self.current_session.clone()?;
        let message = text.trim();
        if message.is_empty() {
            return None;
        }
        let choice = ModelChoice::parse(model_value)?;

        self.is_loading = true;
        self.push(EntryKind::Message(Message {
            role: "user".to_string(),
            content: message.to_string(),
            timestamp: now,
            model: None,
        }));

        Some(OutgoingMessage {
            session_id,
            request: SendMessageRequest {
                message: message.to_string(),
                model_provider: choice.provider,
                model_name: choice.model,
            },
        })
    }

    /// Ends the in-flight send whatever its outcome.
    /// The reply or error is shown only if its session is still open.
    pub fn finish_send(&mut self, outgoing: &OutgoingMessage, result: Result<Message, String>) {
        self.is_loading = false;
        if self.current_session() != Some(outgoing.session_id.as_str()) {
            return;
        }
        match result {
            Ok(reply) => {
                self.push(EntryKind::Message(reply));
                if self.title == NEW_CHAT_TITLE {
                    self.title = title_from_message(&outgoing.request.message);
                }
            }
            Err(e) => self.push(EntryKind::Error(format!("Error: {e}"))),
        }
    }

    fn push(&mut self, kind: EntryKind) {
        let id = self.next_entry_id;
        self.next_entry_id += 1;
        self.entries.push(ChatEntry { id, kind });
    }
}
