//! Conversation state for one chat session.
//!
//! The transcript only ever grows by whole turns: a user message followed by
//! the assistant reply being streamed into it. While a reply is open the
//! session is `busy` and refuses to start another turn.

use frames::{ChatRequest, Language, Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a reply is still streaming")]
    Busy,
}

#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<Message>,
    language: Language,
    busy: bool,
}

impl ChatSession {
    #[must_use]
    pub fn new(language: Language) -> Self {
        Self { messages: Vec::new(), language, busy: false }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    /// Applies from the next turn on.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Start a turn: record the user message, open an empty assistant reply
    /// and return the request to send (history without the open reply).
    ///
    /// # Errors
    ///
    /// [`SendError::EmptyMessage`] for blank input, [`SendError::Busy`] while
    /// a previous reply is still open. Neither changes the transcript.
    pub fn begin_turn(&mut self, input: &str) -> Result<ChatRequest, SendError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(SendError::EmptyMessage);
        }
        if self.busy {
            return Err(SendError::Busy);
        }

        self.messages.push(Message::user(text));
        let request = ChatRequest { messages: self.messages.clone(), language: Some(self.language.code().to_owned()) };
        self.messages.push(Message::assistant(""));
        self.busy = true;
        Ok(request)
    }

    pub fn append_fragment(&mut self, text: &str) {
        if let Some(reply) = self.open_reply() {
            reply.content.push_str(text);
        }
    }

    /// The request failed before any reply arrived: drop the open reply.
    /// The user message stays.
    pub fn abort_turn(&mut self) {
        if self.open_reply().is_some() {
            self.messages.pop();
        }
        self.busy = false;
    }

    /// Close the open reply, discarding it if nothing was streamed into it.
    pub fn finish_turn(&mut self) {
        if self.open_reply().is_some_and(|reply| reply.content.is_empty()) {
            self.messages.pop();
        }
        self.busy = false;
    }

    fn open_reply(&mut self) -> Option<&mut Message> {
        if !self.busy {
            return None;
        }
        self.messages.last_mut().filter(|m| m.role == Role::Assistant)
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
