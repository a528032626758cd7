//! UI-agnostic chat transcript
//!
//! The transcript is the ordered history of one session. Entries are only
//! ever appended; ordering is chronological and is what the UI renders.

use chrono::{DateTime, Local};

pub const GREETING: &str = "How can I help you today?";

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A single transcript entry. Immutable once created.
#[derive(Debug, Clone)]
pub struct Message {
    role: Role,
    content: String,
    timestamp: DateTime<Local>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// A fresh session transcript, seeded with the assistant greeting.
    pub fn new() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transcript_is_seeded_with_greeting() {
        let transcript = Transcript::new();
        assert_eq!(transcript.len(), 1);
        let first = &transcript.all()[0];
        assert_eq!(first.role(), Role::Assistant);
        assert_eq!(first.content(), GREETING);
    }

    #[test]
    fn append_keeps_insertion_order() {
        let mut transcript = Transcript::empty();
        assert!(transcript.is_empty());
        transcript.append(Message::user("one"));
        transcript.append(Message::assistant("two"));
        transcript.append(Message::user("three"));

        let contents: Vec<&str> = transcript.all().iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(transcript.last().map(|m| m.role()), Some(Role::User));
    }

    #[test]
    fn timestamps_are_non_decreasing() {
        let mut transcript = Transcript::empty();
        transcript.append(Message::user("a"));
        transcript.append(Message::assistant("b"));
        let all = transcript.all();
        assert!(all[0].timestamp() <= all[1].timestamp());
    }
}
