use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Message;

pub const DEFAULT_TITLE: &str = "New chat";
pub const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a message; the first one names the session.
    pub fn push(&mut self, message: Message) {
        if self.messages.is_empty() {
            self.title = derive_title(&message.content);
        }
        self.messages.push(message);
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

pub fn derive_title(content: &str) -> String {
    let content = content.trim();
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_short() {
        assert_eq!(derive_title("hello"), "hello");
    }

    #[test]
    fn test_derive_title_truncates_at_30_chars() {
        let text = "a".repeat(31);
        assert_eq!(derive_title(&text), format!("{}...", "a".repeat(30)));
        assert_eq!(derive_title(&"b".repeat(30)), "b".repeat(30));
    }

    #[test]
    fn test_derive_title_counts_chars_not_bytes() {
        let text = "ü".repeat(40);
        assert_eq!(derive_title(&text), format!("{}...", "ü".repeat(30)));
    }

    #[test]
    fn test_title_set_only_by_first_message() {
        let mut session = ChatSession::new();
        assert_eq!(session.title, DEFAULT_TITLE);
        session.push(Message::user("first question"));
        session.push(Message::agent("an answer that should not rename"));
        assert_eq!(session.title, "first question");
        assert_eq!(session.messages.len(), 2);
    }
}
