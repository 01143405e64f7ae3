//! Conversation history and the importance-driven inclusion window.

use serde::{Deserialize, Serialize};

use crate::agent::message::{ChatMessage, Role, assistant_message, user_message};

/// Lowest accepted importance score.
pub const MIN_IMPORTANCE: u8 = 1;
/// Highest accepted importance score.
pub const MAX_IMPORTANCE: u8 = 10;
/// Importance used when it cannot be judged.
pub const DEFAULT_IMPORTANCE: u8 = 5;

/// Number of trailing history messages to include for an importance score.
///
/// | Importance | Messages |
/// |------------|----------|
/// | 1–3        | 2        |
/// | 4–7        | 6        |
/// | 8–10       | 10       |
///
/// Scores outside `1..=10` are clamped first.
#[must_use]
pub const fn history_window(importance: u8) -> usize {
    let importance = if importance < MIN_IMPORTANCE {
        MIN_IMPORTANCE
    } else if importance > MAX_IMPORTANCE {
        MAX_IMPORTANCE
    } else {
        importance
    };

    if importance <= 3 {
        2
    } else if importance <= 7 {
        6
    } else {
        10
    }
}

/// Ordered user/assistant turns of one conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    /// Creates an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Appends a user message.
    pub fn push_user(&mut self, content: &str) {
        self.messages.push(user_message(content));
    }

    /// Appends an assistant message.
    pub fn push_assistant(&mut self, content: &str) {
        self.messages.push(assistant_message(content));
    }

    /// All messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if no messages have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `n` messages (or all, if fewer).
    #[must_use]
    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// The trailing messages to include for the given importance score.
    #[must_use]
    pub fn window_for_importance(&self, importance: u8) -> &[ChatMessage] {
        self.recent(history_window(importance))
    }

    /// Content of the most recent user message, if any.
    #[must_use]
    pub fn last_user_query(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

impl FromIterator<ChatMessage> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = ChatMessage>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn history_of(n: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        for i in 0..n {
            if i % 2 == 0 {
                history.push_user(&format!("q{i}"));
            } else {
                history.push_assistant(&format!("a{i}"));
            }
        }
        history
    }

    #[test_case(1, 2)]
    #[test_case(2, 2)]
    #[test_case(3, 2)]
    #[test_case(4, 6)]
    #[test_case(5, 6)]
    #[test_case(7, 6)]
    #[test_case(8, 10)]
    #[test_case(9, 10)]
    #[test_case(10, 10)]
    fn test_history_window_thresholds(importance: u8, expected: usize) {
        assert_eq!(history_window(importance), expected);
    }

    #[test_case(0, 2; "zero clamps to one")]
    #[test_case(200, 10; "large clamps to ten")]
    fn test_history_window_clamps(importance: u8, expected: usize) {
        assert_eq!(history_window(importance), expected);
    }

    #[test]
    fn test_window_takes_trailing_messages() {
        let history = history_of(12);
        let window = history.window_for_importance(2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "q10");
        assert_eq!(window[1].content, "a11");
        assert_eq!(history.window_for_importance(5).len(), 6);
        assert_eq!(history.window_for_importance(9).len(), 10);
    }

    #[test]
    fn test_window_shorter_history() {
        let history = history_of(3);
        assert_eq!(history.window_for_importance(9).len(), 3);
    }

    #[test]
    fn test_last_user_query() {
        let history = history_of(4);
        assert_eq!(history.last_user_query(), Some("q2"));
        assert!(ConversationHistory::new().last_user_query().is_none());
    }
}
