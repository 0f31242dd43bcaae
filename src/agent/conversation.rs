//! Conversation history management
//!
//! Maintains chat history with a bounded size.

use std::collections::VecDeque;

use crate::core::Message;

/// Manages conversation history
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Message history
    messages: VecDeque<Message>,
    /// Maximum history length
    max_length: usize,
}

impl Conversation {
    /// Create a new conversation
    pub fn new(max_length: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_length,
        }
    }

    /// Append the messages of one completed turn, in order
    pub fn extend(&mut self, turn: impl IntoIterator<Item = Message>) {
        self.messages.extend(turn);
        self.evict();
    }

    /// Add a user message
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.extend([Message::user(content)]);
    }

    /// Add an assistant message
    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.extend([Message::assistant(content)]);
    }

    /// Drop whole turns, oldest first, until under the limit.
    ///
    /// A turn runs from a user message up to the next one, so a tool call is
    /// never separated from its result. The latest turn is always kept, even
    /// when it alone is longer than the limit.
    fn evict(&mut self) {
        while self.messages.len() > self.max_length {
            let next_turn = self
                .messages
                .iter()
                .skip(1)
                .position(|m| m.is_user())
                .map(|i| i + 1);

            match next_turn {
                Some(end) => {
                    self.messages.drain(..end);
                }
                None => break,
            }
        }
    }

    /// Get messages in order, oldest first
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Get the last user message
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_user())
    }

    /// Get the last assistant message
    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == "assistant")
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(200)
    }
}
