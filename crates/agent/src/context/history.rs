//! Conversation history for one session.

use ragchat_core::message::{Role, Turn};

use crate::context::token::TokenCounter;

/// Ordered, append-only list of turns. Only `clear` removes anything.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    turns: Vec<Turn>,
    counter: TokenCounter,
}

impl HistoryStore {
    pub fn new(counter: TokenCounter) -> Self {
        Self {
            turns: Vec::new(),
            counter,
        }
    }

    /// Append a turn stamped with the current time.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn::new(role, content).stamped());
    }

    /// The last `n` turns (fewer if history is shorter).
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Turns in `[start, end)`. Empty if `start` is out of bounds; `end` is clamped.
    pub fn range(&self, start: usize, end: usize) -> &[Turn] {
        let end = end.min(self.turns.len());
        if start >= end {
            return &[];
        }
        &self.turns[start..end]
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Sum of content tokens across all turns.
    pub fn total_tokens(&self) -> usize {
        self.counter.count_turns(&self.turns)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}
