//! Conversation Context
//!
//! The pipeline treats prior context as an opaque string, but never lets it
//! grow without bound: blobs are clamped to a byte budget, oldest bytes
//! dropped first. `ContextWindow` is offered to callers who accumulate turns.

use std::collections::VecDeque;

/// Keep the trailing `max_bytes` of a caller-supplied context blob, aligned
/// to a char boundary.
pub fn clamp_context(context: &str, max_bytes: usize) -> &str {
    if context.len() <= max_bytes {
        return context;
    }
    let mut start = context.len() - max_bytes;
    while !context.is_char_boundary(start) {
        start += 1;
    }
    &context[start..]
}

/// Ring buffer of conversation turns under a byte budget.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    turns: VecDeque<String>,
    max_bytes: usize,
}

impl ContextWindow {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_bytes,
        }
    }

    /// Append one question/answer turn, evicting the oldest turns while over
    /// budget.
    pub fn push(&mut self, turn: String) {
        self.turns.push_back(turn);
        while self.total_bytes() > self.max_bytes && self.turns.len() > 1 {
            self.turns.pop_front();
        }
    }

    pub fn render(&self) -> String {
        self.turns.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn total_bytes(&self) -> usize {
        self.turns.iter().map(|t| t.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_keeps_short_context_intact() {
        assert_eq!(clamp_context("hello", 64), "hello");
    }

    #[test]
    fn test_clamp_keeps_most_recent_bytes() {
        let context = "old old old NEW";
        assert_eq!(clamp_context(context, 3), "NEW");
    }

    #[test]
    fn test_clamp_respects_char_boundaries() {
        let context = "ééééé";
        let clamped = clamp_context(context, 3);
        assert!(clamped.len() <= 3);
        assert!(context.ends_with(clamped));
    }

    #[test]
    fn test_window_evicts_oldest_first() {
        let mut window = ContextWindow::new(20);
        window.push("turn-one-is-long".to_string());
        window.push("turn-two".to_string());
        window.push("turn-three".to_string());
        let rendered = window.render();
        assert!(!rendered.contains("turn-one"));
        assert!(rendered.contains("turn-three"));
    }

    #[test]
    fn test_window_always_keeps_latest_turn() {
        let mut window = ContextWindow::new(4);
        window.push("a-very-long-turn-over-budget".to_string());
        assert_eq!(window.render(), "a-very-long-turn-over-budget");
    }
}
