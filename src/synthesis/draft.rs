//! Word-budgeted narrative accumulator.
//!
//! Chunks arrive in transport order and are split on whitespace. A word is
//! committed only once the whitespace after it has been seen (or at
//! [`NarrativeDraft::finish`]), so a word split across two chunks is never
//! counted twice and never cut in half. When a word beyond the budget starts,
//! the draft closes with an ellipsis on the last committed word.

/// Appended to the last kept word when the budget cut the text short.
pub const ELLIPSIS: char = '…';

#[derive(Debug, Clone)]
pub struct NarrativeDraft {
    raw_text: String,
    budget: usize,
    words: usize,
    pending: String,
    pending_space: String,
    complete: bool,
    truncated: bool,
}

impl NarrativeDraft {
    pub fn new(budget: usize) -> Self {
        Self {
            raw_text: String::new(),
            budget: budget.max(1),
            words: 0,
            pending: String::new(),
            pending_space: String::new(),
            complete: false,
            truncated: false,
        }
    }

    /// Clamp a complete text to the budget in one step.
    pub fn from_text(text: &str, budget: usize) -> Self {
        let mut draft = Self::new(budget);
        draft.push_chunk(text);
        draft.finish();
        draft
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn into_text(self) -> String {
        self.raw_text
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn word_count(&self) -> usize {
        self.words
    }

    pub fn budget_remaining(&self) -> usize {
        self.budget - self.words
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// True when the budget, not the producer, ended the text.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Append a chunk. Returns the text committed by this call, which may be
    /// empty when the chunk only extended a pending word.
    pub fn push_chunk(&mut self, chunk: &str) -> String {
        let start = self.raw_text.len();

        for c in chunk.chars() {
            if self.complete {
                break;
            }

            if c.is_whitespace() {
                if !self.pending.is_empty() {
                    self.commit_pending();
                }
                self.pending_space.push(c);
            } else if self.words >= self.budget {
                self.raw_text.push(ELLIPSIS);
                self.complete = true;
                self.truncated = true;
            } else {
                self.pending.push(c);
            }
        }

        self.raw_text[start..].to_string()
    }

    /// Close the draft, committing a trailing word if it still fits.
    /// Returns the text committed by this call.
    pub fn finish(&mut self) -> String {
        let start = self.raw_text.len();

        if !self.complete && !self.pending.is_empty() {
            self.commit_pending();
        }
        self.pending.clear();
        self.pending_space.clear();
        self.complete = true;

        self.raw_text[start..].to_string()
    }

    fn commit_pending(&mut self) {
        if self.words > 0 {
            self.raw_text.push_str(&self.pending_space);
        }
        self.raw_text.push_str(&self.pending);
        self.words += 1;
        self.pending.clear();
        self.pending_space.clear();
    }
}
