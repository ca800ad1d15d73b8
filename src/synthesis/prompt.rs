//! Prompt assembly for the narrative request.

use super::backend::{ChatMessage, SynthesisRequest};
use crate::types::Query;

/// Marks the start and end of the headline segment.
pub const HEADLINE_SENTINEL: &str = "^^";

const FOLLOW_UP_RULE: &str = "- This is a follow-up question. Resolve pronouns and omitted subjects from the earlier turns, and do not repeat what was already answered.";

pub fn system_prompt(word_budget: usize) -> String {
    format!(
        r#"You write short, factual answers for a search results page.

Rules:
- Start with a one-sentence headline wrapped in {s}, for example: {s}Paris is the capital of France{s}
- Follow with at most {budget} words of supporting detail in plain prose.
- You may place the tokens [[video]], [[discussion]] or [[image]] on their own line where related videos, community discussions or images would help the reader. Use each token at most once.
- Cite sources with bracketed numbers such as [1] when you rely on them.
- No markdown headings, no lists, no preamble."#,
        s = HEADLINE_SENTINEL,
        budget = word_budget
    )
}

/// System prompt, then prior turns in order, then the query itself.
pub fn build_request(
    query: &Query,
    word_budget: usize,
    max_tokens: u32,
    temperature: f32,
) -> SynthesisRequest {
    let mut system = system_prompt(word_budget);
    if query.is_follow_up() {
        system.push('\n');
        system.push_str(FOLLOW_UP_RULE);
    }

    let mut messages = Vec::with_capacity(query.turn_history().len() + 2);
    messages.push(ChatMessage::new("system", system));

    for turn in query.turn_history() {
        messages.push(ChatMessage::new(turn.role.as_str(), turn.text.clone()));
    }

    messages.push(ChatMessage::new("user", query.text()));

    SynthesisRequest {
        messages,
        max_tokens,
        temperature,
    }
}
