use tracing::{info, warn};

use crate::llm::ChatMessage;

/// Default document budget in characters (about 7 500 tokens).
pub const DEFAULT_CONTEXT_BUDGET: usize = 30_000;

/// Rough chars-per-token ratio used for estimates.
pub const CHARS_PER_TOKEN: usize = 4;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that answers questions based on the \
provided document. Use only information from the document to answer. \
If the answer is not in the document, say so clearly.";

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Messages for one question, plus what happened to the document on the way in.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub messages: Vec<ChatMessage>,
    /// Document text as embedded, `None` when no context was sent.
    pub context: Option<String>,
    pub truncated: bool,
    /// Character count of the document before truncation.
    pub original_chars: usize,
}

/// Combines a fixed system instruction with an optional document and a question.
///
/// The document is embedded in the user message, ahead of the restated
/// question, and cut to `budget` characters when it is longer.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_instruction: String,
    budget: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_INSTRUCTION, DEFAULT_CONTEXT_BUDGET)
    }
}

impl PromptAssembler {
    pub fn new(system_instruction: impl Into<String>, budget: usize) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            budget,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn assemble(&self, question: &str, document: Option<&str>) -> AssembledPrompt {
        let system = ChatMessage::system(self.system_instruction.clone());

        let document = match document {
            Some(text) if !text.is_empty() => text,
            _ => {
                warn!("No context provided, sending the question on its own");
                return AssembledPrompt {
                    messages: vec![system, ChatMessage::user(question)],
                    context: None,
                    truncated: false,
                    original_chars: 0,
                };
            }
        };

        let original_chars = document.chars().count();
        let (context, truncated) = match truncate_chars(document, self.budget) {
            Some(prefix) => (prefix, true),
            None => (document, false),
        };

        if truncated {
            warn!(
                original_chars,
                budget = self.budget,
                "Document exceeds context budget, truncating"
            );
        }
        info!(
            chars = original_chars.min(self.budget),
            est_tokens = estimate_tokens(context),
            truncated,
            "Context provided"
        );

        AssembledPrompt {
            messages: vec![system, ChatMessage::user(render_user_message(context, question))],
            context: Some(context.to_string()),
            truncated,
            original_chars,
        }
    }
}

fn render_user_message(context: &str, question: &str) -> String {
    format!(
        "Here is the document content to reference:\n\n\
         ---BEGIN DOCUMENT---\n\
         {context}\n\
         ---END DOCUMENT---\n\n\
         Based on the document above, please answer this question:\n\
         {question}"
    )
}

/// Prefix of `text` holding at most `max_chars` characters, or `None` if it already fits.
fn truncate_chars(text: &str, max_chars: usize) -> Option<&str> {
    text.char_indices()
        .nth(max_chars)
        .map(|(byte_idx, _)| &text[..byte_idx])
}
