//! Prompt templates and prompt assembly.
//!
//! A [`Prompt`] is what the chat session hands to the model provider: a
//! system message (instructions with the retrieved context substituted in),
//! the memory window of earlier turns, and the new user message.

use serde::Serialize;

use crate::models::{ScoredChunk, Turn};

/// Placeholder replaced with the rendered retrieval context.
pub const CONTEXT_PLACEHOLDER: &str = "{context_str}";
/// Placeholder replaced with the configured corpus topic.
pub const TOPIC_PLACEHOLDER: &str = "{topic}";

const DEFAULT_CONTEXT_TEMPLATE: &str = "You are a chatbot, able to have normal interactions, \
as well as talk about {topic}.\n\
Here are the relevant documents for the context:\n\n\
{context_str}\n\n\
Instruction: Use the previous chat history, or the context above, to interact and help the user.";

const CONDENSE_INSTRUCTIONS: &str = "Given the following conversation between a user and an AI \
assistant and a follow up question from the user, rephrase the follow up question to be a \
standalone question that keeps every detail needed to search the documents.";

/// One message in the wire shape chat APIs expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// A fully assembled request for a chat completion.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub system: Option<String>,
    pub history: Vec<Turn>,
    pub user: String,
}

impl Prompt {
    /// Flatten into `system`, history, then `user` messages.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.history.len() + 2);
        if let Some(system) = &self.system {
            out.push(ChatMessage::new("system", system.clone()));
        }
        for turn in &self.history {
            out.push(ChatMessage::new(turn.role.as_str(), turn.text.clone()));
        }
        out.push(ChatMessage::new("user", self.user.clone()));
        out
    }

    /// Approximate size in characters, for logging.
    pub fn char_len(&self) -> usize {
        self.system.as_ref().map(|s| s.len()).unwrap_or(0)
            + self.history.iter().map(|t| t.text.len()).sum::<usize>()
            + self.user.len()
    }
}

/// System instructions used to ground answers in retrieved context.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    context_template: String,
}

impl PromptTemplates {
    /// Default instructions about `topic`.
    pub fn for_topic(topic: &str) -> Self {
        Self {
            context_template: DEFAULT_CONTEXT_TEMPLATE.replace(TOPIC_PLACEHOLDER, topic),
        }
    }

    /// Custom instructions. A template without `{context_str}` gets the
    /// context appended after a blank line.
    pub fn with_context_template(template: impl Into<String>) -> Self {
        let mut context_template = template.into();
        if !context_template.contains(CONTEXT_PLACEHOLDER) {
            context_template.push_str("\n\n");
            context_template.push_str(CONTEXT_PLACEHOLDER);
        }
        Self { context_template }
    }

    /// Build the answer prompt from retrieved context, memory and the new message.
    pub fn compose(&self, context_str: &str, memory: &[Turn], user_text: &str) -> Prompt {
        Prompt {
            system: Some(self.context_template.replace(CONTEXT_PLACEHOLDER, context_str)),
            history: memory.to_vec(),
            user: user_text.to_string(),
        }
    }

    /// Build the prompt that rewrites a follow-up into a standalone question.
    pub fn condense(&self, memory: &[Turn], user_text: &str) -> Prompt {
        let chat_history = memory
            .iter()
            .map(|t| format!("{}: {}", t.role, t.text))
            .collect::<Vec<_>>()
            .join("\n");
        Prompt {
            system: None,
            history: Vec::new(),
            user: format!(
                "{}\n\nChat History:\n{}\nFollow Up Input: {}\nStandalone question:",
                CONDENSE_INSTRUCTIONS, chat_history, user_text
            ),
        }
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::for_topic("the documents in the corpus")
    }
}

/// Render retrieved chunks into the `context_str` block, in the order given.
pub fn render_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|sc| format!("source: {}\n\n{}", sc.chunk.source, sc.chunk.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
