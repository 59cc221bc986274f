//! Rule-based memory chatbot.
//!
//! # Responsibility
//! - Answer canned greetings/help prompts.
//! - Otherwise summarize the newest memories matching the message text.
//!
//! # Invariants
//! - Canned prompts are checked in declaration order by substring.
//! - At most [`RELEVANT_MEMORY_LIMIT`] memories are summarized.
//! - Matching is plain substring search; there is no language model.

use crate::error::ErrorCategory;
use crate::repo::memory_repo::MemoryRepository;
use crate::repo::RepoError;
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const RELEVANT_MEMORY_LIMIT: u32 = 3;
const SNIPPET_CHARS: usize = 100;

pub const MEMORY_SUMMARY_HEADER: &str = "I found some relevant memories:\n";
pub const FALLBACK_RESPONSE: &str =
    "I couldn't find a specific memory for that. Could you be more specific?";

const CANNED_RESPONSES: &[(&str, &str)] = &[
    (
        "hello",
        "Hi there! How can I help you with your memories today?",
    ),
    (
        "help",
        "I can help you recall memories, find past tasks, or discuss people you know.",
    ),
    (
        "how are you",
        "I'm functioning well and ready to assist you with your memory needs!",
    ),
];

/// Chatbot error.
#[derive(Debug)]
pub enum ChatError {
    EmptyMessage,
    Repo(RepoError),
}

impl ChatError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyMessage => ErrorCategory::Validation,
            Self::Repo(_) => ErrorCategory::Persistence,
        }
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "message is required"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ChatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::EmptyMessage => None,
        }
    }
}

impl From<RepoError> for ChatError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Chatbot answering from the memory log.
pub struct MemoryChatbot<R: MemoryRepository> {
    repo: R,
}

impl<R: MemoryRepository> MemoryChatbot<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Produces a reply for `message`.
    pub fn respond(&self, message: &str) -> Result<String, ChatError> {
        let normalized = normalize_message(message);
        if normalized.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        if let Some(reply) = canned_response(&normalized) {
            debug!("event=chat_reply module=chat status=ok kind=canned");
            return Ok(reply.to_string());
        }

        let memories = self
            .repo
            .search_memories(&normalized, RELEVANT_MEMORY_LIMIT)?;
        info!(
            "event=chat_reply module=chat status=ok kind=memories hits={}",
            memories.len()
        );
        if memories.is_empty() {
            return Ok(FALLBACK_RESPONSE.to_string());
        }

        let mut summary = String::from(MEMORY_SUMMARY_HEADER);
        for memory in &memories {
            let snippet: String = memory.content.chars().take(SNIPPET_CHARS).collect();
            summary.push_str(&format!("- {}: {snippet}...\n", memory.title));
        }
        Ok(summary)
    }
}

/// Lower-cases and trims; internal whitespace is kept as typed.
pub fn normalize_message(message: &str) -> String {
    message.trim().to_lowercase()
}

/// First canned reply whose trigger occurs in `normalized`.
pub fn canned_response(normalized: &str) -> Option<&'static str> {
    CANNED_RESPONSES
        .iter()
        .find(|(trigger, _)| normalized.contains(trigger))
        .map(|(_, reply)| *reply)
}
