//! Free-text memory log entries queried by the chatbot.

use serde::{Deserialize, Serialize};

pub type MemoryId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLog {
    pub id: MemoryId,
    pub title: String,
    pub content: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}
