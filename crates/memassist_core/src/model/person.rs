//! Person record stored alongside (but independent of) the face registry.

use serde::{Deserialize, Serialize};

pub type PersonId = i64;

/// Relation stored when the caller leaves it blank.
pub const DEFAULT_RELATION: &str = "Unknown";

/// A registered person as persisted in the `people` table.
///
/// `name` is the display key shared with the face registry. Several rows may
/// carry the same name; they share one stored face vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub relation: String,
    pub description: String,
    /// File name of the stored photo inside the uploads directory.
    pub photo_path: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// Normalized insert payload for a person row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    pub name: String,
    pub relation: String,
    pub description: String,
    pub photo_path: String,
}

impl NewPerson {
    /// Builds an insert payload, trimming text and defaulting a blank relation.
    ///
    /// Returns `None` when the trimmed name is empty.
    pub fn normalized(
        name: &str,
        relation: &str,
        description: &str,
        photo_path: impl Into<String>,
    ) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let relation = match relation.trim() {
            "" => DEFAULT_RELATION,
            value => value,
        };
        Some(Self {
            name: name.to_string(),
            relation: relation.to_string(),
            description: description.trim().to_string(),
            photo_path: photo_path.into(),
        })
    }
}
