//! Memory log repository contract and SQLite implementation.
//!
//! # Invariants
//! - Lists and searches are ordered newest first (`timestamp DESC, id DESC`).
//! - Search is a case-insensitive substring match on title or content.

use super::{ensure_tables, now_epoch_ms, RepoResult};
use crate::model::memory::{MemoryId, MemoryLog};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const MEMORY_SELECT_SQL: &str = "SELECT id, title, content, timestamp FROM memory_logs";

/// Repository interface for memory log entries.
pub trait MemoryRepository {
    fn create_memory(&self, title: &str, content: &str) -> RepoResult<MemoryId>;
    fn get_memory(&self, id: MemoryId) -> RepoResult<Option<MemoryLog>>;
    fn list_memories(&self, limit: Option<u32>) -> RepoResult<Vec<MemoryLog>>;
    /// Entries whose title or content contains `needle`, ignoring case.
    fn search_memories(&self, needle: &str, limit: u32) -> RepoResult<Vec<MemoryLog>>;
}

/// SQLite-backed memory log repository.
pub struct SqliteMemoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemoryRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["memory_logs"])?;
        Ok(Self { conn })
    }
}

impl MemoryRepository for SqliteMemoryRepository<'_> {
    fn create_memory(&self, title: &str, content: &str) -> RepoResult<MemoryId> {
        self.conn.execute(
            "INSERT INTO memory_logs (title, content, timestamp) VALUES (?1, ?2, ?3);",
            params![title, content, now_epoch_ms()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_memory(&self, id: MemoryId) -> RepoResult<Option<MemoryLog>> {
        let memory = self
            .conn
            .query_row(
                &format!("{MEMORY_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_memory_row,
            )
            .optional()?;
        Ok(memory)
    }

    fn list_memories(&self, limit: Option<u32>) -> RepoResult<Vec<MemoryLog>> {
        let mut sql = format!("{MEMORY_SELECT_SQL} ORDER BY timestamp DESC, id DESC");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let memories = stmt
            .query_map(params_from_iter(bind_values), parse_memory_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(memories)
    }

    fn search_memories(&self, needle: &str, limit: u32) -> RepoResult<Vec<MemoryLog>> {
        // instr() keeps `%` and `_` in the needle literal.
        let mut stmt = self.conn.prepare(&format!(
            "{MEMORY_SELECT_SQL}
             WHERE instr(lower(title), lower(?1)) > 0
                OR instr(lower(content), lower(?1)) > 0
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2;"
        ))?;
        let memories = stmt
            .query_map(params![needle, i64::from(limit)], parse_memory_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(memories)
    }
}

fn parse_memory_row(row: &Row<'_>) -> rusqlite::Result<MemoryLog> {
    Ok(MemoryLog {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        timestamp: row.get("timestamp")?,
    })
}
