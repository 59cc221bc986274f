//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist validated tasks together with their weekday tags.
//! - Toggle the completion flag, the only field mutable after creation.
//!
//! # Invariants
//! - A task row and its `task_repeat_days` rows are written in one
//!   transaction; a failure leaves no partial task visible.
//! - Weekday tags cascade-delete with their task.
//! - `version` is written once (default `1`) and never incremented here.

use super::{bool_to_int, ensure_tables, int_to_bool, now_epoch_ms, RepoError, RepoResult};
use crate::model::task::{
    NewTask, RepeatKind, Task, TaskId, Weekday, REMINDER_TIME_FORMAT, REPEAT_UNTIL_FORMAT,
};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, Row, TransactionBehavior};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    reminder_time,
    repeat_type,
    repeat_time,
    repeat_until,
    is_completed,
    created_at,
    version
FROM tasks";

/// Repository interface for reminder tasks.
pub trait TaskRepository {
    /// Inserts the task and its weekday tags atomically.
    fn create_task(&mut self, task: &NewTask) -> RepoResult<TaskId>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Lists tasks newest first.
    fn list_tasks(&self) -> RepoResult<Vec<Task>>;
    /// Sets `is_completed`; `NotFound` when the id does not exist.
    fn set_task_completion(&self, id: TaskId, completed: bool) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["tasks", "task_repeat_days"])?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&mut self, task: &NewTask) -> RepoResult<TaskId> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO tasks (
                name,
                description,
                reminder_time,
                repeat_type,
                repeat_time,
                repeat_until,
                is_completed,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7);",
            params![
                task.name.as_str(),
                task.description.as_deref(),
                task.reminder_time
                    .map(|time| time.format(REMINDER_TIME_FORMAT).to_string()),
                task.repeat_type.as_str(),
                task.repeat_time.as_deref(),
                task.repeat_until
                    .map(|date| date.format(REPEAT_UNTIL_FORMAT).to_string()),
                now_epoch_ms(),
            ],
        )?;
        let task_id = tx.last_insert_rowid();

        for day in &task.repeat_days {
            tx.execute(
                "INSERT INTO task_repeat_days (task_id, day_of_week) VALUES (?1, ?2);",
                params![task_id, day.as_str()],
            )?;
        }

        tx.commit()?;
        Ok(task_id)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self) -> RepoResult<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} ORDER BY created_at DESC, id DESC;"))?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(self.conn, row)?);
        }
        Ok(tasks)
    }

    fn set_task_completion(&self, id: TaskId, completed: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET is_completed = ?2 WHERE id = ?1;",
            params![id, bool_to_int(completed)],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "task", id });
        }
        Ok(())
    }
}

fn parse_task_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Task> {
    let id: TaskId = row.get("id")?;

    let repeat_text: String = row.get("repeat_type")?;
    let repeat_type = RepeatKind::parse(&repeat_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid repeat type `{repeat_text}` in tasks.repeat_type"
        ))
    })?;

    let reminder_time = match row.get::<_, Option<String>>("reminder_time")? {
        Some(value) => Some(
            NaiveTime::parse_from_str(&value, REMINDER_TIME_FORMAT).map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid reminder time `{value}` in tasks.reminder_time"
                ))
            })?,
        ),
        None => None,
    };

    let repeat_until = match row.get::<_, Option<String>>("repeat_until")? {
        Some(value) => Some(
            NaiveDate::parse_from_str(&value, REPEAT_UNTIL_FORMAT).map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid date `{value}` in tasks.repeat_until"
                ))
            })?,
        ),
        None => None,
    };

    Ok(Task {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        reminder_time,
        repeat_type,
        repeat_time: row.get("repeat_time")?,
        repeat_days: load_repeat_days(conn, id)?,
        repeat_until,
        is_completed: int_to_bool(row.get("is_completed")?, "tasks.is_completed")?,
        created_at: row.get("created_at")?,
        version: row.get("version")?,
    })
}

fn load_repeat_days(conn: &Connection, task_id: TaskId) -> RepoResult<Vec<Weekday>> {
    let mut stmt =
        conn.prepare("SELECT day_of_week FROM task_repeat_days WHERE task_id = ?1;")?;
    let mut rows = stmt.query([task_id])?;
    let mut days = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        let day = Weekday::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid weekday `{value}` in task_repeat_days.day_of_week"
            ))
        })?;
        days.push(day);
    }
    days.sort();
    Ok(days)
}
