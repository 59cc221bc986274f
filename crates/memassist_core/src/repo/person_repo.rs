//! Person repository contract and SQLite implementation.
//!
//! # Invariants
//! - Names are not unique at storage level.
//! - Lists are ordered newest first (`created_at DESC, id DESC`).

use super::{ensure_tables, now_epoch_ms, RepoError, RepoResult};
use crate::model::person::{NewPerson, Person, PersonId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PERSON_COLUMNS: &str = "id, name, relation, description, photo_path, created_at";

/// Repository interface for person records.
pub trait PersonRepository {
    fn create_person(&self, person: &NewPerson) -> RepoResult<PersonId>;
    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>>;
    fn list_people(&self) -> RepoResult<Vec<Person>>;
    /// Oldest row carrying exactly `name`.
    fn find_first_by_name(&self, name: &str) -> RepoResult<Option<Person>>;
    fn count_by_name(&self, name: &str) -> RepoResult<u32>;
    /// Deletes one row and returns it; `NotFound` when absent.
    fn delete_person(&self, id: PersonId) -> RepoResult<Person>;
}

/// SQLite-backed person repository.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["people"])?;
        Ok(Self { conn })
    }
}

impl PersonRepository for SqlitePersonRepository<'_> {
    fn create_person(&self, person: &NewPerson) -> RepoResult<PersonId> {
        self.conn.execute(
            "INSERT INTO people (name, relation, description, photo_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                person.name.as_str(),
                person.relation.as_str(),
                person.description.as_str(),
                person.photo_path.as_str(),
                now_epoch_ms(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        let person = self
            .conn
            .query_row(
                &format!("SELECT {PERSON_COLUMNS} FROM people WHERE id = ?1;"),
                [id],
                parse_person_row,
            )
            .optional()?;
        Ok(person)
    }

    fn list_people(&self) -> RepoResult<Vec<Person>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PERSON_COLUMNS} FROM people ORDER BY created_at DESC, id DESC;"
        ))?;
        let people = stmt
            .query_map([], parse_person_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(people)
    }

    fn find_first_by_name(&self, name: &str) -> RepoResult<Option<Person>> {
        let person = self
            .conn
            .query_row(
                &format!(
                    "SELECT {PERSON_COLUMNS} FROM people
                     WHERE name = ?1
                     ORDER BY id ASC
                     LIMIT 1;"
                ),
                [name],
                parse_person_row,
            )
            .optional()?;
        Ok(person)
    }

    fn count_by_name(&self, name: &str) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM people WHERE name = ?1;",
            [name],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn delete_person(&self, id: PersonId) -> RepoResult<Person> {
        self.conn
            .query_row(
                &format!("DELETE FROM people WHERE id = ?1 RETURNING {PERSON_COLUMNS};"),
                [id],
                parse_person_row,
            )
            .optional()?
            .ok_or(RepoError::NotFound {
                entity: "person",
                id,
            })
    }
}

fn parse_person_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get("id")?,
        name: row.get("name")?,
        relation: row.get("relation")?,
        description: row.get("description")?,
        photo_path: row.get("photo_path")?,
        created_at: row.get("created_at")?,
    })
}
