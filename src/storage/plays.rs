use std::time::SystemTime;

use anyhow::anyhow;
use rusqlite::{OptionalExtension, params};

use crate::{
    config,
    storage::{
        db::{self, SecondsSinceUnix, system_time_to_i64},
        error::StorageError,
        schema::{columns, tables},
    },
};

use columns::*;
use tables::*;

/// Ranking entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayCount {
    pub title: String,
    pub plays: u64,
}

/// Durable per-title play counters.
///
/// Counters only ever go up, by one per recorded play. A retried increment
/// counts twice; nothing here deduplicates.
pub trait PlayCountStore {
    /// Records one play and returns the new count.
    fn increment(&mut self, title: &str) -> Result<u64, StorageError>;

    /// Current count, 0 for titles never played.
    fn get(&mut self, title: &str) -> Result<u64, StorageError>;

    /// The `n` most played titles, most played first, ties by title.
    fn top(&mut self, n: usize) -> Result<Vec<PlayCount>, StorageError>;
}

/// Play counts kept in the SQLite database
pub struct Storage {
    pub(crate) db: rusqlite::Connection,
}

fn to_count(value: i64) -> Result<u64, StorageError> {
    u64::try_from(value)
        .map_err(|e| StorageError::Internal(anyhow!("negative play count {value}: {e}")))
}

impl Storage {
    /// when called, opens a data base connection
    pub fn new(db_config: &config::Database) -> Result<Self, StorageError> {
        let db = db::open(db_config)?;
        Ok(Self::from_existing_conn(db))
    }

    pub fn from_existing_conn(db: rusqlite::Connection) -> Self {
        Self { db }
    }

    fn increment_at(&mut self, title: &str, time: SystemTime) -> Result<u64, StorageError> {
        let time_secs = system_time_to_i64(time).map_err(StorageError::Internal)?;

        let plays: i64 = self.db.query_row(
            &format!(
                "INSERT INTO {PLAY_COUNTS} ({TITLE}, {PLAYS}, {LAST_PLAYED_AT}) VALUES (?1, 1, ?2)
                 ON CONFLICT({TITLE}) DO UPDATE SET
                    {PLAYS} = {PLAYS} + 1,
                    {LAST_PLAYED_AT} = excluded.{LAST_PLAYED_AT}
                 RETURNING {PLAYS}"
            ),
            params![title, time_secs],
            |row| row.get(0),
        )?;

        to_count(plays)
    }

    /// when the title was last played, if ever
    pub fn last_played_at(&mut self, title: &str) -> Result<Option<SecondsSinceUnix>, StorageError> {
        let last: Option<Option<SecondsSinceUnix>> = self
            .db
            .query_row(
                &format!("SELECT {LAST_PLAYED_AT} FROM {PLAY_COUNTS} WHERE {TITLE} = ?1"),
                params![title],
                |row| row.get(0),
            )
            .optional()?;
        Ok(last.flatten())
    }
}

impl PlayCountStore for Storage {
    fn increment(&mut self, title: &str) -> Result<u64, StorageError> {
        self.increment_at(title, SystemTime::now())
    }

    fn get(&mut self, title: &str) -> Result<u64, StorageError> {
        let plays: Option<i64> = self
            .db
            .query_row(
                &format!("SELECT {PLAYS} FROM {PLAY_COUNTS} WHERE {TITLE} = ?1"),
                params![title],
                |row| row.get(0),
            )
            .optional()?;

        plays.map(to_count).transpose().map(Option::unwrap_or_default)
    }

    fn top(&mut self, n: usize) -> Result<Vec<PlayCount>, StorageError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);

        let mut stmt = self.db.prepare(&format!(
            "SELECT {TITLE}, {PLAYS} FROM {PLAY_COUNTS}
             ORDER BY {PLAYS} DESC, {TITLE} ASC
             LIMIT ?1"
        ))?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(title, plays)| {
                Ok(PlayCount {
                    title,
                    plays: to_count(plays)?,
                })
            })
            .collect()
    }
}
