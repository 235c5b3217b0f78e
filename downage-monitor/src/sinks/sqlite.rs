//! SQLite episode sink
//!
//! Schema:
//! - ping: one row per episode, updated in place while the outage lasts
//!
//! Start times are stored as RFC 3339 UTC text with nanosecond precision, so a
//! stored start time compares equal to the one the tracker holds. The latest
//! record is the last inserted row, whatever its start time.

use super::{ensure_same_episode, EpisodeSink, SinkError, SinkInfo};
use crate::models::Episode;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS ping (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        start_time TEXT NOT NULL,
        duration INTEGER NOT NULL,
        continuing INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_ping_start_time ON ping(start_time);
"#;

/// SQLite-backed episode store
pub struct SqliteSink {
    conn: Connection,
    location: String,
}

impl SqliteSink {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!("sqlite sink initialized at {:?}", path);

        Ok(Self {
            conn,
            location: path.display().to_string(),
        })
    }

    /// In-memory database (tests)
    pub fn open_in_memory() -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            location: ":memory:".to_string(),
        })
    }

    fn row_to_episode(
        id: i64,
        start_time: String,
        duration_ms: i64,
        continuing: bool,
    ) -> Result<Episode, SinkError> {
        Ok(Episode {
            id: Some(id),
            start_time: parse_timestamp(&start_time)?,
            duration_ms,
            continuing,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SinkError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| SinkError::InvalidTimestamp(raw.to_string()))
}

impl EpisodeSink for SqliteSink {
    fn append(&self, episode: &Episode) -> Result<(), SinkError> {
        self.conn.execute(
            "INSERT INTO ping (start_time, duration, continuing) VALUES (?1, ?2, ?3)",
            params![
                format_timestamp(&episode.start_time),
                episode.duration_ms,
                episode.continuing
            ],
        )?;
        debug!("inserted episode row {}", self.conn.last_insert_rowid());
        Ok(())
    }

    fn update_last(&self, episode: &Episode) -> Result<(), SinkError> {
        let last = self.last()?.ok_or(SinkError::NoEpisode)?;
        ensure_same_episode(&last, episode)?;

        let id = last.id.ok_or(SinkError::NoEpisode)?;
        self.conn.execute(
            "UPDATE ping SET duration = ?1, continuing = ?2 WHERE id = ?3",
            params![episode.duration_ms, episode.continuing, id],
        )?;
        Ok(())
    }

    fn dump_all(&self) -> Result<Vec<Episode>, SinkError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, start_time, duration, continuing FROM ping ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut episodes = Vec::new();
        for row in rows {
            let (id, start_time, duration_ms, continuing) = row?;
            episodes.push(Self::row_to_episode(id, start_time, duration_ms, continuing)?);
        }
        Ok(episodes)
    }

    fn info(&self) -> SinkInfo {
        SinkInfo {
            backend: "sqlite".to_string(),
            location: self.location.clone(),
        }
    }

    fn last(&self) -> Result<Option<Episode>, SinkError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, start_time, duration, continuing FROM ping
                 ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, bool>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, start_time, duration_ms, continuing)) => Ok(Some(Self::row_to_episode(
                id,
                start_time,
                duration_ms,
                continuing,
            )?)),
            None => Ok(None),
        }
    }
}
