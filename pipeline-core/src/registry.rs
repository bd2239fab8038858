//! SQLite-backed set of tracked locations.
//!
//! The registry lives in a single table with a UNIQUE column, so duplicate
//! inserts are rejected by the storage engine itself rather than by a
//! check-then-insert in application code.

use rusqlite::{Connection, ErrorCode, params};
use std::{path::Path, sync::Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{PipelineError, Result},
    model::Location,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS weather_location (
    postcode TEXT NOT NULL UNIQUE
);";

/// Durable set of locations, opened once per process.
///
/// The mutex only makes the connection shareable across tasks; write
/// serialization comes from SQLite's own transactions.
#[derive(Debug)]
pub struct LocationRegistry {
    conn: Mutex<Connection>,
}

impl LocationRegistry {
    /// Open (or create) the registry database at `path`.
    ///
    /// Uses WAL journal mode so other processes can read while this one writes.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::Configuration(format!(
                    "failed to create registry directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!(path = %path.display(), "opened location registry");
        Self::init(conn)
    }

    /// A registry that lives only as long as the returned value.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        // SQLite state is transactional; a poisoned guard still holds a usable connection.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert `location`. Fails with [`PipelineError::DuplicateLocation`] if it
    /// is already tracked.
    pub fn add(&self, location: &Location) -> Result<()> {
        let inserted = self.conn().execute(
            "INSERT INTO weather_location (postcode) VALUES (?1)",
            params![location.as_str()],
        );

        match inserted {
            Ok(_) => {
                info!(%location, "location added");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(PipelineError::DuplicateLocation(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete `location`. Removing an untracked location is a no-op; the
    /// return value tells whether a row was deleted.
    pub fn remove(&self, location: &Location) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM weather_location WHERE postcode = ?1",
            params![location.as_str()],
        )?;

        if deleted > 0 {
            info!(%location, "location removed");
        } else {
            debug!(%location, "location was not registered");
        }
        Ok(deleted > 0)
    }

    /// All tracked locations in insertion order. Rows that are not valid
    /// locations are skipped with a warning.
    pub fn list(&self) -> Result<Vec<Location>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT postcode FROM weather_location ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut locations = Vec::new();
        for row in rows {
            let raw = row?;
            // `add` only stores validated locations; anything else was written by hand.
            match Location::new(&raw) {
                Ok(location) => locations.push(location),
                Err(e) => warn!(entry = %raw, error = %e, "skipping invalid registry entry"),
            }
        }

        debug!(count = locations.len(), "locations retrieved");
        Ok(locations)
    }
}
