//! SQLite-backed marker store.
//!
//! Markers live in `<data_dir>/markers.db`. The connection sits behind a
//! mutex so the store can be shared between the engine worker and the
//! marker-creation debouncer.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{data_dir, migrations, MarkerStore};
use crate::error::{ConfigError, Result, StoreError};
use crate::geo::Coordinate;
use crate::marker::{Marker, MarkerId};

pub struct SqliteMarkerStore {
    conn: Mutex<Connection>,
}

impl SqliteMarkerStore {
    /// Open the default database at `~/.config/markerwatch/markers.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened,
    /// or if migration fails.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(&Self::default_path()?)?)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("markers.db"))
    }

    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        conn.pragma_update(None, "journal_mode", "wal")?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM markers", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn row_to_marker(row: &rusqlite::Row<'_>) -> rusqlite::Result<Marker> {
    Ok(Marker {
        id: MarkerId(row.get(0)?),
        coordinate: Coordinate::new(row.get(1)?, row.get(2)?),
    })
}

impl MarkerStore for SqliteMarkerStore {
    fn snapshot(&self) -> Result<Vec<Marker>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, latitude, longitude FROM markers ORDER BY created_at DESC, id DESC",
        )?;
        let markers = stmt
            .query_map([], row_to_marker)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(markers)
    }

    fn add(&self, coordinate: Coordinate) -> Result<MarkerId, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO markers (latitude, longitude, created_at) VALUES (?1, ?2, ?3)",
            params![coordinate.latitude, coordinate.longitude, Utc::now().to_rfc3339()],
        )?;
        let id = MarkerId(conn.last_insert_rowid());
        debug!(marker_id = %id, "marker added");
        Ok(id)
    }

    fn delete(&self, id: MarkerId) -> Result<bool, StoreError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM markers WHERE id = ?1", params![id.0])?;
        debug!(marker_id = %id, removed, "marker delete");
        Ok(removed > 0)
    }

    fn get(&self, id: MarkerId) -> Result<Option<Marker>, StoreError> {
        let marker = self
            .conn()?
            .query_row(
                "SELECT id, latitude, longitude FROM markers WHERE id = ?1",
                params![id.0],
                row_to_marker,
            )
            .optional()?;
        Ok(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_snapshot_newest_first() {
        let store = SqliteMarkerStore::open_in_memory().unwrap();
        let a = store.add(Coordinate::new(58.01, 56.25)).unwrap();
        let b = store.add(Coordinate::new(58.02, 56.26)).unwrap();

        let markers = store.snapshot().unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].id, b);
        assert_eq!(markers[1].id, a);
        assert_eq!(markers[1].coordinate, Coordinate::new(58.01, 56.25));
    }

    #[test]
    fn delete_reports_whether_marker_existed() {
        let store = SqliteMarkerStore::open_in_memory().unwrap();
        let id = store.add(Coordinate::new(0.0, 0.0)).unwrap();
        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let store = SqliteMarkerStore::open_in_memory().unwrap();
        let first = store.add(Coordinate::new(0.0, 0.0)).unwrap();
        store.delete(first).unwrap();
        let second = store.add(Coordinate::new(0.0, 0.0)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn get_finds_single_marker() {
        let store = SqliteMarkerStore::open_in_memory().unwrap();
        let id = store.add(Coordinate::new(1.0, 2.0)).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().coordinate, Coordinate::new(1.0, 2.0));
        assert!(store.get(MarkerId(999)).unwrap().is_none());
    }

    #[test]
    fn file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.db");
        {
            let store = SqliteMarkerStore::open(&path).unwrap();
            store.add(Coordinate::new(10.0, 20.0)).unwrap();
        }
        let store = SqliteMarkerStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
