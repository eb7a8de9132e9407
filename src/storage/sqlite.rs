//! SQLite implementation of [`OccupancyStore`]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::repository::{OccupancyStore, RecordedOrder};
use super::{StorageError, StorageResult};
use crate::models::{
    Adjacency, BoardEntry, Entrant, Location, LocationId, Member, OccupancyEvent, UserId,
};

/// SQLite-backed store
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteOccupancyStore {
    conn: Mutex<Connection>,
}

impl SqliteOccupancyStore {
    /// Open or create a database file
    pub fn new(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory database (for testing)
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn create_schema(&self) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS locations (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    x REAL NOT NULL,
                    y REAL NOT NULL,
                    map TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS adjacency (
                    a TEXT NOT NULL,
                    b TEXT NOT NULL,
                    PRIMARY KEY (a, b)
                );

                CREATE TABLE IF NOT EXISTS checks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    location TEXT NOT NULL,
                    user TEXT NOT NULL,
                    guest TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_checks_location_user
                    ON checks(location, user);

                CREATE INDEX IF NOT EXISTS idx_checks_user
                    ON checks(user);

                CREATE TABLE IF NOT EXISTS members (
                    user TEXT PRIMARY KEY,
                    contact TEXT,
                    priority INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS entrants (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    user TEXT NOT NULL UNIQUE,
                    entered_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS draws (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    draw_id TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL,
                    current_position INTEGER,
                    finished_at TEXT
                );

                CREATE TABLE IF NOT EXISTS draw_entrants (
                    draw_seq INTEGER NOT NULL,
                    position INTEGER NOT NULL,
                    user TEXT NOT NULL,
                    PRIMARY KEY (draw_seq, position)
                );
                "#,
        )?;

        // Databases created before turn positions were tracked
        ensure_column(&conn, "draws", "current_position", "INTEGER")?;
        ensure_column(&conn, "draws", "finished_at", "TEXT")?;

        Ok(())
    }
}

fn ensure_column(conn: &Connection, table: &str, column: &str, kind: &str) -> StorageResult<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;

    if !columns.iter().any(|c| c == column) {
        conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {kind}"))?;
        tracing::info!(table, column, "Added missing column");
    }
    Ok(())
}

fn parse_time(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("timestamp '{raw}': {e}")))
}

fn parse_location(raw: String) -> StorageResult<LocationId> {
    LocationId::parse(&raw).ok_or_else(|| StorageError::Corrupt("empty location id".to_string()))
}

fn parse_user(raw: String) -> StorageResult<UserId> {
    UserId::parse(&raw).ok_or_else(|| StorageError::Corrupt("empty user id".to_string()))
}

impl OccupancyStore for SqliteOccupancyStore {
    fn locations(&self) -> StorageResult<Vec<Location>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, x, y, map FROM locations ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, x, y, map)| {
                Ok(Location {
                    id: parse_location(id)?,
                    name,
                    point: (x, y),
                    map,
                })
            })
            .collect()
    }

    fn upsert_location(&self, location: &Location) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
                INSERT INTO locations (id, name, x, y, map)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    x = excluded.x,
                    y = excluded.y,
                    map = excluded.map
                "#,
            params![
                location.id.as_str(),
                location.name,
                location.point.0,
                location.point.1,
                location.map
            ],
        )?;
        Ok(())
    }

    fn add_adjacency(&self, edge: &Adjacency) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO adjacency (a, b) VALUES (?1, ?2)",
            params![edge.a.as_str(), edge.b.as_str()],
        )?;
        Ok(())
    }

    fn adjacency_exists(&self, a: &LocationId, b: &LocationId) -> StorageResult<bool> {
        let Some(edge) = Adjacency::new(a.clone(), b.clone()) else {
            return Ok(false);
        };
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM adjacency WHERE a = ?1 AND b = ?2)",
            params![edge.a.as_str(), edge.b.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn adjacent_locations(&self, location: &LocationId) -> StorageResult<Vec<LocationId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT b FROM adjacency WHERE a = ?1
                UNION
                SELECT a FROM adjacency WHERE b = ?1
                ORDER BY 1
                "#,
        )?;
        let rows = stmt
            .query_map(params![location.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(parse_location).collect()
    }

    fn record_event(&self, event: &OccupancyEvent) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO checks (location, user, guest, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.location.as_str(),
                event.user.as_str(),
                event.guest,
                event.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn event_count(&self, user: &UserId, location: &LocationId) -> StorageResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM checks WHERE user = ?1 AND location = ?2",
            params![user.as_str(), location.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn occupants_excluding(
        &self,
        location: &LocationId,
        excluding: &UserId,
    ) -> StorageResult<Vec<UserId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT user FROM checks
                WHERE location = ?1 AND user != ?2
                GROUP BY user
                HAVING COUNT(*) % 2 = 1
                ORDER BY user
                "#,
        )?;
        let rows = stmt
            .query_map(params![location.as_str(), excluding.as_str()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(parse_user).collect()
    }

    fn locations_occupied_by(
        &self,
        user: &UserId,
        excluding: Option<&LocationId>,
    ) -> StorageResult<Vec<LocationId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT location FROM checks
                WHERE user = ?1 AND (?2 IS NULL OR location != ?2)
                GROUP BY location
                HAVING COUNT(*) % 2 = 1
                ORDER BY location
                "#,
        )?;
        let rows = stmt
            .query_map(
                params![user.as_str(), excluding.map(LocationId::as_str)],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(parse_location).collect()
    }

    fn event_times(
        &self,
        user: &UserId,
        location: &LocationId,
    ) -> StorageResult<Vec<DateTime<Utc>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT created_at FROM checks WHERE user = ?1 AND location = ?2 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![user.as_str(), location.as_str()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter().map(|raw| parse_time(raw)).collect()
    }

    fn open_sessions(&self) -> StorageResult<Vec<BoardEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT checks.location, checks.user, checks.guest, checks.created_at
                FROM (
                    SELECT MAX(id) AS id FROM checks
                    GROUP BY user, location
                    HAVING COUNT(*) % 2 = 1
                ) AS open
                JOIN checks ON checks.id = open.id
                ORDER BY checks.location, checks.user
                "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(location, user, guest, since)| {
                Ok(BoardEntry {
                    location: parse_location(location)?,
                    occupant: parse_user(user)?,
                    guest,
                    since: parse_time(&since)?,
                })
            })
            .collect()
    }

    fn upsert_member(&self, member: &Member) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
                INSERT INTO members (user, contact, priority)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user) DO UPDATE SET
                    contact = excluded.contact,
                    priority = excluded.priority
                "#,
            params![member.user.as_str(), member.contact, member.priority],
        )?;
        Ok(())
    }

    fn member(&self, user: &UserId) -> StorageResult<Option<Member>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT contact, priority FROM members WHERE user = ?1",
                params![user.as_str()],
                |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;

        Ok(row.map(|(contact, priority)| Member {
            user: user.clone(),
            contact,
            priority,
        }))
    }

    fn entrants(&self) -> StorageResult<Vec<Entrant>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
                SELECT entrants.user, members.contact, COALESCE(members.priority, 0)
                FROM entrants
                LEFT JOIN members ON members.user = entrants.user
                ORDER BY entrants.seq
                "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, bool>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(user, contact, priority)| {
                Ok(Entrant {
                    user: parse_user(user)?,
                    contact,
                    priority,
                })
            })
            .collect()
    }

    fn is_entrant(&self, user: &UserId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entrants WHERE user = ?1)",
            params![user.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn add_entrant(&self, user: &UserId) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO entrants (user, entered_at) VALUES (?1, ?2)",
            params![user.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_entrant(&self, user: &UserId) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM entrants WHERE user = ?1", params![user.as_str()])?;
        Ok(())
    }

    fn consume_entrants_into_order(
        &self,
        draw_id: &Uuid,
        order: &[UserId],
    ) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO draws (draw_id, created_at) VALUES (?1, ?2)",
            params![draw_id.to_string(), Utc::now().to_rfc3339()],
        )?;
        let draw_seq = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO draw_entrants (draw_seq, position, user) VALUES (?1, ?2, ?3)",
            )?;
            for (position, user) in order.iter().enumerate() {
                stmt.execute(params![draw_seq, position as i64, user.as_str()])?;
            }
        }

        tx.execute("DELETE FROM entrants", [])?;
        tx.commit()?;
        Ok(())
    }

    fn record_draw_position(
        &self,
        draw_id: &Uuid,
        position: Option<usize>,
    ) -> StorageResult<()> {
        let conn = self.conn()?;
        let updated = match position {
            Some(index) => conn.execute(
                "UPDATE draws SET current_position = ?2 WHERE draw_id = ?1",
                params![draw_id.to_string(), index as i64],
            )?,
            None => conn.execute(
                "UPDATE draws SET finished_at = ?2 WHERE draw_id = ?1",
                params![draw_id.to_string(), Utc::now().to_rfc3339()],
            )?,
        };

        if updated == 0 {
            return Err(StorageError::Corrupt(format!("unknown draw id {draw_id}")));
        }
        Ok(())
    }

    fn last_entrant_order(&self) -> StorageResult<Option<RecordedOrder>> {
        let conn = self.conn()?;
        let draw = conn
            .query_row(
                r#"
                    SELECT seq, draw_id, created_at, current_position, finished_at
                    FROM draws ORDER BY seq DESC LIMIT 1
                    "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((seq, draw_id, created_at, current_position, finished_at)) = draw else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT user FROM draw_entrants WHERE draw_seq = ?1 ORDER BY position",
        )?;
        let users = stmt
            .query_map(params![seq], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(RecordedOrder {
            draw_id: Uuid::parse_str(&draw_id)
                .map_err(|e| StorageError::Corrupt(format!("draw id '{draw_id}': {e}")))?,
            order: users
                .into_iter()
                .map(parse_user)
                .collect::<StorageResult<_>>()?,
            created_at: parse_time(&created_at)?,
            current_position: current_position.map(|p| p as usize),
            finished_at: finished_at.as_deref().map(parse_time).transpose()?,
        }))
    }
}
