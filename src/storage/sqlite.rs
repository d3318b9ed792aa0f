//! SQLite series store.
//!
//! Layout of a store file:
//!
//! ```sql
//! CREATE TABLE CONFIGURATION (
//!     id          VARCHAR(16) PRIMARY KEY,
//!     description VARCHAR(255),
//!     type        INTEGER,
//!     table_name  VARCHAR(255)
//! );
//! -- one per counter, e.g. RAW_1_7_0
//! CREATE TABLE <table_name> (timestamp INTEGER, value DOUBLE, unit VARCHAR(16));
//! ```

use crate::counter::{CounterSpec, CounterType};
use crate::error::MeterError;
use crate::storage::{SeriesPoint, SeriesStore};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a connection waits for a lock held by another process.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteStore {
    /// Creates a new store at `path` holding one table per counter.
    ///
    /// An existing file is only replaced when `force` is set. If the schema
    /// cannot be created the partially written file is removed again.
    pub fn create(
        path: impl AsRef<Path>,
        force: bool,
        counters: &[CounterSpec],
    ) -> Result<Self, MeterError> {
        let path = path.as_ref();

        if path.exists() {
            if !force {
                return Err(MeterError::Storage(format!(
                    "Database {} already exists, not overwriting",
                    path.display()
                )));
            }
            warn!("Overwriting existing database {}", path.display());
            remove_database_files(path)?;
        }

        let mut conn = Connection::open(path)?;

        // Write-ahead logging lets readers run alongside the daemon
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        apply_connection_settings(&conn)?;

        if let Err(e) = create_schema(&mut conn, counters) {
            drop(conn);
            if let Err(rm) = remove_database_files(path) {
                warn!("Failed to remove incomplete database {}: {rm}", path.display());
            }
            return Err(e);
        }

        info!(
            "Created database {} with {} counter table(s)",
            path.display(),
            counters.len()
        );

        Ok(SqliteStore {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Opens an existing store for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MeterError> {
        Self::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Opens an existing store for reading only.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, MeterError> {
        Self::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn open_with_flags(path: &Path, flags: OpenFlags) -> Result<Self, MeterError> {
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            MeterError::Storage(format!("Failed to open database {}: {e}", path.display()))
        })?;

        apply_connection_settings(&conn)?;
        debug!("Opened database {}", path.display());

        Ok(SqliteStore {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Counters listed in the `CONFIGURATION` table.
    pub fn counters(&self) -> Result<Vec<CounterSpec>, MeterError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, description, type, table_name FROM CONFIGURATION ORDER BY rowid")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut specs = Vec::new();
        for row in rows {
            let (id, description, code, table_name) = row?;
            let counter_type = CounterType::from_code(code).ok_or_else(|| {
                MeterError::Storage(format!("Unknown counter type {code} for counter {id}"))
            })?;
            specs.push(CounterSpec {
                id,
                description: description.unwrap_or_default(),
                counter_type,
                table_name,
            });
        }

        Ok(specs)
    }

    /// Table holding the points of `counter_id`.
    pub fn table_for(&self, counter_id: &str) -> Result<String, MeterError> {
        let table: Option<String> = self
            .conn
            .query_row(
                "SELECT table_name FROM CONFIGURATION WHERE id = ?1",
                params![counter_id],
                |row| row.get(0),
            )
            .optional()?;

        table.ok_or_else(|| {
            MeterError::Storage(format!(
                "Counter {counter_id} is not present in {}",
                self.path.display()
            ))
        })
    }
}

impl SeriesStore for SqliteStore {
    fn record(&self, table: &str, timestamp: i64, value: f64, unit: &str) -> Result<(), MeterError> {
        validate_table_name(table)?;

        let sql = format!("INSERT INTO {table} (timestamp, value, unit) VALUES (?1, ?2, ?3)");
        self.conn
            .prepare_cached(&sql)?
            .execute(params![timestamp, value, unit])?;

        Ok(())
    }

    fn query(&self, counter_id: &str, since: i64) -> Result<Vec<SeriesPoint>, MeterError> {
        let table = self.table_for(counter_id)?;
        validate_table_name(&table)?;

        let sql = format!(
            "SELECT timestamp, value, unit FROM {table} WHERE timestamp >= ?1 ORDER BY timestamp"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let points = stmt
            .query_map(params![since], |row| {
                Ok(SeriesPoint {
                    timestamp: row.get(0)?,
                    value: row.get(1)?,
                    unit: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(points)
    }
}

fn apply_connection_settings(conn: &Connection) -> Result<(), MeterError> {
    conn.busy_timeout(BUSY_TIMEOUT)?;

    // Losing the last few points on power failure is acceptable
    if let Err(e) = conn.execute_batch("PRAGMA synchronous=OFF;") {
        warn!("Failed to turn off direct disk synchronisation ({e})");
    }

    Ok(())
}

fn create_schema(conn: &mut Connection, counters: &[CounterSpec]) -> Result<(), MeterError> {
    let tx = conn.transaction()?;

    tx.execute(
        "CREATE TABLE CONFIGURATION (
            id          VARCHAR(16) PRIMARY KEY,
            description VARCHAR(255),
            type        INTEGER,
            table_name  VARCHAR(255)
        )",
        [],
    )
    .map_err(|e| MeterError::Storage(format!("Failed to create configuration table ({e})")))?;

    for counter in counters {
        validate_table_name(&counter.table_name)?;

        tx.execute(
            "INSERT INTO CONFIGURATION (id, description, type, table_name) VALUES (?1, ?2, ?3, ?4)",
            params![
                counter.id,
                counter.description,
                counter.counter_type.as_code(),
                counter.table_name
            ],
        )
        .and_then(|_| {
            tx.execute(
                &format!(
                    "CREATE TABLE {} (timestamp INTEGER, value DOUBLE, unit VARCHAR(16))",
                    counter.table_name
                ),
                [],
            )
        })
        .map_err(|e| {
            MeterError::Storage(format!(
                "Failed to insert counter {} into CONFIGURATION table or create table {} ({e})",
                counter.id, counter.table_name
            ))
        })?;
    }

    tx.commit()?;
    Ok(())
}

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_]+` is accepted.
pub fn validate_table_name(table: &str) -> Result<(), MeterError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(MeterError::Storage(format!("Invalid table name '{table}'")))
    }
}

fn remove_database_files(path: &Path) -> Result<(), MeterError> {
    std::fs::remove_file(path)?;

    for suffix in ["-wal", "-shm"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        let side = PathBuf::from(side);
        if side.exists() {
            std::fs::remove_file(&side)?;
        }
    }

    Ok(())
}
