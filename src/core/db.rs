use crate::core::error::AgoraError;
use crate::core::schemas;
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, AgoraError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(AgoraError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(AgoraError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(AgoraError::RusqliteError)?;
    Ok(conn)
}

pub fn board_db_path(root: &Path) -> PathBuf {
    root.join(schemas::BOARD_DB_NAME)
}

/// Idempotent schema bootstrap. Runs every DDL statement (all are
/// IF NOT EXISTS) and records the schema version in `meta`.
pub fn ensure_schema(conn: &Connection) -> Result<(), AgoraError> {
    conn.execute(schemas::BOARD_DB_SCHEMA_META, [])?;

    let current: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(AgoraError::RusqliteError)?;

    let current_version: u32 = current
        .as_deref()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);

    if current_version >= schemas::BOARD_SCHEMA_VERSION {
        return Ok(());
    }

    for ddl in schemas::BOARD_DB_SCHEMA_ALL {
        conn.execute(ddl, [])?;
    }

    conn.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [schemas::BOARD_SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub fn initialize_board_db(root: &Path) -> Result<(), AgoraError> {
    let db_path = board_db_path(root);
    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).map_err(AgoraError::IoError)?;
    }

    let conn = db_connect(&db_path.to_string_lossy())?;
    ensure_schema(&conn)?;
    Ok(())
}
