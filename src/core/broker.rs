use crate::core::db;
use crate::core::error::AgoraError;
use crate::core::schemas;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The DB Broker is the thin waist for board-state access: every operation
/// goes through it, and every mutation leaves a line in the audit log.
pub struct DbBroker {
    db_path: PathBuf,
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            db_path: db::board_db_path(root),
            audit_log_path: root.join(schemas::BOARD_EVENTS_NAME),
        }
    }

    /// Execute a closure with an in-process-serialized connection. The
    /// closure gets `&mut Connection` so subsystems can open real SQLite
    /// transactions; cross-process serialization is the database's writer
    /// lock, this mutex only keeps one connection per process.
    pub fn with_conn<F, R>(&self, actor: &str, op_name: &str, f: F) -> Result<R, AgoraError>
    where
        F: FnOnce(&mut Connection) -> Result<R, AgoraError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut conn = db::db_connect(&self.db_path.to_string_lossy())?;
        db::ensure_schema(&conn)?;

        let result = f(&mut conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, op_name, status)?;

        result
    }

    fn log_event(&self, actor: &str, op: &str, status: &str) -> Result<(), AgoraError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: time::now_iso(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(AgoraError::IoError)?;

        let line = serde_json::to_string(&ev)
            .map_err(|e| AgoraError::ValidationError(format!("audit event encode: {e}")))?;
        writeln!(f, "{}", line).map_err(AgoraError::IoError)?;
        Ok(())
    }
}
