//! SQLite session table, one JSON record per identifier

use super::{SessionMap, SessionStore, StoreError};
use crate::state_machine::Session;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    identifier TEXT PRIMARY KEY,
    record TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Thread-safe session database handle
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn read_all(&self) -> Result<SessionMap, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT identifier, record FROM sessions")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut sessions = SessionMap::new();
        for row in rows {
            let (identifier, record) = row?;
            match serde_json::from_str::<Session>(&record) {
                Ok(session) => {
                    sessions.insert(identifier, session);
                }
                Err(e) => {
                    tracing::warn!(identifier = %identifier, error = %e, "Skipping corrupt session row");
                }
            }
        }
        Ok(sessions)
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn load(&self) -> SessionMap {
        match self.read_all() {
            Ok(sessions) => {
                tracing::info!(count = sessions.len(), "Loaded sessions");
                sessions
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read session table, starting empty");
                SessionMap::new()
            }
        }
    }

    async fn save(&self, sessions: &SessionMap) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sessions", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sessions (identifier, record, updated_at) VALUES (?1, ?2, ?3)",
            )?;
            for (identifier, session) in sessions {
                let record = serde_json::to_string(session)?;
                stmt.execute(params![identifier, record, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
