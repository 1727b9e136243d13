//! Relational persistence: agents, messages, sessions, migrations, and fork
//! hierarchy (spec §4.16, §6 "Database schema").
//!
//! The source's DB driver is an external collaborator (spec §1 "out of
//! scope"); `rusqlite` (bundled SQLite) stands in for it, matching
//! `hi-youichi-loom/graphweave`'s own `memory_sqlite` backend. The
//! connection is owned by the event-loop thread only (spec §5 "Shared
//! resources"), so no `Mutex` wraps it here.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Category, Error, Result};

/// One persisted agent row (spec §3 "Session / DB row", §6).
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRow {
    pub uuid: String,
    pub name: Option<String>,
    pub parent_uuid: Option<String>,
    pub fork_message_id: Option<i64>,
    pub provider: String,
    pub model: String,
    pub thinking_level: String,
    pub created_at: String,
}

/// One persisted message row.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: i64,
    pub session_id: i64,
    pub agent_uuid: String,
    pub ordinal: i64,
    pub kind: String,
    pub content: String,
    pub data_json: Option<String>,
}

pub const ROOT_AGENT_NAME: &str = "agent zero";

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens `path`, running migrations idempotently (spec §4.16 "On REPL init").
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::new(Category::DbConnect, format!("open {}: {}", path.display(), e)))?;
        let store = Store { conn };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::new(Category::DbConnect, e.to_string()))?;
        let store = Store { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS agents (
                    uuid TEXT PRIMARY KEY,
                    name TEXT,
                    parent_uuid TEXT,
                    fork_message_id INTEGER,
                    provider TEXT NOT NULL,
                    model TEXT NOT NULL,
                    thinking_level TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    started_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id INTEGER NOT NULL,
                    agent_uuid TEXT NOT NULL,
                    ordinal INTEGER NOT NULL,
                    kind TEXT NOT NULL,
                    content TEXT NOT NULL,
                    data_json TEXT
                );
                CREATE INDEX IF NOT EXISTS messages_agent_idx ON messages(agent_uuid, ordinal);
                ",
            )
            .map_err(|e| Error::new(Category::DbMigrate, e.to_string()))
    }

    /// Ensures the root agent ("agent zero") exists, returning its uuid
    /// (spec §4.16). Idempotent across restarts.
    pub fn ensure_root_agent(&self, uuid_gen: impl FnOnce() -> String, default_provider: &str, default_model: &str) -> Result<String> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT uuid FROM agents WHERE name = ?1 AND parent_uuid IS NULL",
                params![ROOT_AGENT_NAME],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::new(Category::DbConnect, e.to_string()))?;
        if let Some(uuid) = existing {
            return Ok(uuid);
        }
        let uuid = uuid_gen();
        self.insert_agent(&AgentRow {
            uuid: uuid.clone(),
            name: Some(ROOT_AGENT_NAME.to_string()),
            parent_uuid: None,
            fork_message_id: None,
            provider: default_provider.to_string(),
            model: default_model.to_string(),
            thinking_level: "med".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        })?;
        Ok(uuid)
    }

    /// Returns the most recent session id, creating one if none exists.
    pub fn get_or_create_active_session(&self) -> Result<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row("SELECT id FROM sessions ORDER BY id DESC LIMIT 1", [], |row| row.get(0))
            .optional()
            .map_err(|e| Error::new(Category::DbConnect, e.to_string()))?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.conn
            .execute(
                "INSERT INTO sessions (started_at) VALUES (?1)",
                params![chrono::Utc::now().to_rfc3339()],
            )
            .map_err(|e| Error::new(Category::DbConnect, e.to_string()))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_agent(&self, row: &AgentRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO agents (uuid, name, parent_uuid, fork_message_id, provider, model, thinking_level, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.uuid,
                    row.name,
                    row.parent_uuid,
                    row.fork_message_id,
                    row.provider,
                    row.model,
                    row.thinking_level,
                    row.created_at,
                ],
            )
            .map_err(|e| Error::new(Category::DbConnect, e.to_string()))?;
        Ok(())
    }

    pub fn load_agent(&self, uuid: &str) -> Result<Option<AgentRow>> {
        self.conn
            .query_row(
                "SELECT uuid, name, parent_uuid, fork_message_id, provider, model, thinking_level, created_at
                 FROM agents WHERE uuid = ?1",
                params![uuid],
                |row| {
                    Ok(AgentRow {
                        uuid: row.get(0)?,
                        name: row.get(1)?,
                        parent_uuid: row.get(2)?,
                        fork_message_id: row.get(3)?,
                        provider: row.get(4)?,
                        model: row.get(5)?,
                        thinking_level: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Error::new(Category::DbConnect, e.to_string()))
    }

    /// Appends one message row (spec §4.16 "On every successful append").
    pub fn insert_message(
        &self,
        session_id: i64,
        agent_uuid: &str,
        ordinal: i64,
        kind: &str,
        content: &str,
        data_json: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO messages (session_id, agent_uuid, ordinal, kind, content, data_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![session_id, agent_uuid, ordinal, kind, content, data_json],
            )
            .map_err(|e| Error::new(Category::DbConnect, e.to_string()))?;
        Ok(())
    }

    /// Loads every message for `agent_uuid` in append order, for restore
    /// (spec §4.16 "On restore").
    pub fn load_messages_for_agent(&self, agent_uuid: &str) -> Result<Vec<MessageRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, session_id, agent_uuid, ordinal, kind, content, data_json
                 FROM messages WHERE agent_uuid = ?1 ORDER BY ordinal ASC",
            )
            .map_err(|e| Error::new(Category::DbConnect, e.to_string()))?;
        let rows = stmt
            .query_map(params![agent_uuid], |row| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    agent_uuid: row.get(2)?,
                    ordinal: row.get(3)?,
                    kind: row.get(4)?,
                    content: row.get(5)?,
                    data_json: row.get(6)?,
                })
            })
            .map_err(|e| Error::new(Category::DbConnect, e.to_string()))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(|e| Error::new(Category::DbConnect, e.to_string()))?);
        }
        Ok(out)
    }
}
