pub mod models;

use chrono::{SecondsFormat, Utc};
use models::{Conversation, VectorRow};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::embedding::{bytes_to_embedding, embedding_to_bytes};
use crate::error::{DocQaError, Result};

pub struct Database {
    conn: Mutex<Connection>,
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DocQaError::io(parent, e))?;
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS vectors (
                id TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_vectors_namespace ON vectors(namespace);
            ",
        )?;
        Ok(())
    }

    // ── Conversations ──

    pub fn create_conversation(&self, name: &str) -> Result<Conversation> {
        let conn = self.lock();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        conn.execute(
            "INSERT INTO conversations (name, created_at) VALUES (?1, ?2)",
            params![name, created_at],
        )?;
        Ok(Conversation {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            created_at,
        })
    }

    /// Newest first; rows created within the same instant keep insertion order reversed.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at FROM conversations ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], row_to_conversation)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_conversation_by_name(&self, name: &str) -> Result<Option<Conversation>> {
        let conn = self.lock();
        let conv = conn
            .query_row(
                "SELECT id, name, created_at FROM conversations WHERE name = ?1 ORDER BY id DESC LIMIT 1",
                params![name],
                row_to_conversation,
            )
            .optional()?;
        Ok(conv)
    }

    // ── Vectors ──

    pub fn insert_vectors(&self, namespace: &str, rows: &[(String, VectorRow)]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO vectors (id, namespace, chunk_id, content, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (id, row) in rows {
                stmt.execute(params![
                    id,
                    namespace,
                    row.chunk_id,
                    row.content,
                    row.metadata,
                    embedding_to_bytes(&row.embedding)
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn vectors_in_namespace(&self, namespace: &str) -> Result<Vec<VectorRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT chunk_id, content, metadata, embedding FROM vectors WHERE namespace = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![namespace], |row| {
            let bytes: Vec<u8> = row.get(3)?;
            Ok(VectorRow {
                chunk_id: row.get(0)?,
                content: row.get(1)?,
                metadata: row.get(2)?,
                embedding: bytes_to_embedding(&bytes),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
