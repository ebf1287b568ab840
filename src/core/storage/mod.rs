// src/core/storage/mod.rs

//! The durable local store: users, topics, queues, and their messages,
//! backed by SQLite.
//!
//! Every operation opens its own connection and runs as a single transaction
//! on the blocking thread pool. Queue consumption uses an IMMEDIATE
//! transaction so the select-and-delete is atomic under concurrent callers.

use crate::core::CitrineError;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    username   TEXT PRIMARY KEY,
    password   TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS topics (
    name  TEXT PRIMARY KEY,
    owner TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS topic_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_name TEXT NOT NULL REFERENCES topics(name) ON DELETE CASCADE,
    sender     TEXT NOT NULL,
    content    TEXT NOT NULL,
    timestamp  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_topic_messages_topic ON topic_messages(topic_name, id);
CREATE TABLE IF NOT EXISTS queues (
    name  TEXT PRIMARY KEY,
    owner TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS queue_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    queue_name TEXT NOT NULL REFERENCES queues(name) ON DELETE CASCADE,
    sender     TEXT NOT NULL,
    content    TEXT NOT NULL,
    timestamp  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_queue_messages_queue ON queue_messages(queue_name, id);
";

/// A message as stored and as returned to clients. The row id stays internal;
/// it only orders the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub sender: String,
    pub content: String,
    pub timestamp: String,
}

/// A registered principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Handle to the node's SQLite database. Cheap to clone; each operation
/// opens its own connection.
#[derive(Debug, Clone)]
pub struct Store {
    path: Arc<PathBuf>,
}

impl Store {
    /// Opens the store and creates the schema if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CitrineError> {
        let store = Self {
            path: Arc::new(path.into()),
        };
        store
            .with_conn(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection, CitrineError> {
        let conn = Connection::open(self.path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        // WAL keeps readers from blocking each other; the pragma returns the
        // resulting mode as a row, so it must go through query_row.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, CitrineError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, CitrineError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = store.connect()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| CitrineError::Internal(format!("store task failed: {e}")))?
    }

    // --- Users ---

    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), CitrineError> {
        let (username, password_hash) = (username.to_string(), password_hash.to_string());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if row_exists(&tx, "SELECT 1 FROM users WHERE username = ?1", &username)? {
                return Err(CitrineError::AlreadyExists("user", username));
            }
            tx.execute(
                "INSERT INTO users (username, password, created_at) VALUES (?1, ?2, ?3)",
                params![username, password_hash, now()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, CitrineError> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    "SELECT username, password, created_at FROM users WHERE username = ?1",
                    [&username],
                    |row| {
                        Ok(UserRecord {
                            username: row.get(0)?,
                            password_hash: row.get(1)?,
                            created_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    pub async fn list_users(&self) -> Result<Vec<String>, CitrineError> {
        self.with_conn(|conn| {
            collect_names(conn, "SELECT username FROM users ORDER BY username")
        })
        .await
    }

    // --- Topics ---

    pub async fn create_topic(&self, name: &str, owner: &str) -> Result<(), CitrineError> {
        let (name, owner) = (name.to_string(), owner.to_string());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if row_exists(&tx, "SELECT 1 FROM topics WHERE name = ?1", &name)? {
                return Err(CitrineError::AlreadyExists("topic", name));
            }
            tx.execute(
                "INSERT INTO topics (name, owner) VALUES (?1, ?2)",
                params![name, owner],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Deletes a topic and its log. Missing is not an error.
    pub async fn delete_topic(&self, name: &str) -> Result<(), CitrineError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM topic_messages WHERE topic_name = ?1", [&name])?;
            tx.execute("DELETE FROM topics WHERE name = ?1", [&name])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn topic_owner(&self, name: &str) -> Result<Option<String>, CitrineError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let owner = conn
                .query_row("SELECT owner FROM topics WHERE name = ?1", [&name], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(owner)
        })
        .await
    }

    pub async fn list_topics(&self) -> Result<Vec<String>, CitrineError> {
        self.with_conn(|conn| collect_names(conn, "SELECT name FROM topics ORDER BY name"))
            .await
    }

    pub async fn append_topic_message(
        &self,
        name: &str,
        sender: &str,
        content: &str,
    ) -> Result<(), CitrineError> {
        let (name, sender, content) = (name.to_string(), sender.to_string(), content.to_string());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if !row_exists(&tx, "SELECT 1 FROM topics WHERE name = ?1", &name)? {
                return Err(CitrineError::NotFound("topic", name));
            }
            tx.execute(
                "INSERT INTO topic_messages (topic_name, sender, content, timestamp) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![name, sender, content, now()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// The full log, oldest first.
    pub async fn read_topic_messages(
        &self,
        name: &str,
    ) -> Result<Vec<StoredMessage>, CitrineError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            if !row_exists(conn, "SELECT 1 FROM topics WHERE name = ?1", &name)? {
                return Err(CitrineError::NotFound("topic", name));
            }
            collect_messages(
                conn,
                "SELECT sender, content, timestamp FROM topic_messages \
                 WHERE topic_name = ?1 ORDER BY id ASC",
                &name,
            )
        })
        .await
    }

    // --- Queues ---

    pub async fn create_queue(&self, name: &str, owner: &str) -> Result<(), CitrineError> {
        let (name, owner) = (name.to_string(), owner.to_string());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if row_exists(&tx, "SELECT 1 FROM queues WHERE name = ?1", &name)? {
                return Err(CitrineError::AlreadyExists("queue", name));
            }
            tx.execute(
                "INSERT INTO queues (name, owner) VALUES (?1, ?2)",
                params![name, owner],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn delete_queue(&self, name: &str) -> Result<(), CitrineError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM queue_messages WHERE queue_name = ?1", [&name])?;
            tx.execute("DELETE FROM queues WHERE name = ?1", [&name])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn queue_owner(&self, name: &str) -> Result<Option<String>, CitrineError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let owner = conn
                .query_row("SELECT owner FROM queues WHERE name = ?1", [&name], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(owner)
        })
        .await
    }

    pub async fn list_queues(&self) -> Result<Vec<String>, CitrineError> {
        self.with_conn(|conn| collect_names(conn, "SELECT name FROM queues ORDER BY name"))
            .await
    }

    pub async fn enqueue(
        &self,
        name: &str,
        sender: &str,
        content: &str,
    ) -> Result<(), CitrineError> {
        let (name, sender, content) = (name.to_string(), sender.to_string(), content.to_string());
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if !row_exists(&tx, "SELECT 1 FROM queues WHERE name = ?1", &name)? {
                return Err(CitrineError::NotFound("queue", name));
            }
            tx.execute(
                "INSERT INTO queue_messages (queue_name, sender, content, timestamp) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![name, sender, content, now()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Atomically pops the oldest message: select-and-delete under one
    /// IMMEDIATE transaction, so concurrent callers observe distinct
    /// messages or `None`.
    pub async fn pop_queue(&self, name: &str) -> Result<Option<StoredMessage>, CitrineError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !row_exists(&tx, "SELECT 1 FROM queues WHERE name = ?1", &name)? {
                return Err(CitrineError::NotFound("queue", name));
            }
            let head = tx
                .query_row(
                    "SELECT id, sender, content, timestamp FROM queue_messages \
                     WHERE queue_name = ?1 ORDER BY id ASC LIMIT 1",
                    [&name],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            StoredMessage {
                                sender: row.get(1)?,
                                content: row.get(2)?,
                                timestamp: row.get(3)?,
                            },
                        ))
                    },
                )
                .optional()?;
            match head {
                None => {
                    tx.commit()?;
                    Ok(None)
                }
                Some((id, message)) => {
                    tx.execute("DELETE FROM queue_messages WHERE id = ?1", [id])?;
                    tx.commit()?;
                    Ok(Some(message))
                }
            }
        })
        .await
    }

    /// The queued messages, oldest first, without consuming them. Used to
    /// inspect warm-standby replicas.
    pub async fn read_queue_messages(
        &self,
        name: &str,
    ) -> Result<Vec<StoredMessage>, CitrineError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            if !row_exists(conn, "SELECT 1 FROM queues WHERE name = ?1", &name)? {
                return Err(CitrineError::NotFound("queue", name));
            }
            collect_messages(
                conn,
                "SELECT sender, content, timestamp FROM queue_messages \
                 WHERE queue_name = ?1 ORDER BY id ASC",
                &name,
            )
        })
        .await
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn row_exists(conn: &Connection, sql: &str, key: &str) -> Result<bool, CitrineError> {
    let found = conn
        .query_row(sql, [key], |_| Ok(()))
        .optional()?
        .is_some();
    Ok(found)
}

fn collect_names(conn: &Connection, sql: &str) -> Result<Vec<String>, CitrineError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

fn collect_messages(
    conn: &Connection,
    sql: &str,
    key: &str,
) -> Result<Vec<StoredMessage>, CitrineError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([key], |row| {
        Ok(StoredMessage {
            sender: row.get(0)?,
            content: row.get(1)?,
            timestamp: row.get(2)?,
        })
    })?;
    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}
