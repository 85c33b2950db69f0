//! `sqlx`-backed `Store`, with an embedded schema so a fresh SQLite
//! connection (file or `sqlite::memory:`) is ready to use after `connect`.
//!
//! Ids are plain `INTEGER PRIMARY KEY`, not `AUTOINCREMENT` — SQLite recycles
//! rowids once the highest-numbered row is deleted, which the cache's
//! round-trip properties and `delete_branch` lean on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conv_core::{Link, LinkId, Message, MessageId, Summary, SummaryId, Thread, ThreadId};
use conv_error::{Error, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::{Store, DEFAULT_THREAD_PROMPT};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS threads (
        id INTEGER PRIMARY KEY,
        topic TEXT,
        prompt TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY,
        thread_id INTEGER NOT NULL REFERENCES threads(id),
        content TEXT NOT NULL,
        embedding_file TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS links (
        id INTEGER PRIMARY KEY,
        thread_id INTEGER NOT NULL REFERENCES threads(id),
        previous_message_id INTEGER NOT NULL REFERENCES messages(id),
        next_message_id INTEGER NOT NULL REFERENCES messages(id),
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS summaries (
        id INTEGER PRIMARY KEY,
        content TEXT NOT NULL,
        embedding_file TEXT,
        start_message_id INTEGER NOT NULL REFERENCES messages(id),
        end_message_id INTEGER NOT NULL REFERENCES messages(id),
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS links_thread_idx ON links(thread_id)",
    "CREATE INDEX IF NOT EXISTS messages_thread_idx ON messages(thread_id)",
];

#[derive(FromRow)]
struct ThreadRow {
    id: i64,
    topic: Option<String>,
    prompt: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ThreadRow> for Thread {
    fn from(row: ThreadRow) -> Self {
        Thread {
            id: ThreadId(row.id),
            topic: row.topic,
            prompt: row.prompt,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: i64,
    thread_id: i64,
    content: String,
    embedding_file: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: MessageId(row.id),
            thread_id: ThreadId(row.thread_id),
            content: row.content,
            embedding_file: row.embedding_file,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct LinkRow {
    id: i64,
    thread_id: i64,
    previous_message_id: i64,
    next_message_id: i64,
    created_at: DateTime<Utc>,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Link {
            id: LinkId(row.id),
            thread_id: ThreadId(row.thread_id),
            previous_message_id: MessageId(row.previous_message_id),
            next_message_id: MessageId(row.next_message_id),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct SummaryRow {
    id: i64,
    content: String,
    embedding_file: Option<String>,
    start_message_id: i64,
    end_message_id: i64,
    created_at: DateTime<Utc>,
}

impl From<SummaryRow> for Summary {
    fn from(row: SummaryRow) -> Self {
        Summary {
            id: SummaryId(row.id),
            content: row.content,
            embedding_file: row.embedding_file,
            start_message_id: MessageId(row.start_message_id),
            end_message_id: MessageId(row.end_message_id),
            created_at: row.created_at,
        }
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects to `url` (e.g. a file path or `sqlite::memory:`) and
    /// applies the embedded schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new().connect(url).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Convenience constructor for tests and fixtures: one in-memory
    /// database that lives for the lifetime of the returned store.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("applied conv-store schema");
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_thread(&self, prompt: Option<String>, topic: Option<String>) -> Result<ThreadId> {
        let prompt = prompt.unwrap_or_else(|| DEFAULT_THREAD_PROMPT.to_string());
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO threads (topic, prompt, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(topic)
        .bind(prompt)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(ThreadId(id))
    }

    async fn fetch_threads(&self) -> Result<Vec<Thread>> {
        let rows: Vec<ThreadRow> =
            sqlx::query_as("SELECT id, topic, prompt, created_at FROM threads ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Thread::from).collect())
    }

    async fn insert_message(&self, thread_id: ThreadId, content: String) -> Result<MessageId> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (thread_id, content, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(thread_id.get())
        .bind(content)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(MessageId(id))
    }

    async fn fetch_messages(&self, thread_id: ThreadId) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, thread_id, content, embedding_file, created_at FROM messages WHERE thread_id = ? ORDER BY id",
        )
        .bind(thread_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn fetch_message(&self, message_id: MessageId) -> Result<Message> {
        let row: Option<MessageRow> = sqlx::query_as(
            "SELECT id, thread_id, content, embedding_file, created_at FROM messages WHERE id = ?",
        )
        .bind(message_id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Message::from)
            .ok_or_else(|| Error::NotFound(format!("message {message_id}")))
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<()> {
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(message_id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_link(&self, thread_id: ThreadId, prev: MessageId, next: MessageId) -> Result<LinkId> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO links (thread_id, previous_message_id, next_message_id, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(thread_id.get())
        .bind(prev.get())
        .bind(next.get())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(LinkId(id))
    }

    async fn delete_link(&self, prev: MessageId, next: MessageId) -> Result<()> {
        sqlx::query("DELETE FROM links WHERE previous_message_id = ? AND next_message_id = ?")
            .bind(prev.get())
            .bind(next.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_links(&self, thread_id: ThreadId) -> Result<Vec<Link>> {
        let rows: Vec<LinkRow> = sqlx::query_as(
            "SELECT id, thread_id, previous_message_id, next_message_id, created_at FROM links WHERE thread_id = ? ORDER BY id",
        )
        .bind(thread_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Link::from).collect())
    }

    async fn insert_summary(
        &self,
        content: String,
        start: MessageId,
        end: MessageId,
        embedding_file: Option<String>,
    ) -> Result<SummaryId> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO summaries (content, embedding_file, start_message_id, end_message_id, created_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(content)
        .bind(embedding_file)
        .bind(start.get())
        .bind(end.get())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(SummaryId(id))
    }

    async fn delete_summary(&self, summary_id: SummaryId) -> Result<()> {
        sqlx::query("DELETE FROM summaries WHERE id = ?")
            .bind(summary_id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_summaries(&self, thread_id: ThreadId) -> Result<Vec<Summary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            "SELECT s.id, s.content, s.embedding_file, s.start_message_id, s.end_message_id, s.created_at
             FROM summaries s
             JOIN messages m ON m.id = s.start_message_id
             WHERE m.thread_id = ?
             ORDER BY s.id",
        )
        .bind(thread_id.get())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Summary::from).collect())
    }
}
