//! Durable CRUD over threads, messages, links, and summaries.
//!
//! [`Store`] is the only collaborator the dispatcher treats as durable; the
//! in-memory trees in `conv-core` are always reconstructible from it.

pub mod sqlite;

use async_trait::async_trait;
use conv_core::{Link, LinkId, Message, MessageId, Summary, SummaryId, Thread, ThreadId};
use conv_error::Result;

pub use sqlite::SqliteStore;

/// Default system prompt assigned to a thread when the caller does not
/// supply one.
pub const DEFAULT_THREAD_PROMPT: &str = "You are a powerful brain storming partner";

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_thread(&self, prompt: Option<String>, topic: Option<String>) -> Result<ThreadId>;
    async fn fetch_threads(&self) -> Result<Vec<Thread>>;

    async fn insert_message(&self, thread_id: ThreadId, content: String) -> Result<MessageId>;
    async fn fetch_messages(&self, thread_id: ThreadId) -> Result<Vec<Message>>;
    async fn fetch_message(&self, message_id: MessageId) -> Result<Message>;
    async fn delete_message(&self, message_id: MessageId) -> Result<()>;

    async fn insert_link(&self, thread_id: ThreadId, prev: MessageId, next: MessageId) -> Result<LinkId>;
    async fn delete_link(&self, prev: MessageId, next: MessageId) -> Result<()>;
    async fn fetch_links(&self, thread_id: ThreadId) -> Result<Vec<Link>>;

    async fn insert_summary(
        &self,
        content: String,
        start: MessageId,
        end: MessageId,
        embedding_file: Option<String>,
    ) -> Result<SummaryId>;
    async fn delete_summary(&self, summary_id: SummaryId) -> Result<()>;
    async fn fetch_summaries(&self, thread_id: ThreadId) -> Result<Vec<Summary>>;
}
