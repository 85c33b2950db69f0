//! Durable entity shapes shared between the store and the in-memory trees.
//!
//! These mirror the relational rows one-to-one (see `conv-store`'s schema);
//! the in-memory projections (`MessageNode`, `SummaryNode`) are derived from
//! them, not the other way around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{LinkId, MessageId, SummaryId, ThreadId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub topic: Option<String>,
    pub prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub content: String,
    pub embedding_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub thread_id: ThreadId,
    pub previous_message_id: MessageId,
    pub next_message_id: MessageId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: SummaryId,
    pub content: String,
    pub embedding_file: Option<String>,
    pub start_message_id: MessageId,
    pub end_message_id: MessageId,
    pub created_at: DateTime<Utc>,
}
