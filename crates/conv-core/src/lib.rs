//! In-memory message tree, summary tree, and bounded LRU cache that sit in
//! front of the durable store.

pub mod cache;
pub mod ids;
pub mod message;
pub mod model;
pub mod summary;

pub use cache::{CachedThread, CachedThreadHandle, TreeCache};
pub use ids::{LinkId, MessageId, SummaryId, ThreadId};
pub use message::{MessageNode, MessageTree};
pub use model::{Link, Message, Summary, Thread};
pub use summary::{SummaryIndex, SummaryNode, SummaryTree};
