//! In-memory rooted tree of a thread's messages.

use std::collections::HashMap;

use conv_error::{Error, Result};

use crate::ids::{MessageId, ThreadId};
use crate::model::{Link, Message};

/// One message's position in the tree: its content, its parent (`None` only
/// for the root), and the ids of its children in the order branches were
/// appended.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageNode {
    pub id: MessageId,
    pub content: String,
    pub parent_id: Option<MessageId>,
    pub child_ids: Vec<MessageId>,
}

/// A thread's messages projected into a rooted tree, keyed by message id.
///
/// `root_message_id` is `None` only for a thread that has never had a
/// message added — `Dispatcher::add_message` always inserts the message
/// into the store before touching this tree, so in practice a `Dispatcher`
/// never observes this state; it exists so a freshly `insert_thread`-ed
/// conversation can be loaded and immediately seeded with its first
/// message via `add_message(id, content, None)`.
#[derive(Debug, Clone)]
pub struct MessageTree {
    pub thread_id: ThreadId,
    pub root_message_id: Option<MessageId>,
    pub index: HashMap<MessageId, MessageNode>,
}

impl MessageTree {
    /// Builds the tree from a thread's messages and links, as fetched from
    /// the store. Fails with `Error::CorruptTree` if a link references a
    /// message outside the given set, or if the resulting graph does not
    /// have exactly one root (when at least one message is present).
    pub fn build(thread_id: ThreadId, messages: Vec<Message>, links: Vec<Link>) -> Result<Self> {
        let mut index: HashMap<MessageId, MessageNode> = messages
            .into_iter()
            .map(|m| {
                (
                    m.id,
                    MessageNode {
                        id: m.id,
                        content: m.content,
                        parent_id: None,
                        child_ids: Vec::new(),
                    },
                )
            })
            .collect();

        for link in links {
            if !index.contains_key(&link.previous_message_id)
                || !index.contains_key(&link.next_message_id)
            {
                return Err(Error::CorruptTree(format!(
                    "link {} references a message outside thread {}",
                    link.id, thread_id
                )));
            }
            index
                .get_mut(&link.next_message_id)
                .expect("checked above")
                .parent_id = Some(link.previous_message_id);
            index
                .get_mut(&link.previous_message_id)
                .expect("checked above")
                .child_ids
                .push(link.next_message_id);
        }

        if index.is_empty() {
            return Ok(Self {
                thread_id,
                root_message_id: None,
                index,
            });
        }

        let mut roots = index.values().filter(|n| n.parent_id.is_none());
        let root_id = match roots.next() {
            Some(node) => node.id,
            None => {
                return Err(Error::CorruptTree(format!(
                    "thread {thread_id} has messages but no root (parent cycle)"
                )))
            }
        };
        if roots.next().is_some() {
            return Err(Error::CorruptTree(format!(
                "thread {thread_id} has more than one root message"
            )));
        }

        Ok(Self {
            thread_id,
            root_message_id: Some(root_id),
            index,
        })
    }

    /// Inserts a freshly created message into the tree.
    ///
    /// Idempotent when `id` is already present: `Dispatcher::add_message`
    /// writes the message to the store, then calls `TreeCache::get`, which
    /// — on a cache miss — reloads the tree directly from the store and so
    /// already reflects the new message before this call runs. Treating a
    /// repeat insertion of the same id as a no-op keeps that path from
    /// double-appending the id to its parent's `child_ids`.
    pub fn add_message(
        &mut self,
        id: MessageId,
        content: String,
        parent_id: Option<MessageId>,
    ) -> Result<()> {
        if self.index.contains_key(&id) {
            return Ok(());
        }

        match parent_id {
            None => {
                if !self.index.is_empty() {
                    return Err(Error::InvariantViolation(format!(
                        "thread {} already has a root message",
                        self.thread_id
                    )));
                }
                self.index.insert(
                    id,
                    MessageNode {
                        id,
                        content,
                        parent_id: None,
                        child_ids: Vec::new(),
                    },
                );
                self.root_message_id = Some(id);
            }
            Some(pid) => {
                if !self.index.contains_key(&pid) {
                    return Err(Error::UnknownParent(pid.get()));
                }
                self.index.insert(
                    id,
                    MessageNode {
                        id,
                        content,
                        parent_id: Some(pid),
                        child_ids: Vec::new(),
                    },
                );
                self.index
                    .get_mut(&pid)
                    .expect("checked above")
                    .child_ids
                    .push(id);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: MessageId) -> Option<&MessageNode> {
        self.index.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(id: i64) -> Message {
        Message {
            id: MessageId(id),
            thread_id: ThreadId(1),
            content: format!("content {id}"),
            embedding_file: None,
            created_at: Utc::now(),
        }
    }

    fn link(id: i64, prev: i64, next: i64) -> Link {
        Link {
            id: crate::ids::LinkId(id),
            thread_id: ThreadId(1),
            previous_message_id: MessageId(prev),
            next_message_id: MessageId(next),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn build_establishes_branches_in_link_order() {
        let messages = vec![msg(0), msg(1), msg(2), msg(3)];
        let links = vec![link(0, 0, 1), link(1, 1, 2), link(2, 0, 3)];
        let tree = MessageTree::build(ThreadId(1), messages, links).unwrap();

        assert_eq!(tree.root_message_id, Some(MessageId(0)));
        assert_eq!(
            tree.index[&MessageId(0)].child_ids,
            vec![MessageId(1), MessageId(3)]
        );
        assert_eq!(tree.index[&MessageId(1)].parent_id, Some(MessageId(0)));
        assert_eq!(tree.index[&MessageId(2)].parent_id, Some(MessageId(1)));
        assert!(tree.index[&MessageId(2)].child_ids.is_empty());
    }

    #[test]
    fn build_rejects_multiple_roots() {
        let messages = vec![msg(0), msg(1)];
        let err = MessageTree::build(ThreadId(1), messages, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::CorruptTree(_)));
    }

    #[test]
    fn build_rejects_dangling_link() {
        let messages = vec![msg(0)];
        let links = vec![link(0, 0, 99)];
        let err = MessageTree::build(ThreadId(1), messages, links).unwrap_err();
        assert!(matches!(err, Error::CorruptTree(_)));
    }

    #[test]
    fn add_message_appends_and_rejects_second_root() {
        let mut tree = MessageTree::build(ThreadId(1), Vec::new(), Vec::new()).unwrap();
        tree.add_message(MessageId(0), "root".into(), None).unwrap();
        assert_eq!(tree.root_message_id, Some(MessageId(0)));

        tree.add_message(MessageId(1), "child".into(), Some(MessageId(0)))
            .unwrap();
        assert_eq!(tree.index[&MessageId(0)].child_ids, vec![MessageId(1)]);

        let err = tree
            .add_message(MessageId(2), "another root".into(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn add_message_rejects_unknown_parent() {
        let mut tree = MessageTree::build(ThreadId(1), Vec::new(), Vec::new()).unwrap();
        let err = tree
            .add_message(MessageId(0), "orphan".into(), Some(MessageId(5)))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParent(5)));
    }

    #[test]
    fn add_message_is_idempotent_for_already_loaded_id() {
        let messages = vec![msg(0), msg(1)];
        let links = vec![link(0, 0, 1)];
        let mut tree = MessageTree::build(ThreadId(1), messages, links).unwrap();

        // Simulates a cache miss that reloaded a message already inserted
        // into the store by the dispatcher before this call.
        tree.add_message(MessageId(1), "content 1".into(), Some(MessageId(0)))
            .unwrap();
        assert_eq!(tree.index[&MessageId(0)].child_ids, vec![MessageId(1)]);
    }
}
