//! Projection of a `MessageTree` into its summary-level quotient, plus the
//! three inverse indices that keep `start`/`end`/`id` lookups mutually
//! consistent.

use std::collections::HashMap;

use conv_error::{Error, Result};

use crate::ids::{MessageId, SummaryId, ThreadId};
use crate::message::MessageTree;
use crate::model::Summary;

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryNode {
    pub id: SummaryId,
    pub content: String,
    pub start_message_id: MessageId,
    pub end_message_id: MessageId,
    pub parent_id: Option<SummaryId>,
    pub child_ids: Vec<SummaryId>,
}

/// The three mappings that must stay mutually consistent: for every
/// `SummaryNode n`, `start_msg[n.start] == end_msg[n.end] == n.id`.
#[derive(Debug, Clone, Default)]
pub struct SummaryIndex {
    pub start_msg: HashMap<MessageId, SummaryId>,
    pub end_msg: HashMap<MessageId, SummaryId>,
    pub by_id: HashMap<SummaryId, SummaryNode>,
}

#[derive(Debug, Clone)]
pub struct SummaryTree {
    pub thread_id: ThreadId,
    pub root_summary_id: Option<SummaryId>,
    pub index: SummaryIndex,
}

impl SummaryTree {
    /// Builds the summary tree over an already-loaded `MessageTree`.
    ///
    /// A summary whose `start` message cannot be found in `message_tree` is
    /// tolerated rather than rejected — the same robustness-over-strictness
    /// stance the design takes for a tail of unsummarized messages above a
    /// summary's span.
    pub fn build(
        thread_id: ThreadId,
        message_tree: &MessageTree,
        summaries: Vec<Summary>,
    ) -> Result<Self> {
        let mut index = SummaryIndex::default();
        let mut spans = Vec::with_capacity(summaries.len());

        for s in summaries {
            spans.push((s.id, s.start_message_id, s.end_message_id));
            index.start_msg.insert(s.start_message_id, s.id);
            index.end_msg.insert(s.end_message_id, s.id);
            index.by_id.insert(
                s.id,
                SummaryNode {
                    id: s.id,
                    content: s.content,
                    start_message_id: s.start_message_id,
                    end_message_id: s.end_message_id,
                    parent_id: None,
                    child_ids: Vec::new(),
                },
            );
        }

        for (id, start, end) in &spans {
            if let Some(start_node) = message_tree.get(*start) {
                if let Some(parent_msg) = start_node.parent_id {
                    if let Some(&parent_summary_id) = index.end_msg.get(&parent_msg) {
                        index
                            .by_id
                            .get_mut(id)
                            .expect("inserted above")
                            .parent_id = Some(parent_summary_id);
                    }
                    // Else: the tail above this summary is unsummarized;
                    // this summary is root-in-the-summary-tree.
                }
            }

            if let Some(end_node) = message_tree.get(*end) {
                for child_msg in &end_node.child_ids {
                    if let Some(&child_summary_id) = index.start_msg.get(child_msg) {
                        index
                            .by_id
                            .get_mut(id)
                            .expect("inserted above")
                            .child_ids
                            .push(child_summary_id);
                    }
                    // Else: that branch has not been summarized yet.
                }
            }
        }

        let root_summary_id = message_tree
            .root_message_id
            .and_then(|r| index.start_msg.get(&r).copied());

        Ok(Self {
            thread_id,
            root_summary_id,
            index,
        })
    }

    /// Adds a new summary covering the linear span `[start, end]`.
    ///
    /// Fails with `Error::InvariantViolation` if the span is not a linear
    /// chain in `message_tree` (S1).
    pub fn add_summary(
        &mut self,
        message_tree: &MessageTree,
        id: SummaryId,
        content: String,
        start: MessageId,
        end: MessageId,
    ) -> Result<()> {
        validate_linear_span(message_tree, start, end)?;

        let parent_msg = message_tree
            .get(start)
            .ok_or_else(|| Error::NotFound(format!("message {start}")))?
            .parent_id;
        let parent_summary_id = parent_msg.and_then(|p| self.index.end_msg.get(&p).copied());

        if let Some(parent_id) = parent_summary_id {
            if let Some(parent) = self.index.by_id.get_mut(&parent_id) {
                parent.child_ids.push(id);
            }
        }

        self.index.by_id.insert(
            id,
            SummaryNode {
                id,
                content,
                start_message_id: start,
                end_message_id: end,
                parent_id: parent_summary_id,
                child_ids: Vec::new(),
            },
        );
        self.index.start_msg.insert(start, id);
        self.index.end_msg.insert(end, id);

        if message_tree.root_message_id == Some(start) {
            self.root_summary_id = Some(id);
        }

        Ok(())
    }

    /// Atomically replaces `id` with two summaries split at
    /// `branch_off_message_id`: `pre` covers `[old.start, branch_off]`,
    /// `post` covers `[first original-path child of branch_off, old.end]`.
    ///
    /// Rewires the removed summary's parent (so it points at `pre` instead)
    /// and the removed summary's children (so they point at `post` as their
    /// parent) — the "atomic replacement... with rewired parent/child
    /// edges" the design calls out as the hard part of this operation.
    #[allow(clippy::too_many_arguments)]
    pub fn split_summary(
        &mut self,
        message_tree: &MessageTree,
        id: SummaryId,
        pre_id: SummaryId,
        pre_content: String,
        branch_off_message_id: MessageId,
        post_id: SummaryId,
        post_content: String,
    ) -> Result<()> {
        let old = self
            .index
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("summary {id}")))?;

        if branch_off_message_id == old.end_message_id {
            return Err(Error::InvariantViolation(format!(
                "branch-off message {branch_off_message_id} is the end of summary {id}; no split is required"
            )));
        }

        let branch_node = message_tree
            .get(branch_off_message_id)
            .ok_or_else(|| Error::NotFound(format!("message {branch_off_message_id}")))?;
        // The original, pre-fork continuation is always at index 0 —
        // `MessageTree::add_message` only ever appends — whether or not
        // `branch_off_message_id` has actually forked.
        let post_start = *branch_node.child_ids.first().ok_or_else(|| {
            Error::InvariantViolation(format!(
                "message {branch_off_message_id} has no child to continue the post-split summary"
            ))
        })?;

        self.index.by_id.remove(&id);
        self.index.start_msg.remove(&old.start_message_id);
        self.index.end_msg.remove(&old.end_message_id);

        let pre = SummaryNode {
            id: pre_id,
            content: pre_content,
            start_message_id: old.start_message_id,
            end_message_id: branch_off_message_id,
            parent_id: old.parent_id,
            child_ids: vec![post_id],
        };
        let post = SummaryNode {
            id: post_id,
            content: post_content,
            start_message_id: post_start,
            end_message_id: old.end_message_id,
            parent_id: Some(pre_id),
            child_ids: old.child_ids.clone(),
        };

        if let Some(parent_id) = old.parent_id {
            if let Some(parent) = self.index.by_id.get_mut(&parent_id) {
                if let Some(slot) = parent.child_ids.iter_mut().find(|c| **c == id) {
                    *slot = pre_id;
                }
            }
        }
        for child_id in &old.child_ids {
            if let Some(child) = self.index.by_id.get_mut(child_id) {
                child.parent_id = Some(post_id);
            }
        }

        self.index.start_msg.insert(pre.start_message_id, pre_id);
        self.index.end_msg.insert(pre.end_message_id, pre_id);
        self.index.start_msg.insert(post.start_message_id, post_id);
        self.index.end_msg.insert(post.end_message_id, post_id);
        self.index.by_id.insert(pre_id, pre);
        self.index.by_id.insert(post_id, post);

        if self.root_summary_id == Some(id) {
            self.root_summary_id = Some(pre_id);
        }

        Ok(())
    }

    /// Counts unsummarized messages walking parents from `msg_id`
    /// (inclusive) up to, but not counting, the nearest end-of-summary —
    /// or up to and including the root if no summary is ever hit.
    ///
    /// Precondition: `msg_id` is either itself an end-of-summary (returns
    /// `0`) or is not part of any summary at all.
    pub fn count_unsummarized_messages(
        &self,
        message_tree: &MessageTree,
        msg_id: MessageId,
    ) -> usize {
        let mut count = 0;
        let mut current = Some(msg_id);
        while let Some(id) = current {
            if self.index.end_msg.contains_key(&id) {
                break;
            }
            count += 1;
            current = message_tree.get(id).and_then(|n| n.parent_id);
        }
        count
    }

    /// Walks forward from `msg_id` to determine whether it lies on a
    /// summarized span. Fails with `Error::AmbiguousPath` if a branch is
    /// encountered before an end-of-summary — by S1 a summarized span
    /// cannot contain a branch.
    pub fn is_summarized(&self, message_tree: &MessageTree, msg_id: MessageId) -> Result<bool> {
        let mut current = msg_id;
        loop {
            if self.index.end_msg.contains_key(&current) {
                return Ok(true);
            }
            let node = message_tree
                .get(current)
                .ok_or_else(|| Error::NotFound(format!("message {current}")))?;
            match node.child_ids.len() {
                0 => return Ok(false),
                1 => current = node.child_ids[0],
                _ => return Err(Error::AmbiguousPath(current.get())),
            }
        }
    }
}

fn validate_linear_span(message_tree: &MessageTree, start: MessageId, end: MessageId) -> Result<()> {
    let mut current = start;
    loop {
        if current == end {
            return Ok(());
        }
        let node = message_tree
            .get(current)
            .ok_or_else(|| Error::NotFound(format!("message {current}")))?;
        match node.child_ids.as_slice() {
            [only] => current = *only,
            _ => {
                return Err(Error::InvariantViolation(format!(
                    "span {start}..{end} is not a linear chain at message {current}"
                )))
            }
        }
    }
}
