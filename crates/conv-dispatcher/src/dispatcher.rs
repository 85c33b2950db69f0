//! The only component that touches both the durable store and the
//! in-memory trees. Every action mutates the store fully before touching
//! the cache, and the cache ends up either patched to match or invalidated
//! — never partially applied.

use std::sync::Arc;

use conv_core::{CachedThread, CachedThreadHandle, MessageId, MessageTree, SummaryTree, ThreadId, TreeCache};
use conv_error::{Error, Result};
use conv_oracle::LanguageOracle;
use conv_store::Store;
use tracing::{info, instrument};

use crate::action::{
    Action, ActionOutcome, AddMessageParams, BranchOffOutcome, BranchOffParams, DeleteBranchParams,
};

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub cache_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { cache_capacity: 32 }
    }
}

pub struct Dispatcher {
    store: Arc<dyn Store>,
    oracle: Arc<dyn LanguageOracle>,
    cache: TreeCache,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        oracle: Arc<dyn LanguageOracle>,
        config: DispatcherConfig,
    ) -> Result<Self> {
        Ok(Self {
            store,
            oracle,
            cache: TreeCache::new(config.cache_capacity)?,
        })
    }

    pub async fn dispatch(&self, action: Action) -> Result<ActionOutcome> {
        match action {
            Action::AddMessage(p) => self.add_message(p).await.map(ActionOutcome::MessageId),
            Action::BranchOff(p) => self.branch_off(p).await.map(ActionOutcome::BranchOff),
            Action::DeleteBranch(p) => self.delete_branch(p).await.map(|()| ActionOutcome::Unit),
        }
    }

    pub async fn dispatch_named(&self, action_name: &str, payload: serde_json::Value) -> Result<ActionOutcome> {
        self.dispatch(Action::from_named(action_name, payload)?).await
    }

    async fn load_thread(&self, thread_id: ThreadId) -> Result<CachedThread> {
        let messages = self.store.fetch_messages(thread_id).await?;
        let links = self.store.fetch_links(thread_id).await?;
        let message_tree = MessageTree::build(thread_id, messages, links)?;
        let summaries = self.store.fetch_summaries(thread_id).await?;
        let summary_tree = SummaryTree::build(thread_id, &message_tree, summaries)?;
        Ok(CachedThread {
            message_tree,
            summary_tree,
        })
    }

    async fn get_cached(&self, thread_id: ThreadId) -> Result<CachedThreadHandle> {
        self.cache.get(thread_id, || self.load_thread(thread_id)).await
    }

    #[instrument(skip(self, p), fields(thread_id = %p.thread_id))]
    async fn add_message(&self, p: AddMessageParams) -> Result<MessageId> {
        let msg_id = self.store.insert_message(p.thread_id, p.content.clone()).await?;
        if let Some(prev) = p.prev_message_id {
            self.store.insert_link(p.thread_id, prev, msg_id).await?;
        }

        let handle = self.get_cached(p.thread_id).await?;
        let mut guard = handle.write().await;
        let cached: &mut CachedThread = &mut guard;
        cached.message_tree.add_message(msg_id, p.content.clone(), p.prev_message_id)?;

        if p.trigger_summarization {
            self.maybe_summarize(cached, p.prev_message_id, &p.content, p.summary_batch_size)
                .await?;
        }

        info!(%msg_id, "added message");
        Ok(msg_id)
    }

    /// Does nothing unless: a previous message exists, the unsummarized
    /// tail above it has reached `batch_size`, and the oracle reports a
    /// topic shift between the previous and new content. The two gates are
    /// conjunctive — either one being false suppresses summarization.
    async fn maybe_summarize(
        &self,
        cached: &mut CachedThread,
        prev_message_id: Option<MessageId>,
        current_content: &str,
        batch_size: usize,
    ) -> Result<()> {
        let Some(prev) = prev_message_id else {
            return Ok(());
        };
        if cached
            .summary_tree
            .count_unsummarized_messages(&cached.message_tree, prev)
            < batch_size
        {
            return Ok(());
        }

        let prev_content = cached
            .message_tree
            .get(prev)
            .ok_or_else(|| Error::NotFound(format!("message {prev}")))?
            .content
            .clone();
        if !self.oracle.topic_shift(&prev_content, current_content).await? {
            return Ok(());
        }

        // Walk parents from `prev` (inclusive), collecting content in
        // child-to-parent order, until an end-of-summary is hit or the
        // root is crossed — both are valid termination.
        let mut contents = Vec::new();
        let mut current = Some(prev);
        let mut start = prev;
        while let Some(id) = current {
            if cached.summary_tree.index.end_msg.contains_key(&id) {
                break;
            }
            let node = cached
                .message_tree
                .get(id)
                .ok_or_else(|| Error::NotFound(format!("message {id}")))?;
            contents.push(node.content.clone());
            start = id;
            current = node.parent_id;
        }
        let end = prev;

        let text = self.oracle.summarize(&contents).await?;
        let summary_id = self.store.insert_summary(text.clone(), start, end, None).await?;
        cached
            .summary_tree
            .add_summary(&cached.message_tree, summary_id, text, start, end)?;
        Ok(())
    }

    #[instrument(skip(self, p), fields(thread_id = %p.thread_id))]
    async fn branch_off(&self, p: BranchOffParams) -> Result<BranchOffOutcome> {
        let handle = self.get_cached(p.thread_id).await?;
        let mut guard = handle.write().await;
        let cached: &mut CachedThread = &mut guard;

        if cached
            .summary_tree
            .index
            .end_msg
            .contains_key(&p.branch_off_message_id)
        {
            return Ok(BranchOffOutcome::NoSplit);
        }

        // Pre data: walk parents from the branch-off point, collecting
        // content until an end-of-summary is hit.
        let mut pre_contents_child_to_parent = Vec::new();
        let mut current = Some(p.branch_off_message_id);
        let mut pre_start = p.branch_off_message_id;
        while let Some(id) = current {
            if cached.summary_tree.index.end_msg.contains_key(&id) {
                break;
            }
            let node = cached
                .message_tree
                .get(id)
                .ok_or_else(|| Error::NotFound(format!("message {id}")))?;
            pre_contents_child_to_parent.push(node.content.clone());
            pre_start = id;
            current = node.parent_id;
        }
        let pre_end = p.branch_off_message_id;
        let pre_contents: Vec<String> = pre_contents_child_to_parent.into_iter().rev().collect();
        let pre_content = self.oracle.summarize(&pre_contents).await?;

        let summary_id = *cached
            .summary_tree
            .index
            .start_msg
            .get(&pre_start)
            .ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "message {} is not inside any summary",
                    p.branch_off_message_id
                ))
            })?;

        // Post data: the continuation covers the original-path child of the
        // branch-off point through the split summary's own original end —
        // never past it, regardless of what hangs further below that end.
        let branch_node = cached
            .message_tree
            .get(p.branch_off_message_id)
            .ok_or_else(|| Error::NotFound(format!("message {}", p.branch_off_message_id)))?;
        let post_start = *branch_node
            .child_ids
            .first()
            .ok_or_else(|| Error::InvariantViolation(format!(
                "message {} has no child to continue the post-split summary",
                p.branch_off_message_id
            )))?;
        let post_end = cached
            .summary_tree
            .index
            .by_id
            .get(&summary_id)
            .ok_or_else(|| Error::NotFound(format!("summary {summary_id}")))?
            .end_message_id;
        let mut post_contents = Vec::new();
        let mut current = post_start;
        loop {
            let node = cached
                .message_tree
                .get(current)
                .ok_or_else(|| Error::NotFound(format!("message {current}")))?;
            post_contents.push(node.content.clone());
            if current == post_end {
                break;
            }
            current = node.child_ids.first().copied().ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "message {current} has no child but lies before the end of summary {summary_id}"
                ))
            })?;
        }
        let post_content = self.oracle.summarize(&post_contents).await?;

        self.store.delete_summary(summary_id).await?;
        let pre_id = self
            .store
            .insert_summary(pre_content.clone(), pre_start, pre_end, None)
            .await?;
        let post_id = self
            .store
            .insert_summary(post_content.clone(), post_start, post_end, None)
            .await?;

        cached.summary_tree.split_summary(
            &cached.message_tree,
            summary_id,
            pre_id,
            pre_content,
            p.branch_off_message_id,
            post_id,
            post_content,
        )?;

        info!(%pre_id, %post_id, "split summary");
        Ok(BranchOffOutcome::Split { pre: pre_id, post: post_id })
    }

    /// Best-effort per node: a store failure mid-deletion leaves the
    /// branch partially deleted, but the cache is invalidated regardless
    /// so the next `get` rebuilds a consistent (truncated) state. Callers
    /// re-invoke to finish the deletion.
    #[instrument(skip(self, p), fields(thread_id = %p.thread_id))]
    async fn delete_branch(&self, p: DeleteBranchParams) -> Result<()> {
        let handle = self.get_cached(p.thread_id).await?;
        let result = self.delete_branch_inner(&p, &handle).await;
        self.cache.invalidate(p.thread_id).await;
        result
    }

    async fn delete_branch_inner(
        &self,
        p: &DeleteBranchParams,
        handle: &CachedThreadHandle,
    ) -> Result<()> {
        let cached = handle.read().await;

        let branch_node = cached
            .message_tree
            .get(p.branch_start_message_id)
            .ok_or_else(|| Error::NotFound(format!("message {}", p.branch_start_message_id)))?;

        if let Some(parent) = branch_node.parent_id {
            self.store.delete_link(parent, p.branch_start_message_id).await?;
        }

        let mut stack = vec![p.branch_start_message_id];
        let mut subtree = Vec::new();
        while let Some(id) = stack.pop() {
            subtree.push(id);
            if let Some(node) = cached.message_tree.get(id) {
                stack.extend(node.child_ids.iter().copied());
            }
        }

        for &id in &subtree {
            if let Some(node) = cached.message_tree.get(id) {
                for &child in &node.child_ids {
                    self.store.delete_link(id, child).await?;
                }
            }
        }
        for &id in &subtree {
            self.store.delete_message(id).await?;
        }

        if let Some(&root_summary_id) = cached.summary_tree.index.start_msg.get(&p.branch_start_message_id) {
            let mut sstack = vec![root_summary_id];
            while let Some(sid) = sstack.pop() {
                if let Some(node) = cached.summary_tree.index.by_id.get(&sid) {
                    sstack.extend(node.child_ids.iter().copied());
                }
                self.store.delete_summary(sid).await?;
            }
        }

        info!(deleted = subtree.len(), "deleted branch");
        Ok(())
    }
}
