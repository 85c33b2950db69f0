//! Tagged action surface. `dispatch_named` is the only string-keyed
//! boundary — it parses into an [`Action`] immediately and nowhere else in
//! the crate matches on action names.

use conv_core::{MessageId, ThreadId};
use conv_error::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AddMessageParams {
    pub thread_id: ThreadId,
    pub content: String,
    pub prev_message_id: Option<MessageId>,
    pub trigger_summarization: bool,
    pub summary_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchOffParams {
    pub thread_id: ThreadId,
    pub branch_off_message_id: MessageId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteBranchParams {
    pub thread_id: ThreadId,
    pub branch_start_message_id: MessageId,
}

#[derive(Debug, Clone)]
pub enum Action {
    AddMessage(AddMessageParams),
    BranchOff(BranchOffParams),
    DeleteBranch(DeleteBranchParams),
}

impl Action {
    /// Parses `(action_name, payload)` into a variant. This is the single
    /// point where a string name is matched against the action surface.
    pub fn from_named(action_name: &str, payload: serde_json::Value) -> Result<Self> {
        match action_name {
            "add_message" => Ok(Action::AddMessage(
                serde_json::from_value(payload).map_err(|e| Error::ParseError(e.to_string()))?,
            )),
            "branch_off" => Ok(Action::BranchOff(
                serde_json::from_value(payload).map_err(|e| Error::ParseError(e.to_string()))?,
            )),
            "delete_branch" => Ok(Action::DeleteBranch(
                serde_json::from_value(payload).map_err(|e| Error::ParseError(e.to_string()))?,
            )),
            other => Err(Error::UnsupportedAction(other.to_string())),
        }
    }
}

/// Result of a split, or the sentinel for when the precondition for
/// `branch_off` reduced to a no-op (the branch-off point was already an
/// existing summary's end).
#[derive(Debug, Clone, PartialEq)]
pub enum BranchOffOutcome {
    Split {
        pre: conv_core::SummaryId,
        post: conv_core::SummaryId,
    },
    NoSplit,
}

#[derive(Debug, Clone)]
pub enum ActionOutcome {
    MessageId(MessageId),
    BranchOff(BranchOffOutcome),
    Unit,
}
