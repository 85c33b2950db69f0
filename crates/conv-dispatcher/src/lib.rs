//! Public action surface over the conversation tree cache: `add_message`,
//! `branch_off`, `delete_branch`.

pub mod action;
pub mod dispatcher;

pub use action::{
    Action, ActionOutcome, AddMessageParams, BranchOffOutcome, BranchOffParams, DeleteBranchParams,
};
pub use dispatcher::{Dispatcher, DispatcherConfig};
