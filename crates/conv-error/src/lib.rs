#![doc = r#"
conv-error — the error type shared by every crate in the conversation tree
cache and dispatcher workspace.

Guidance
- Library code returns `conv_error::Result<T>` and constructs a structured
  `Error` variant; it never logs or otherwise emits side effects.
- Application code decides how to surface an `Error` (logging, exit code,
  retry) at the boundary.
"#]

use std::fmt;

/// Workspace-wide result alias. Use this throughout library code and
/// propagate failures with `?`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type used across the conversation tree cache workspace.
///
/// Variants correspond to the error kinds named in the design: each one is
/// fatal to the action that raised it and is surfaced to the caller
/// unchanged — nothing in this workspace swallows an `Error`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A referenced id does not exist in the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// In-memory insertion named a parent id that is not present in the tree.
    #[error("unknown parent message {0}")]
    UnknownParent(i64),

    /// An operation would violate a structural invariant: a second root, a
    /// split at an end-of-summary, a branch inside a summarized span.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// `MessageTree::load` found zero or more than one root, or a link
    /// endpoint referencing an unknown message.
    #[error("corrupt tree: {0}")]
    CorruptTree(String),

    /// `SummaryTree::is_summarized` walked into a branch before reaching an
    /// end-of-summary message.
    #[error("ambiguous path at message {0}: branch encountered before end of summary")]
    AmbiguousPath(i64),

    /// `Dispatcher::dispatch_named` received an action name it does not
    /// recognize.
    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// The language oracle failed to produce a result.
    #[error("language oracle error: {0}")]
    OracleError(String),

    /// The language oracle's structured reply (used by `group`) could not
    /// be parsed.
    #[error("failed to parse oracle reply: {0}")]
    ParseError(String),

    /// The durable store failed. Wraps the underlying `sqlx` error so
    /// callers keep the original cause.
    #[error("store error: {0}")]
    StoreError(#[from] StoreErrorSource),
}

/// Wrapper around `sqlx::Error` so `Error` can derive `Clone` (actions may
/// need to retain an error across an `Arc`-shared boundary; `sqlx::Error`
/// itself is not `Clone`).
#[derive(Debug, Clone)]
pub struct StoreErrorSource(pub std::sync::Arc<sqlx::Error>);

impl fmt::Display for StoreErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreErrorSource {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.0)
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        Error::StoreError(StoreErrorSource(std::sync::Arc::new(value)))
    }
}

impl Error {
    /// Coarse classification used by callers deciding whether a failure is
    /// a caller bug (invariant/unsupported action) or an external failure
    /// (store/oracle).
    pub fn is_external(&self) -> bool {
        matches!(self, Error::StoreError(_) | Error::OracleError(_) | Error::ParseError(_))
    }
}
