use std::sync::{Arc, OnceLock};
use strum::Display;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a run stopped.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum CancelCause {
    #[strum(to_string = "all query groups completed")]
    AllGroupsComplete,
    #[strum(to_string = "all query groups exited before completing")]
    GroupsExited,
    #[strum(to_string = "deadline exceeded")]
    Deadline,
    #[strum(to_string = "cancelled on first error")]
    FirstError,
    #[strum(to_string = "cancelled")]
    Explicit,
}

/// The authority to cancel a run. Only the supervisor and whoever it hands a
/// clone to (e.g. a Ctrl-C listener) hold one.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    cause: Arc<OnceLock<CancelCause>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the run. Idempotent: only the first cause is recorded.
    pub fn cancel(&self, cause: CancelCause) {
        let _ = self.cause.set(cause);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cause(&self) -> Option<CancelCause> {
        self.cause.get().copied()
    }

    /// Read-only view handed to groups and workers.
    pub fn context(&self, deadline: Option<Instant>) -> ExecutionContext {
        ExecutionContext {
            token: self.token.clone(),
            deadline,
        }
    }
}

/// Shared cancellation signal observed cooperatively by every task of a run.
///
/// Reaching the deadline has the same effect as an explicit cancel.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionContext {
    /// A context nobody can cancel.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Completes once the context is cancelled or its deadline has passed.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}
