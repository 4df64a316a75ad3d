//! In-memory work items and connectors for exercising groups and the
//! supervisor without a database.

use crate::context::{CancelCause, CancelHandle, ExecutionContext};
use crate::group::GroupReceivers;
use crate::query::{Connector, Session};
use crate::work_item::{OutcomeSinks, WorkItem};
use async_trait::async_trait;
use model::{BoxedError, ConnectionDescriptor, QueryError, QueryResult, TargetName};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Standalone sinks whose completion channel never receives anything.
pub fn sinks() -> (OutcomeSinks, GroupReceivers) {
    let (error_tx, error_rx) = flume::unbounded();
    let (result_tx, result_rx) = flume::unbounded();
    let (_, done_rx) = flume::unbounded();
    (
        OutcomeSinks::new(error_tx, result_tx),
        GroupReceivers {
            errors: error_rx,
            results: result_rx,
            done: done_rx,
        },
    )
}

#[derive(Debug, Default)]
pub struct Outcomes {
    pub errors: Vec<QueryError>,
    pub results: Vec<QueryResult>,
    pub done: usize,
}

/// Collects everything currently buffered in `receivers`.
pub fn drain(receivers: &GroupReceivers) -> Outcomes {
    Outcomes {
        errors: receivers.errors.try_iter().collect(),
        results: receivers.results.try_iter().collect(),
        done: receivers.done.try_iter().count(),
    }
}

#[derive(Clone, Copy, Debug)]
enum Behavior {
    Succeed,
    Fail,
    Sleep(Duration),
}

/// A work item with a fixed outcome that counts how often it was started.
#[derive(Debug)]
pub struct MockWorkItem {
    target: TargetName,
    behavior: Behavior,
    executions: Arc<AtomicUsize>,
}

impl MockWorkItem {
    fn with_behavior(target: impl Into<TargetName>, behavior: Behavior) -> Self {
        Self {
            target: target.into(),
            behavior,
            executions: Arc::default(),
        }
    }

    pub fn succeeding(target: impl Into<TargetName>) -> Self {
        Self::with_behavior(target, Behavior::Succeed)
    }

    pub fn failing(target: impl Into<TargetName>) -> Self {
        Self::with_behavior(target, Behavior::Fail)
    }

    /// Emits one result after `duration`, or nothing if cancelled first.
    pub fn sleeping(target: impl Into<TargetName>, duration: Duration) -> Self {
        Self::with_behavior(target, Behavior::Sleep(duration))
    }

    pub fn executions(&self) -> Arc<AtomicUsize> {
        self.executions.clone()
    }

    fn result(&self, group: &str, started: Instant) -> QueryResult {
        QueryResult {
            group: group.to_owned(),
            target: self.target.clone(),
            iteration: 1,
            elapsed: started.elapsed(),
            statement: "select 1".to_owned(),
        }
    }
}

#[async_trait]
impl WorkItem for MockWorkItem {
    fn target(&self) -> &str {
        &self.target
    }

    async fn execute(&self, ctx: &ExecutionContext, group: &str, sinks: &OutcomeSinks) {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        match self.behavior {
            Behavior::Succeed => sinks.result(self.result(group, started)),
            Behavior::Fail => sinks.error(QueryError::Statement {
                target: self.target.clone(),
                statement: "select 1".to_owned(),
                source: "mock failure".into(),
            }),
            Behavior::Sleep(duration) => {
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => {}
                    _ = tokio::time::sleep(duration) => sinks.result(self.result(group, started)),
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    executed: Mutex<Vec<String>>,
    connects: AtomicUsize,
    closed: AtomicBool,
}

/// Connector whose sessions interpret statements as instructions:
///
/// * `sleep N` waits N milliseconds, then succeeds
/// * anything containing `fail` returns an error
/// * `cancel` cancels the configured handle, then returns an error
/// * everything else succeeds immediately
#[derive(Clone, Debug, Default)]
pub struct ScriptedConnector {
    state: Arc<ScriptState>,
    refuse: bool,
    cancel: Option<CancelHandle>,
}

impl ScriptedConnector {
    /// Every connection attempt fails.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn cancelling(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }

    /// Statements in the order sessions received them.
    pub fn executed(&self) -> Vec<String> {
        self.state
            .executed
            .lock()
            .map(|executed| executed.clone())
            .unwrap_or_default()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

pub struct ScriptedSession {
    state: Arc<ScriptState>,
    cancel: Option<CancelHandle>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn connect(&self, _descriptor: &ConnectionDescriptor) -> Result<ScriptedSession, BoxedError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err("connection refused".into());
        }
        Ok(ScriptedSession {
            state: self.state.clone(),
            cancel: self.cancel.clone(),
        })
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&mut self, statement: &str) -> Result<(), BoxedError> {
        if let Ok(mut executed) = self.state.executed.lock() {
            executed.push(statement.to_owned());
        }

        if let Some(millis) = statement.strip_prefix("sleep ") {
            let millis: u64 = millis.trim().parse()?;
            tokio::time::sleep(Duration::from_millis(millis)).await;
            return Ok(());
        }
        if statement == "cancel" {
            if let Some(handle) = &self.cancel {
                handle.cancel(CancelCause::Explicit);
            }
            return Err("canceling statement due to user request".into());
        }
        if statement.contains("fail") {
            return Err(format!("syntax error at or near \"{statement}\"").into());
        }
        Ok(())
    }

    async fn close(self) -> Result<(), BoxedError> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
