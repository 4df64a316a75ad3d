use crate::context::ExecutionContext;
use async_trait::async_trait;
use model::{QueryError, QueryResult};
use tracing::debug;

/// Sending halves of a group's error and result sinks.
#[derive(Clone, Debug)]
pub struct OutcomeSinks {
    errors: flume::Sender<QueryError>,
    results: flume::Sender<QueryResult>,
}

impl OutcomeSinks {
    pub fn new(errors: flume::Sender<QueryError>, results: flume::Sender<QueryResult>) -> Self {
        Self { errors, results }
    }

    pub fn error(&self, error: QueryError) {
        if let Err(flume::SendError(error)) = self.errors.send(error) {
            debug!("Error sink closed, dropping: {error}");
        }
    }

    pub fn result(&self, result: QueryResult) {
        if self.results.send(result).is_err() {
            debug!("Result sink closed");
        }
    }
}

/// One target and the statements to run against it.
///
/// `execute` never fails from the caller's point of view: every fault is
/// reported on `sinks`, except faults caused by `ctx` being cancelled, which
/// are dropped.
#[async_trait]
pub trait WorkItem: Send + Sync {
    fn target(&self) -> &str;

    async fn execute(&self, ctx: &ExecutionContext, group: &str, sinks: &OutcomeSinks);
}
