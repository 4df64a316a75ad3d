use crate::context::ExecutionContext;
use crate::postgres::PgConnector;
use crate::work_item::{OutcomeSinks, WorkItem};
use async_trait::async_trait;
use model::{BoxedError, ConnectionDescriptor, QueryError, QueryResult, TargetName};
use tokio::time::Instant;
use tracing::debug;

/// Opens sessions against a target.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Self::Session, BoxedError>;
}

/// An open connection able to run statements.
#[async_trait]
pub trait Session: Send {
    async fn execute(&mut self, statement: &str) -> Result<(), BoxedError>;

    async fn close(self) -> Result<(), BoxedError>;
}

/// Runs `statements` against one database `iterations` times over a single
/// connection.
pub struct DbQuery<C = PgConnector> {
    target: TargetName,
    descriptor: ConnectionDescriptor,
    iterations: usize,
    statements: Vec<String>,
    connector: C,
}

impl DbQuery {
    pub fn new(
        target: impl Into<TargetName>,
        descriptor: ConnectionDescriptor,
        iterations: usize,
        statements: Vec<String>,
    ) -> Self {
        Self {
            target: target.into(),
            descriptor,
            iterations,
            statements,
            connector: PgConnector,
        }
    }
}

impl<C: Connector> DbQuery<C> {
    pub fn with_connector<D: Connector>(self, connector: D) -> DbQuery<D> {
        DbQuery {
            target: self.target,
            descriptor: self.descriptor,
            iterations: self.iterations,
            statements: self.statements,
            connector,
        }
    }

    async fn run_statements(
        &self,
        session: &mut C::Session,
        ctx: &ExecutionContext,
        group: &str,
        sinks: &OutcomeSinks,
    ) {
        for iteration in 1..=self.iterations {
            for statement in &self.statements {
                if ctx.is_cancelled() {
                    return;
                }

                let started = Instant::now();
                let executed = tokio::select! {
                    biased;
                    _ = ctx.cancelled() => None,
                    executed = session.execute(statement) => Some(executed),
                };

                match executed {
                    None => return,
                    Some(Ok(())) => sinks.result(QueryResult {
                        group: group.to_owned(),
                        target: self.target.clone(),
                        iteration,
                        elapsed: started.elapsed(),
                        statement: statement.clone(),
                    }),
                    // Raised because the run is shutting down, not a real fault.
                    Some(Err(_)) if ctx.is_cancelled() => return,
                    Some(Err(source)) => sinks.error(QueryError::Statement {
                        target: self.target.clone(),
                        statement: statement.clone(),
                        source,
                    }),
                }
            }
        }
    }
}

#[async_trait]
impl<C: Connector> WorkItem for DbQuery<C> {
    fn target(&self) -> &str {
        &self.target
    }

    async fn execute(&self, ctx: &ExecutionContext, group: &str, sinks: &OutcomeSinks) {
        if self.descriptor.is_empty() {
            sinks.error(QueryError::MissingDescriptor {
                target: self.target.clone(),
            });
            return;
        }
        if ctx.is_cancelled() {
            return;
        }

        let connected = tokio::select! {
            biased;
            _ = ctx.cancelled() => return,
            connected = self.connector.connect(&self.descriptor) => connected,
        };
        let mut session = match connected {
            Ok(session) => session,
            Err(_) if ctx.is_cancelled() => return,
            Err(source) => {
                sinks.error(QueryError::Connect {
                    target: self.target.clone(),
                    source,
                });
                return;
            }
        };

        self.run_statements(&mut session, ctx, group, sinks).await;

        if let Err(e) = session.close().await {
            debug!("Failed to close connection to {}: {e}", self.target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CancelCause, CancelHandle};
    use crate::testing::{Outcomes, ScriptedConnector, drain, sinks};
    use std::time::Duration;

    fn statements(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn query(connector: ScriptedConnector, iterations: usize, list: &[&str]) -> DbQuery<ScriptedConnector> {
        DbQuery::new("db_1", "scripted://db_1".into(), iterations, statements(list))
            .with_connector(connector)
    }

    #[tokio::test]
    async fn test_runs_every_statement_every_iteration() {
        let connector = ScriptedConnector::default();
        let item = query(connector.clone(), 2, &["select 1", "select 2"]);
        let (sinks, receivers) = sinks();

        assert_eq!(item.target(), "db_1");
        item.execute(&ExecutionContext::background(), "g1", &sinks).await;

        let Outcomes { errors, results, .. } = drain(&receivers);
        assert!(errors.is_empty());
        assert_eq!(
            connector.executed(),
            statements(&["select 1", "select 2", "select 1", "select 2"])
        );
        let iterations: Vec<_> = results.iter().map(|r| (r.iteration, r.statement.as_str())).collect();
        assert_eq!(
            iterations,
            vec![(1, "select 1"), (1, "select 2"), (2, "select 1"), (2, "select 2")]
        );
        assert!(results.iter().all(|r| r.group == "g1" && r.target == "db_1"));
        assert!(connector.closed());
    }

    #[tokio::test]
    async fn test_failing_statement_does_not_abort_iteration() {
        let connector = ScriptedConnector::default();
        let item = query(connector.clone(), 2, &["select 1", "fail here", "select 2"]);
        let (sinks, receivers) = sinks();

        item.execute(&ExecutionContext::background(), "g2", &sinks).await;

        let Outcomes { errors, results, .. } = drain(&receivers);
        assert_eq!(results.len(), 4);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.statement() == Some("fail here")));
        assert_eq!(connector.executed().len(), 6);
        assert!(connector.closed());
    }

    #[tokio::test]
    async fn test_empty_descriptor_is_reported_without_connecting() {
        let connector = ScriptedConnector::default();
        let item = DbQuery::new("db_1", ConnectionDescriptor::default(), 1, statements(&["select 1"]))
            .with_connector(connector.clone());
        let (sinks, receivers) = sinks();

        item.execute(&ExecutionContext::background(), "g", &sinks).await;

        let Outcomes { errors, results, .. } = drain(&receivers);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], QueryError::MissingDescriptor { ref target } if target == "db_1"));
        assert!(results.is_empty());
        assert_eq!(connector.connect_attempts(), 0);
    }

    #[tokio::test]
    async fn test_connection_failure_is_one_error() {
        let connector = ScriptedConnector::refusing();
        let item = query(connector.clone(), 3, &["select 1", "select 2"]);
        let (sinks, receivers) = sinks();

        item.execute(&ExecutionContext::background(), "g", &sinks).await;

        let Outcomes { errors, results, .. } = drain(&receivers);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], QueryError::Connect { .. }));
        assert!(results.is_empty());
        assert!(connector.executed().is_empty());
    }

    #[tokio::test]
    async fn test_errors_caused_by_cancellation_are_swallowed() {
        let handle = CancelHandle::new();
        let connector = ScriptedConnector::default().cancelling(handle.clone());
        let item = query(connector.clone(), 5, &["select 1", "cancel", "select 2"]);
        let (sinks, receivers) = sinks();

        item.execute(&handle.context(None), "g", &sinks).await;

        let Outcomes { errors, results, .. } = drain(&receivers);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(results.len(), 1);
        assert_eq!(connector.executed(), statements(&["select 1", "cancel"]));
        assert!(connector.closed(), "connection must be released on cancellation");
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_connecting() {
        let handle = CancelHandle::new();
        handle.cancel(CancelCause::Explicit);
        let connector = ScriptedConnector::default();
        let item = query(connector.clone(), 1, &["select 1"]);
        let (sinks, receivers) = sinks();

        item.execute(&handle.context(None), "g", &sinks).await;

        let Outcomes { errors, results, .. } = drain(&receivers);
        assert!(errors.is_empty() && results.is_empty());
        assert_eq!(connector.connect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_in_flight_statement() {
        let handle = CancelHandle::new();
        let connector = ScriptedConnector::default();
        let item = query(connector.clone(), 1, &["sleep 1000", "select 1"]);
        let (sinks, receivers) = sinks();

        let ctx = handle.context(None);
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel(CancelCause::Explicit);
        });
        let started = Instant::now();
        item.execute(&ctx, "g", &sinks).await;
        canceller.await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(1000));
        let Outcomes { errors, results, .. } = drain(&receivers);
        assert!(errors.is_empty() && results.is_empty());
        assert_eq!(connector.executed(), statements(&["sleep 1000"]));
        assert!(connector.closed());
    }
}
