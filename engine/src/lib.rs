//! Query-group execution engine.
//!
//! A [`QueryGroup`] feeds its work items to a fixed pool of workers; the
//! [`Supervisor`] runs every group under one shared [`ExecutionContext`], fans
//! their outcomes into a single loop and decides when the run is over.

pub mod context;
pub mod group;
pub mod postgres;
pub mod query;
pub mod supervisor;
pub mod work_item;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::{CancelCause, CancelHandle, ExecutionContext};
pub use group::{GroupReceivers, QueryGroup};
pub use postgres::PgConnector;
pub use query::{Connector, DbQuery, Session};
pub use supervisor::{RunOptions, RunReport, Supervisor, run};
pub use work_item::{OutcomeSinks, WorkItem};
