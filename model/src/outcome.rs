use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::group::GroupName;
use crate::target::TargetName;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Error outcome emitted on a group's error sink.
///
/// None of these abort the run; a statement fault only skips that statement,
/// a connection fault only skips that work item.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("no work items to run in query group {group}")]
    EmptyGroup { group: GroupName },

    #[error("connection descriptor for {target} is empty")]
    MissingDescriptor { target: TargetName },

    #[error("error connecting to {target}: {source}")]
    Connect {
        target: TargetName,
        #[source]
        source: BoxedError,
    },

    #[error("error on {target} executing {statement}: {source}")]
    Statement {
        target: TargetName,
        statement: String,
        #[source]
        source: BoxedError,
    },
}

impl QueryError {
    /// Label of the target the error belongs to, or the group for group-level errors.
    pub fn target(&self) -> &str {
        match self {
            Self::EmptyGroup { group } => group,
            Self::MissingDescriptor { target }
            | Self::Connect { target, .. }
            | Self::Statement { target, .. } => target,
        }
    }

    pub fn statement(&self) -> Option<&str> {
        match self {
            Self::Statement { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

/// Result outcome of one successful statement execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub group: GroupName,
    pub target: TargetName,
    pub iteration: usize,
    pub elapsed: Duration,
    pub statement: String,
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = format!("{}:{}", self.group, self.target);
        write!(
            f,
            "[{label:<20}:{:02}] {:.3}s {}",
            self.iteration,
            self.elapsed.as_secs_f64(),
            self.statement
        )
    }
}
