#[cfg(feature = "testing")]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::target::TargetName;

pub type GroupName = String;

/// One named entry of the configuration file.
///
/// Missing keys deserialize to their empty value so that validation, not the
/// YAML parser, reports what is wrong with the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSpec {
    #[serde(alias = "databases")]
    pub targets: Vec<TargetName>,
    pub concurrency: usize,
    pub iterations: usize,
    #[serde(alias = "queries")]
    pub statements: Vec<String>,
}

impl GroupSpec {
    pub fn new(targets: Vec<TargetName>, statements: Vec<String>) -> Self {
        Self {
            concurrency: targets.len(),
            targets,
            iterations: 1,
            statements,
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }
}

/// How a group's producer feeds work items to its workers.
#[cfg_attr(feature = "testing", derive(Arbitrary))]
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum CyclePolicy {
    /// Re-offer work items round-robin until the run is cancelled.
    #[default]
    CycleForever,
    /// Offer every work item exactly once, then close the queue.
    SinglePass,
}

impl CyclePolicy {
    pub fn from_dont_cycle(dont_cycle: bool) -> Self {
        if dont_cycle {
            Self::SinglePass
        } else {
            Self::CycleForever
        }
    }

    pub fn is_single_pass(self) -> bool {
        self == Self::SinglePass
    }
}
