pub mod group;
pub mod outcome;
pub mod target;

#[cfg(feature = "testing")]
pub mod testing;

pub use group::{CyclePolicy, GroupName, GroupSpec};
pub use outcome::{BoxedError, QueryError, QueryResult};
pub use target::{ConnectionDescriptor, TargetName};
