use crate::options::Options;
use config::Config;
use engine::{DbQuery, QueryGroup};
use tracing::debug;

/// Builds one query group per configured group, with one PostgreSQL work item
/// per target.
pub fn build_groups(config: &Config, options: &Options) -> Vec<QueryGroup> {
    let policy = options.cycle_policy();
    config
        .groups()
        .map(|(name, spec)| {
            let mut group = QueryGroup::new(name.clone(), spec.concurrency, policy);
            for target in &spec.targets {
                group.add_work_item(DbQuery::new(
                    target.clone(),
                    options.descriptor(target),
                    spec.iterations,
                    spec.statements.clone(),
                ));
            }
            debug!(
                "Query group {name}: {} targets, concurrency {}, {} iterations",
                spec.targets.len(),
                spec.concurrency,
                spec.iterations
            );
            group
        })
        .collect()
}
