use crate::group::GroupSpec;
use proptest::prelude::*;

pub fn arb_target_name() -> impl Strategy<Value = String> {
    proptest::string::string_regex("db_[a-z0-9_]{1,15}").unwrap()
}

pub fn arb_statement() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("select 1".to_string()),
        (0..100u32).prop_map(|ms| format!("select pg_sleep({})", ms as f64 / 1000.0)),
        "[a-z_]{1,20}".prop_map(|f| format!("select * from {f}()")),
    ]
}

prop_compose! {
    /// A group specification that satisfies every configuration constraint.
    pub fn arb_group_spec()(
        targets in prop::collection::vec(arb_target_name(), 1..10),
        statements in prop::collection::vec(arb_statement(), 1..5),
        iterations in 1..10usize,
    )(
        concurrency in 1..=targets.len(),
        targets in Just(targets),
        statements in Just(statements),
        iterations in Just(iterations),
    ) -> GroupSpec {
        GroupSpec { targets, concurrency, iterations, statements }
    }
}

/// A group specification that violates exactly one configuration constraint.
pub fn arb_invalid_group_spec() -> impl Strategy<Value = GroupSpec> {
    arb_group_spec().prop_flat_map(|spec| {
        let too_many = spec.targets.len() + 1..spec.targets.len() + 10;
        prop_oneof![
            Just(GroupSpec {
                concurrency: 0,
                ..spec.clone()
            }),
            too_many.prop_map({
                let spec = spec.clone();
                move |concurrency| GroupSpec {
                    concurrency,
                    ..spec.clone()
                }
            }),
            Just(GroupSpec {
                iterations: 0,
                ..spec.clone()
            }),
            Just(GroupSpec {
                statements: vec![],
                ..spec
            }),
        ]
    })
}
