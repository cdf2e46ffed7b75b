// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

//! Property-based tests for budget evaluation and the safety engine
//!
//! These tests use proptest to generate random snapshots and verify that:
//! 1. Allowed disruptions are never negative
//! 2. Budgets with no policy never block
//! 3. Percentages never over-permit disruption
//! 4. Instances covered by no budget are admitted as unprotected
//! 5. Verdicts depend only on the snapshot

use proptest::prelude::*;

use killer_lib::{
    evaluate, screen, DisruptionBudget, Instance, InstanceVerdict, LabelSelectorSpec, Phase,
    PolicyValue, ProtectionPolicy, SafetyEngine, Selector, VerdictReason,
};

// =============================================================================
// Strategy generators
// =============================================================================

fn phase_strategy() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::Pending),
        Just(Phase::Running),
        Just(Phase::Running),
        Just(Phase::Succeeded),
        Just(Phase::Failed),
        Just(Phase::Unknown),
        Just(Phase::Terminating),
    ]
}

fn instances_strategy() -> impl Strategy<Value = Vec<Instance>> {
    prop::collection::vec(
        (prop_oneof![Just("web"), Just("api")], phase_strategy(), any::<bool>()),
        0..16,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (app, phase, ready))| {
                Instance::new(format!("{}-{}", app, i), "default")
                    .with_label("app", app)
                    .with_phase(phase)
                    .with_ready(ready)
            })
            .collect()
    })
}

fn policy_value_strategy() -> impl Strategy<Value = PolicyValue> {
    prop_oneof![
        (0i32..20).prop_map(PolicyValue::Int),
        (0u32..=100).prop_map(|p| PolicyValue::Str(format!("{}%", p))),
    ]
}

fn web_budget() -> DisruptionBudget {
    DisruptionBudget::new(
        "web-pdb",
        "default",
        LabelSelectorSpec::default().match_label("app", "web"),
    )
}

fn matched_web(instances: &[Instance]) -> i32 {
    instances
        .iter()
        .filter(|i| i.labels.get("app").map(String::as_str) == Some("web"))
        .count() as i32
}

// =============================================================================
// Budget evaluation
// =============================================================================

proptest! {
    #[test]
    fn allowed_is_never_negative(
        instances in instances_strategy(),
        value in policy_value_strategy(),
        use_min in any::<bool>(),
    ) {
        let budget = if use_min {
            web_budget().with_min_available(value)
        } else {
            web_budget().with_max_unavailable(value)
        };
        let status = evaluate(&budget, &instances).unwrap();
        prop_assert!(status.allowed_disruptions >= 0);
        prop_assert!(status.current_healthy <= status.matched);
    }

    #[test]
    fn unconstrained_budget_allows_matched_count(instances in instances_strategy()) {
        let status = evaluate(&web_budget(), &instances).unwrap();
        prop_assert_eq!(status.allowed_disruptions, matched_web(&instances));
        prop_assert_eq!(status.matched, matched_web(&instances));
    }

    #[test]
    fn min_available_percentage_never_under_protects(
        instances in instances_strategy(),
        pct in 0u32..=100,
    ) {
        let budget = web_budget().with_min_available(format!("{}%", pct).as_str());
        let status = evaluate(&budget, &instances).unwrap();
        let exact = f64::from(pct) * f64::from(status.matched) / 100.0;
        prop_assert!(f64::from(status.desired_healthy) >= exact);
        prop_assert!(f64::from(status.desired_healthy) < exact + 1.0);
    }

    #[test]
    fn max_unavailable_percentage_never_over_permits(
        instances in instances_strategy(),
        pct in 0u32..=100,
    ) {
        let budget = web_budget().with_max_unavailable(format!("{}%", pct).as_str());
        let status = evaluate(&budget, &instances).unwrap();
        let exact = f64::from(pct) * f64::from(status.matched) / 100.0;
        prop_assert!(f64::from(status.allowed_disruptions) <= exact);
        prop_assert!(f64::from(status.allowed_disruptions) > exact - 1.0);
    }
}

// =============================================================================
// Safety engine
// =============================================================================

proptest! {
    #[test]
    fn uncovered_instances_are_unprotected(
        instances in instances_strategy(),
        value in policy_value_strategy(),
    ) {
        let budgets = vec![DisruptionBudget::new(
            "cache-pdb",
            "default",
            LabelSelectorSpec::default().match_label("app", "cache"),
        )
        .with_min_available(value)];
        let policy = ProtectionPolicy::default();
        let engine = SafetyEngine::new(&policy, &budgets, &instances);

        for instance in &instances {
            let verdict = engine.can_disrupt(instance);
            prop_assert!(verdict.admitted);
            prop_assert_eq!(verdict.reason, VerdictReason::Unprotected);
        }
    }

    #[test]
    fn exhausted_budget_denies_and_names_itself(
        instances in instances_strategy(),
    ) {
        // maxUnavailable 0 always leaves zero tolerance
        let budgets = vec![web_budget().with_max_unavailable(0)];
        let policy = ProtectionPolicy::default();
        let engine = SafetyEngine::new(&policy, &budgets, &instances);

        for instance in instances.iter().filter(|i| i.labels["app"] == "web") {
            let verdict = engine.can_disrupt(instance);
            prop_assert!(!verdict.admitted);
            prop_assert!(verdict.reason.to_string().contains("web-pdb"));
        }
    }

    #[test]
    fn verdicts_depend_only_on_snapshot(
        instances in instances_strategy(),
        value in policy_value_strategy(),
    ) {
        let budgets = vec![web_budget().with_min_available(value)];
        let policy = ProtectionPolicy::default();
        let target = Selector::everything();

        let first_snapshot = instances.clone();
        let second_snapshot = instances;

        let first_engine = SafetyEngine::new(&policy, &budgets, &first_snapshot);
        let second_engine = SafetyEngine::new(&policy, &budgets, &second_snapshot);

        let first: Vec<InstanceVerdict> = screen(&first_snapshot, &target, &first_engine)
            .iter()
            .map(InstanceVerdict::from)
            .collect();
        let second: Vec<InstanceVerdict> = screen(&second_snapshot, &target, &second_engine)
            .iter()
            .map(InstanceVerdict::from)
            .collect();

        prop_assert_eq!(first, second);
    }
}
