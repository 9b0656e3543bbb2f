//! Runs that stop early: failed preconditions, operator aborts and bad capacity.

mod support;

use ecsroll_core::prelude::*;
use support::{ScriptedPrompter, config, run_with};

// =========================================================================
// Precondition failures
// =========================================================================

#[test]
fn missing_cluster_fails_before_any_prompt() {
    let sim = SimulatedCloud::new("prod", "prod-asg", &["i-a"]).without_cluster();
    let mut prompter = ScriptedPrompter::yes();

    let (result, reporter, pauses) = run_with(&sim, &config(Action::Replace), &mut prompter);

    let err = result.unwrap_err();
    assert!(matches!(err, RollError::ClusterNotFound { ref cluster } if cluster == "prod"));
    assert!(!err.needs_manual_cleanup());
    assert!(prompter.seen.is_empty());
    assert!(reporter.reports.is_empty());
    assert_eq!(pauses, 0);
    assert!(sim.calls().is_empty());
}

#[test]
fn instances_in_two_groups_are_rejected() {
    let sim = SimulatedCloud::new("prod", "prod-asg", &["i-a", "i-b"])
        .with_foreign_membership("i-b", "other-asg");
    let mut prompter = ScriptedPrompter::yes();

    let (result, _, _) = run_with(&sim, &config(Action::Reboot), &mut prompter);

    match result.unwrap_err() {
        RollError::AmbiguousCapacityGroup { groups, .. } => {
            assert_eq!(groups, vec!["other-asg", "prod-asg"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(prompter.seen.is_empty());
    assert!(sim.calls().is_empty());
}

#[test]
fn empty_cluster_has_no_capacity_group() {
    let sim = SimulatedCloud::new("prod", "prod-asg", &[]);
    let mut prompter = ScriptedPrompter::yes();

    let (result, _, _) = run_with(&sim, &config(Action::Replace), &mut prompter);

    assert!(matches!(
        result.unwrap_err(),
        RollError::NoCapacityGroup { .. }
    ));
    assert!(sim.calls().is_empty());
}

#[test]
fn misconfigured_group_bounds_are_never_written() {
    let sim = SimulatedCloud::new("prod", "prod-asg", &["i-a", "i-b"])
        .with_bounds(CapacityBounds::new(2, 2, 3));
    let mut prompter = ScriptedPrompter::yes();

    let (result, _, _) = run_with(&sim, &config(Action::Replace), &mut prompter);

    assert!(matches!(
        result.unwrap_err(),
        RollError::InvalidCapacity { ref group, .. } if group == "prod-asg"
    ));
    assert!(
        !sim.calls()
            .iter()
            .any(|c| matches!(c, SimCall::UpdateGroup(_)))
    );
}

// =========================================================================
// Operator aborts
// =========================================================================

#[test]
fn declining_the_cluster_prompt_changes_nothing() {
    let sim = SimulatedCloud::new("prod", "prod-asg", &["i-a", "i-b"]);
    let before = sim.bounds();
    let mut prompter = ScriptedPrompter::answering(&[false]);

    let (result, _, _) = run_with(&sim, &config(Action::Replace), &mut prompter);

    let err = result.unwrap_err();
    assert!(
        matches!(err, RollError::Aborted { ref prompt } if prompt == "Continue, working with ECS cluster 'prod'?")
    );
    assert_eq!(prompter.seen.len(), 1);
    assert!(sim.calls().is_empty());
    assert_eq!(sim.bounds(), before);
}

#[test]
fn declining_the_cycle_prompt_changes_nothing() {
    let sim = SimulatedCloud::new("prod", "prod-asg", &["i-a"]);
    let mut prompter = ScriptedPrompter::declining("Initiate");

    let (result, reporter, _) = run_with(&sim, &config(Action::Reboot), &mut prompter);

    assert!(matches!(result.unwrap_err(), RollError::Aborted { .. }));
    assert_eq!(prompter.seen.len(), 3);
    assert_eq!(reporter.headings(), vec!["ECS cluster 'prod' members:"]);
    assert!(sim.calls().is_empty());
}

#[test]
fn abort_mid_run_leaves_buffer_capacity_in_place() {
    let sim = SimulatedCloud::new("prod", "prod-asg", &["i-a", "i-b"]);
    let before = sim.bounds();
    let mut prompter = ScriptedPrompter::declining("Drain and terminate");

    let (result, _, _) = run_with(&sim, &config(Action::Replace), &mut prompter);

    let err = result.unwrap_err();
    assert!(matches!(err, RollError::Aborted { .. }));
    assert!(err.needs_manual_cleanup());
    assert_eq!(sim.bounds(), before.shifted(1));
    assert!(
        !sim.calls()
            .iter()
            .any(|c| matches!(c, SimCall::Terminate(_) | SimCall::SetStatus { .. }))
    );
}

#[test]
fn declining_to_keep_waiting_aborts() {
    // The group already wants more instances than the cluster has, so the size
    // check after scale-up overshoots the expected count.
    let sim = SimulatedCloud::new("prod", "prod-asg", &["i-a"])
        .with_bounds(CapacityBounds::new(2, 4, 3));
    let mut prompter = ScriptedPrompter::declining("keep waiting");

    let (result, _, _) = run_with(&sim, &config(Action::Reboot), &mut prompter);

    match result.unwrap_err() {
        RollError::Aborted { prompt } => {
            assert_eq!(
                prompt,
                "There are currently 4 instances, but expecting 2 - keep waiting?"
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}
