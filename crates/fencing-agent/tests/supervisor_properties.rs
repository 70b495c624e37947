//! Property-based tests for supervisor invariants over arbitrary tick
//! sequences, including injected failures.

mod common;

use common::{Event, TICK, harness};
use fencing_agent::{ArmState, SupervisorMode};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use tokio::time;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
struct Step {
    reachable: bool,
    in_maintenance: bool,
    fail_feed: bool,
    fail_stop: bool,
    fail_set: bool,
    fail_remove: bool,
}

fn step() -> impl Strategy<Value = Step> {
    (
        any::<bool>(),
        any::<bool>(),
        prop::bool::weighted(0.1),
        prop::bool::weighted(0.1),
        prop::bool::weighted(0.1),
        prop::bool::weighted(0.1),
    )
        .prop_map(
            |(reachable, in_maintenance, fail_feed, fail_stop, fail_set, fail_remove)| Step {
                reachable,
                in_maintenance,
                fail_feed,
                fail_stop,
                fail_set,
                fail_remove,
            },
        )
}

fn runtime() -> Result<tokio::runtime::Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_normal_and_armed_implies_marked(steps in prop::collection::vec(step(), 1..48)) {
        runtime()?.block_on(async {
            let (mut supervisor, cluster) = harness().map_err(|e| TestCaseError::fail(e.to_string()))?;
            let cancel = CancellationToken::new();
            supervisor.start().await.map_err(|e| TestCaseError::fail(e.to_string()))?;

            for step in steps {
                cluster.observe(step.reachable, step.in_maintenance);
                cluster.fail_feed(step.fail_feed);
                cluster.fail_stop(step.fail_stop);
                cluster.fail_set_marker(step.fail_set);
                cluster.fail_remove_marker(step.fail_remove);

                time::sleep(TICK).await;
                prop_assert!(supervisor.tick(&cancel).await.is_continue());

                let status = supervisor.status();
                prop_assert_eq!(status.marked, cluster.label_present());
                if status.mode == SupervisorMode::Normal {
                    prop_assert_eq!(status.watchdog, ArmState::Armed);
                    prop_assert!(cluster.label_present());
                }
                // An unstoppable driver is the only way to stay armed without
                // the marker, whatever the mode.
                if !step.fail_stop && status.watchdog == ArmState::Armed {
                    prop_assert!(cluster.label_present(), "armed without marker in {:?}", status.mode);
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_no_feed_while_in_maintenance(steps in prop::collection::vec(step(), 1..48)) {
        runtime()?.block_on(async {
            let (mut supervisor, cluster) = harness().map_err(|e| TestCaseError::fail(e.to_string()))?;
            let cancel = CancellationToken::new();
            supervisor.start().await.map_err(|e| TestCaseError::fail(e.to_string()))?;

            for step in steps {
                cluster.observe(step.reachable, step.in_maintenance);
                cluster.fail_stop(step.fail_stop);
                cluster.fail_set_marker(step.fail_set);
                cluster.fail_remove_marker(step.fail_remove);
                cluster.take_attempts();

                time::sleep(TICK).await;
                prop_assert!(supervisor.tick(&cancel).await.is_continue());

                if supervisor.status().mode == SupervisorMode::Maintenance {
                    prop_assert!(!cluster.take_attempts().contains(&Event::Feed));
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_shutdown_always_unmarks_and_disarms(steps in prop::collection::vec(step(), 0..32)) {
        runtime()?.block_on(async {
            let (mut supervisor, cluster) = harness().map_err(|e| TestCaseError::fail(e.to_string()))?;
            let cancel = CancellationToken::new();
            supervisor.start().await.map_err(|e| TestCaseError::fail(e.to_string()))?;

            for step in steps {
                cluster.observe(step.reachable, step.in_maintenance);
                cluster.fail_stop(step.fail_stop);
                cluster.fail_set_marker(step.fail_set);
                cluster.fail_remove_marker(step.fail_remove);
                time::sleep(TICK).await;
                prop_assert!(supervisor.tick(&cancel).await.is_continue());
            }

            cluster.fail_stop(false);
            cluster.fail_remove_marker(false);
            cluster.take_attempts();
            prop_assert!(supervisor.shutdown().await.is_ok());
            prop_assert_eq!(cluster.take_attempts(), vec![Event::RemoveMarker, Event::Stop]);
            prop_assert!(!cluster.label_present());
            prop_assert_eq!(supervisor.status().watchdog, ArmState::Disarmed);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
