//! Unit tests for convergence waiting
//!
//! Time is paused so that deadlines and poll intervals advance instantly.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use documentdb_operator::crd::DocumentDB;
use documentdb_operator::promotion::{
    ControlPlaneError, InMemoryControlPlane, PollState, PromotionError, WaitConfig, poll_once,
    wait_for_convergence,
};

use crate::common::*;

const NS: &str = "default";
const NAME: &str = "sample";

fn fast_config() -> WaitConfig {
    WaitConfig {
        timeout: Duration::from_millis(500),
        poll_interval: Duration::from_millis(20),
    }
}

fn declaration(primary: &str, phase: &str) -> DocumentDB {
    DocumentDBBuilder::new(NAME, NS)
        .with_replication(primary, &["cluster-a", "cluster-b"])
        .with_phase(phase)
        .build()
}

fn plane(name: &str, primary: &str, phase: &str) -> InMemoryControlPlane {
    let plane = InMemoryControlPlane::new(name);
    plane.insert(declaration(primary, phase));
    plane
}

mod poll_tests {
    use super::*;

    #[tokio::test]
    async fn test_poll_states() {
        let hub = plane("hub", "cluster-a", "Ready");
        let secondary = plane("cluster-b", "cluster-a", "Ready");

        let state = poll_once("cluster-b", &hub, Some(&secondary), NS, NAME).await.unwrap();
        assert_eq!(state, PollState::HubPending);

        hub.insert(declaration("cluster-b", "Ready"));
        let state = poll_once("cluster-b", &hub, Some(&secondary), NS, NAME).await.unwrap();
        assert_eq!(state, PollState::SecondaryPending);

        secondary.remove(NS, NAME);
        let state = poll_once("cluster-b", &hub, Some(&secondary), NS, NAME).await.unwrap();
        assert_eq!(state, PollState::SecondaryMissing);

        secondary.insert(declaration("cluster-b", "Cluster in healthy state"));
        let state = poll_once("cluster-b", &hub, Some(&secondary), NS, NAME).await.unwrap();
        assert_eq!(state, PollState::Converged);
    }

    #[tokio::test]
    async fn test_hub_not_found_is_pending() {
        let hub = InMemoryControlPlane::new("hub");
        let state = poll_once("cluster-b", &hub, None, NS, NAME).await.unwrap();
        assert_eq!(state, PollState::HubPending);
    }

    #[tokio::test]
    async fn test_unhealthy_phase_is_pending() {
        let hub = plane("hub", "cluster-b", "Switchover in progress");
        let state = poll_once("cluster-b", &hub, None, NS, NAME).await.unwrap();
        assert_eq!(state, PollState::HubPending);
    }
}

mod wait_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_converges_on_first_poll() {
        let hub = plane("hub", "cluster-b", "Ready");
        let secondary = plane("cluster-b", "cluster-b", "Ready");

        let convergence = wait_for_convergence(
            "cluster-b",
            &hub,
            Some(&secondary),
            NS,
            NAME,
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(convergence.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hub_alone_is_enough_without_secondary() {
        let hub = plane("hub", "cluster-b", "Ready");

        let result = wait_for_convergence(
            "cluster-b",
            &hub,
            None,
            NS,
            NAME,
            &fast_config(),
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hub_only_convergence_times_out() {
        let hub = plane("hub", "cluster-b", "Ready");
        let secondary = plane("cluster-b", "cluster-a", "Ready");

        let err = wait_for_convergence(
            "cluster-b",
            &hub,
            Some(&secondary),
            NS,
            NAME,
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            PromotionError::TimeoutError { timeout, target } => {
                assert_eq!(timeout, Duration::from_millis(500));
                assert_eq!(target, "cluster-b");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(secondary.get_count() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_secondary_times_out() {
        let hub = plane("hub", "cluster-b", "Ready");
        let secondary = InMemoryControlPlane::new("cluster-b");

        let err = wait_for_convergence(
            "cluster-b",
            &hub,
            Some(&secondary),
            NS,
            NAME,
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PromotionError::TimeoutError { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_convergence() {
        let hub = plane("hub", "cluster-b", "Ready");
        let secondary = plane("cluster-b", "cluster-a", "Setting up primary");

        let actor = secondary.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            actor.update(NS, NAME, |db| {
                if let Some(r) = db.spec.cluster_replication.as_mut() {
                    r.primary = "cluster-b".to_string();
                }
                if let Some(s) = db.status.as_mut() {
                    s.status = Some("Cluster in healthy state".to_string());
                }
            });
        });

        let convergence = wait_for_convergence(
            "cluster-b",
            &hub,
            Some(&secondary),
            NS,
            NAME,
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(convergence.polls > 1);
        assert!(convergence.elapsed >= Duration::from_millis(100));
        assert!(convergence.elapsed < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_ends_wait() {
        let hub = plane("hub", "cluster-b", "Ready");
        let secondary = plane("cluster-b", "cluster-a", "Ready");
        secondary.fail_next_get(ControlPlaneError::Unavailable("member unreachable".to_string()));

        let err = wait_for_convergence(
            "cluster-b",
            &hub,
            Some(&secondary),
            NS,
            NAME,
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            PromotionError::FetchError { plane, .. } => assert_eq!(plane, "cluster-b"),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_slow_fetch() {
        let hub = plane("hub", "cluster-a", "Ready");
        hub.set_latency(Duration::from_secs(600));

        let config = WaitConfig {
            timeout: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(10),
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = wait_for_convergence("cluster-b", &hub, None, NS, NAME, &config, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, PromotionError::CancelledError { .. }));
        assert!(started.elapsed() < config.poll_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_slow_fetch() {
        let hub = plane("hub", "cluster-a", "Ready");
        hub.set_latency(Duration::from_secs(600));

        let started = Instant::now();
        let err = wait_for_convergence(
            "cluster-b",
            &hub,
            None,
            NS,
            NAME,
            &fast_config(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PromotionError::TimeoutError { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled() {
        let hub = plane("hub", "cluster-b", "Ready");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = wait_for_convergence("cluster-b", &hub, None, NS, NAME, &fast_config(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PromotionError::CancelledError { .. }));
        assert_eq!(hub.get_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_durations_are_rejected() {
        let hub = plane("hub", "cluster-b", "Ready");
        let cancel = CancellationToken::new();

        for config in [
            WaitConfig {
                poll_interval: Duration::ZERO,
                ..fast_config()
            },
            WaitConfig {
                timeout: Duration::ZERO,
                ..fast_config()
            },
        ] {
            let err = wait_for_convergence("cluster-b", &hub, None, NS, NAME, &config, &cancel)
                .await
                .unwrap_err();
            assert!(matches!(err, PromotionError::ConfigurationError(_)));
        }
        assert_eq!(hub.get_count(), 0);
    }
}
