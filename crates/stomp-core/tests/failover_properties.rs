//! Property-based tests for the failover reconnect scheduler.
//!
//! These verify the scheduling invariants that must hold for any policy, not
//! just the handful of concrete scenarios covered by `failover.rs`'s unit
//! tests.

use proptest::prelude::*;
use stomp_core::{
    FailoverBroker, FailoverProtocol, FailoverUri, ReconnectPolicy, SystemEnvironment,
};

fn arbitrary_brokers() -> impl Strategy<Value = Vec<FailoverBroker>> {
    prop::collection::vec(1u16..=5, 1..=5).prop_map(|ports| {
        ports
            .into_iter()
            .enumerate()
            .map(|(i, port)| FailoverBroker { protocol: "tcp".to_string(), host: format!("host{i}"), port })
            .collect()
    })
}

fn arbitrary_policy() -> impl Strategy<Value = ReconnectPolicy> {
    (any::<bool>(), 0u32..5, any::<bool>()).prop_map(|(randomize, max_reconnect_attempts, priority_backup)| {
        ReconnectPolicy {
            max_reconnect_attempts: Some(max_reconnect_attempts),
            randomize,
            priority_backup,
            ..ReconnectPolicy::default()
        }
    })
}

fn arbitrary_uri() -> impl Strategy<Value = FailoverUri> {
    (arbitrary_brokers(), arbitrary_policy()).prop_map(|(brokers, policy)| FailoverUri { brokers, policy })
}

proptest! {
    #[test]
    fn prop_first_visit_of_a_phase_is_always_delay_zero(uri in arbitrary_uri()) {
        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);
        let (_, delay) = protocol.next().expect("at least one broker");
        prop_assert_eq!(delay, 0.0);
    }

    #[test]
    fn prop_attempt_ceiling_is_never_exceeded(uri in arbitrary_uri()) {
        let ceiling = uri.policy.max_reconnect_attempts.unwrap();
        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);

        let mut visits = 0u32;
        while protocol.next().is_some() {
            visits += 1;
            prop_assert!(visits <= ceiling + 1, "visited more than the initial connect plus {ceiling} retries");
        }
        prop_assert_eq!(visits, ceiling + 1);
        // Once exhausted, the protocol stays exhausted rather than recovering.
        prop_assert_eq!(protocol.next(), None);
    }

    #[test]
    fn prop_round_robin_never_repeats_consecutively_with_more_than_one_broker(
        mut uri in arbitrary_uri(),
    ) {
        uri.policy.randomize = false;
        uri.policy.priority_backup = false;
        uri.policy.max_reconnect_attempts = None;
        let multi_broker = uri.brokers.len() > 1;
        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);

        let mut previous: Option<FailoverBroker> = None;
        for _ in 0..16 {
            let (broker, _) = protocol.next().expect("unbounded ceiling never exhausts");
            if multi_broker {
                if let Some(prev) = &previous {
                    prop_assert_ne!(prev, &broker);
                }
            }
            previous = Some(broker);
        }
    }

    #[test]
    fn prop_mark_connected_resets_the_attempt_counter(uri in arbitrary_uri()) {
        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);

        // Burn through to exhaustion (or at least one visit, if ceiling is 0).
        while protocol.next().is_some() {}
        protocol.mark_connected();

        // A fresh phase always starts with an uncounted, zero-delay visit,
        // regardless of how the previous phase ended.
        let (_, delay) = protocol.next().expect("mark_connected starts a fresh phase");
        prop_assert_eq!(delay, 0.0);
    }
}
