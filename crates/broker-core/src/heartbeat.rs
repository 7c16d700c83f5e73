// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Heartbeat tick: decrement liveness, reap clients that missed two
//! consecutive heartbeats (spec.md §5, I1).

use crate::dispatcher::Effect;
use crate::protocol::{BrokerCmd, BROKER_CMD};
use crate::registry::BrokerState;

/// Result of one heartbeat tick.
pub struct Tick {
    /// Addresses reaped this tick (for logging).
    pub reaped: Vec<String>,
    /// Effects the caller must perform: the heartbeat broadcast itself.
    pub effects: Vec<Effect>,
}

/// Advance every client's liveness counter by one tick and reap whoever
/// hit zero. Always returns the `BROKER_CMD` heartbeat broadcast effect,
/// even with no clients registered, matching the discovery server's
/// unconditional per-interval lease sweep.
pub fn tick(state: &mut BrokerState) -> Tick {
    let reaped = state.clients.tick();
    for addr in &reaped {
        state.reap(addr);
    }

    state.broadcasts_sent += 1;
    let effects = vec![Effect::Broadcast {
        topic: BROKER_CMD.to_string(),
        content: serde_json::to_value(BrokerCmd::Heartbeat)
            .expect("BrokerCmd::Heartbeat always serializes"),
    }];

    Tick { reaped, effects }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Publisher, INIT_COUNT};

    #[test]
    fn client_survives_one_missed_beat() {
        let mut state = BrokerState::new();
        state.clients.register("a", INIT_COUNT);
        let t = tick(&mut state);
        assert!(t.reaped.is_empty());
        assert!(state.clients.contains("a"));
    }

    #[test]
    fn client_reaped_after_two_missed_beats() {
        let mut state = BrokerState::new();
        state.clients.register("a", INIT_COUNT);
        tick(&mut state);
        let t = tick(&mut state);
        assert_eq!(t.reaped, vec!["a".to_string()]);
        assert!(!state.clients.contains("a"));
    }

    #[test]
    fn reap_also_drops_the_clients_publishers() {
        let mut state = BrokerState::new();
        state.clients.register("a", INIT_COUNT);
        state.topics.insert("t", Publisher::new("a", 1, 0));
        tick(&mut state);
        tick(&mut state);
        assert_eq!(state.topics.publisher_count("t"), 0);
    }

    #[test]
    fn ping_resets_the_counter_so_the_client_survives() {
        let mut state = BrokerState::new();
        state.clients.register("a", INIT_COUNT);
        tick(&mut state);
        state.clients.touch("a", INIT_COUNT);
        tick(&mut state);
        assert!(state.clients.contains("a"));
    }

    #[test]
    fn tick_always_broadcasts_heartbeat() {
        let mut state = BrokerState::new();
        let t = tick(&mut state);
        assert_eq!(
            t.effects,
            vec![Effect::Broadcast {
                topic: BROKER_CMD.to_string(),
                content: serde_json::json!({"type": "heartbeat"}),
            }]
        );
    }
}
