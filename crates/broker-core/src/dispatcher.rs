// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pure request dispatch: `BrokerState` in, `(Reply, Vec<Effect>)` out.
//!
//! No socket, task or lock appears here, mirroring the split the
//! discovery server keeps between `process_message` and the connection
//! loop that owns the actual I/O. That split is what makes the
//! ownership-strength and durability rules (spec.md §3-§4) testable
//! without spinning up a listener.

use serde_json::Value;

use crate::registry::{BrokerState, Publisher, INIT_COUNT};
use crate::protocol::{Reply, Request};

/// A side effect the caller must carry out after `dispatch` returns.
/// Broadcasts go out over the broadcast endpoint; `Shutdown` tells the
/// server loop to stop accepting connections and exit.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Broadcast { topic: String, content: Value },
    Shutdown,
}

/// Apply one request to `state`, returning the reply to send back to the
/// requester and any effects the caller must perform.
pub fn dispatch(state: &mut BrokerState, request: Request) -> (Reply, Vec<Effect>) {
    state.requests_served += 1;
    match request {
        Request::ClientReg { addr } => {
            state.clients.register(&addr, INIT_COUNT);
            (Reply::ClientReg { result: true }, Vec::new())
        }

        Request::PubReg {
            addr,
            topic,
            own_str,
            history_cnt,
        } => {
            // I6: only a client that already went through `client_reg`
            // may register a publisher.
            if !state.clients.contains(&addr) {
                return (Reply::PubReg { result: false }, Vec::new());
            }
            state.clients.get_mut(&addr).unwrap().note_topic(&topic);
            state
                .topics
                .insert(&topic, Publisher::new(addr, own_str, history_cnt));
            (Reply::PubReg { result: true }, Vec::new())
        }

        Request::SubReg { topic, history_cnt } => {
            // spec.md §4.1 `sub_reg`: match the strongest publisher whose
            // declared history capacity is >= the requested depth, then
            // hand back its whole retained buffer (not just the
            // requested depth — the request only gates which publisher
            // qualifies).
            let history = state
                .topics
                .find(&topic, Some(history_cnt), None)
                .map(|p| p.history.snapshot());
            let result = history.is_some();
            (Reply::SubReg { result, history }, Vec::new())
        }

        Request::Publish {
            addr,
            topic,
            content,
        } => {
            // spec.md §4.1 `pub`: broadcast iff this record's strength is
            // >= the topic head's strength, not merely "is the head" —
            // that also covers publishers tied with the head.
            let head_strength = state.topics.head_strength(&topic);
            let mut own_str = None;
            let accepted = match state.topics.find_mut(&topic, &addr) {
                Some(publisher) => {
                    publisher.record_publish(content.clone());
                    own_str = Some(publisher.own_str);
                    true
                }
                None => false,
            };
            let meets_head = match (own_str, head_strength) {
                (Some(s), Some(h)) => s >= h,
                (Some(_), None) => unreachable!(
                    "publisher record for topic {topic:?} exists but its topic has no head; \
                     violates I2/I4 (a non-empty publisher sequence always has a head)"
                ),
                (None, _) => false,
            };

            let mut effects = Vec::new();
            if accepted && meets_head {
                state.broadcasts_sent += 1;
                effects.push(Effect::Broadcast { topic, content });
            }
            (Reply::Publish { result: accepted }, effects)
        }

        Request::Disconnect { addr, topic } => {
            state.topics.remove(&topic, &addr);
            (Reply::Ack, Vec::new())
        }

        Request::Ping { addr } => {
            let result = state.clients.touch(&addr, INIT_COUNT);
            (Reply::Ping { result }, Vec::new())
        }

        Request::Shutdown => (Reply::Shutdown { result: true }, vec![Effect::Shutdown]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Most tests care about publisher/topic behavior, not the
    /// `client_reg` handshake itself — register the addresses they use
    /// up front so `pub_reg` (I6) doesn't reject them.
    fn reg(state: &mut BrokerState, addr: &str) {
        dispatch(state, Request::ClientReg { addr: addr.into() });
    }

    #[test]
    fn client_reg_registers_with_full_liveness() {
        let mut state = BrokerState::new();
        let (reply, effects) = dispatch(&mut state, Request::ClientReg { addr: "a".into() });
        assert_eq!(reply, Reply::ClientReg { result: true });
        assert!(effects.is_empty());
        assert!(state.clients.contains("a"));
    }

    #[test]
    fn pub_reg_from_unregistered_client_is_rejected() {
        let mut state = BrokerState::new();
        let (reply, effects) = dispatch(
            &mut state,
            Request::PubReg {
                addr: "ghost".into(),
                topic: "t".into(),
                own_str: 1,
                history_cnt: 0,
            },
        );
        assert_eq!(reply, Reply::PubReg { result: false });
        assert!(effects.is_empty());
        assert_eq!(state.topics.publisher_count("t"), 0);
    }

    #[test]
    fn pub_reg_inserts_ordered_publisher() {
        let mut state = BrokerState::new();
        reg(&mut state, "weak");
        reg(&mut state, "strong");
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "weak".into(),
                topic: "t".into(),
                own_str: 1,
                history_cnt: 0,
            },
        );
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "strong".into(),
                topic: "t".into(),
                own_str: 9,
                history_cnt: 2,
            },
        );
        assert_eq!(state.topics.head_strength("t"), Some(9));
    }

    #[test]
    fn only_head_publisher_broadcasts() {
        let mut state = BrokerState::new();
        reg(&mut state, "weak");
        reg(&mut state, "strong");
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "weak".into(),
                topic: "t".into(),
                own_str: 1,
                history_cnt: 1,
            },
        );
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "strong".into(),
                topic: "t".into(),
                own_str: 9,
                history_cnt: 1,
            },
        );

        let (reply, effects) = dispatch(
            &mut state,
            Request::Publish {
                addr: "weak".into(),
                topic: "t".into(),
                content: json!("ignored"),
            },
        );
        assert_eq!(reply, Reply::Publish { result: true });
        assert!(effects.is_empty(), "non-head publish must not broadcast");

        let (reply, effects) = dispatch(
            &mut state,
            Request::Publish {
                addr: "strong".into(),
                topic: "t".into(),
                content: json!("heard"),
            },
        );
        assert_eq!(reply, Reply::Publish { result: true });
        assert_eq!(
            effects,
            vec![Effect::Broadcast {
                topic: "t".into(),
                content: json!("heard"),
            }]
        );
    }

    #[test]
    fn publisher_tied_with_head_strength_also_broadcasts() {
        let mut state = BrokerState::new();
        reg(&mut state, "first");
        reg(&mut state, "second");
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "first".into(),
                topic: "t".into(),
                own_str: 5,
                history_cnt: 0,
            },
        );
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "second".into(),
                topic: "t".into(),
                own_str: 5,
                history_cnt: 0,
            },
        );

        // "first" is the nominal head (inserted first, ties broken by
        // insertion order), but "second" shares its strength and must
        // still broadcast per spec.md's "strength >= head strength" rule.
        let (reply, effects) = dispatch(
            &mut state,
            Request::Publish {
                addr: "second".into(),
                topic: "t".into(),
                content: json!("tied"),
            },
        );
        assert_eq!(reply, Reply::Publish { result: true });
        assert_eq!(
            effects,
            vec![Effect::Broadcast {
                topic: "t".into(),
                content: json!("tied"),
            }]
        );
    }

    #[test]
    fn publish_from_unregistered_addr_is_rejected() {
        let mut state = BrokerState::new();
        let (reply, effects) = dispatch(
            &mut state,
            Request::Publish {
                addr: "ghost".into(),
                topic: "t".into(),
                content: json!(1),
            },
        );
        assert_eq!(reply, Reply::Publish { result: false });
        assert!(effects.is_empty());
    }

    #[test]
    fn sub_reg_returns_the_whole_retained_buffer() {
        let mut state = BrokerState::new();
        reg(&mut state, "a");
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "a".into(),
                topic: "t".into(),
                own_str: 1,
                history_cnt: 5,
            },
        );
        for n in 0..5 {
            dispatch(
                &mut state,
                Request::Publish {
                    addr: "a".into(),
                    topic: "t".into(),
                    content: json!(n),
                },
            );
        }
        // Requested depth only gates which publisher qualifies (capacity
        // 5 >= requested 2); the reply carries everything retained.
        let (reply, _) = dispatch(
            &mut state,
            Request::SubReg {
                topic: "t".into(),
                history_cnt: 2,
            },
        );
        match reply {
            Reply::SubReg { result, history } => {
                assert!(result);
                assert_eq!(
                    history,
                    Some(vec![json!(0), json!(1), json!(2), json!(3), json!(4)])
                );
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn sub_reg_on_unknown_topic_misses() {
        let mut state = BrokerState::new();
        let (reply, _) = dispatch(
            &mut state,
            Request::SubReg {
                topic: "nope".into(),
                history_cnt: 1,
            },
        );
        assert_eq!(
            reply,
            Reply::SubReg {
                result: false,
                history: None
            }
        );
    }

    #[test]
    fn sub_reg_skips_the_head_if_its_capacity_is_too_shallow() {
        let mut state = BrokerState::new();
        reg(&mut state, "strong_shallow");
        reg(&mut state, "weak_deep");
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "strong_shallow".into(),
                topic: "t".into(),
                own_str: 9,
                history_cnt: 1,
            },
        );
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "weak_deep".into(),
                topic: "t".into(),
                own_str: 1,
                history_cnt: 10,
            },
        );
        let (reply, _) = dispatch(
            &mut state,
            Request::SubReg {
                topic: "t".into(),
                history_cnt: 5,
            },
        );
        assert!(matches!(reply, Reply::SubReg { result: true, .. }));
    }

    #[test]
    fn disconnect_is_idempotent_ack() {
        let mut state = BrokerState::new();
        reg(&mut state, "a");
        dispatch(
            &mut state,
            Request::PubReg {
                addr: "a".into(),
                topic: "t".into(),
                own_str: 1,
                history_cnt: 0,
            },
        );
        let (reply1, _) = dispatch(
            &mut state,
            Request::Disconnect {
                addr: "a".into(),
                topic: "t".into(),
            },
        );
        let (reply2, _) = dispatch(
            &mut state,
            Request::Disconnect {
                addr: "a".into(),
                topic: "t".into(),
            },
        );
        assert_eq!(reply1, Reply::Ack);
        assert_eq!(reply2, Reply::Ack);
    }

    #[test]
    fn ping_unknown_client_fails() {
        let mut state = BrokerState::new();
        let (reply, _) = dispatch(&mut state, Request::Ping { addr: "ghost".into() });
        assert_eq!(reply, Reply::Ping { result: false });
    }

    #[test]
    fn shutdown_emits_effect() {
        let mut state = BrokerState::new();
        let (reply, effects) = dispatch(&mut state, Request::Shutdown);
        assert_eq!(reply, Reply::Shutdown { result: true });
        assert_eq!(effects, vec![Effect::Shutdown]);
    }
}
